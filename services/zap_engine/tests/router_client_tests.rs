//! Router client behaviour against a mocked aggregator API

use config::{RouterConfig, VaultEntry};
use mockito::{Matcher, Server};
use types::{Address, U256};
use zap_engine::{
    compose_zap_in, AggregatorRouter, RequestParams, RouterClient, RouterError, RouterRequest,
    ZapInRequest,
};

fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

fn client(base_url: String) -> RouterClient {
    let config = RouterConfig {
        base_url,
        api_key: Some("test-key".to_string()),
        ..Default::default()
    };
    RouterClient::new(&config, 1, RouterClient::rate_limiter(100)).expect("client")
}

fn zap_in_request() -> RouterRequest {
    let vault = VaultEntry {
        address: addr(0xaa),
        symbol: "yvUSDC".to_string(),
        decimals: 6,
        underlying: addr(0x02),
        protocol: "erc4626".to_string(),
    };
    let bundle = compose_zap_in(&ZapInRequest {
        token_in: addr(0x01),
        vault,
        amount: U256::from(1_000_000u64),
        slippage_bps: 50,
    })
    .expect("bundle");
    let params = RequestParams {
        chain_id: 1,
        from_address: addr(0x11),
        receiver: None,
        routing_strategy: "router".to_string(),
    };
    RouterRequest::from_bundle(&bundle, &params).expect("request")
}

#[tokio::test]
async fn test_bundle_success_parses_transaction_and_amounts() {
    let mut server = Server::new_async().await;
    let body = format!(
        r#"{{
            "tx": {{"to": "{:?}", "data": "0xdeadbeef", "value": "0"}},
            "gas": "412000",
            "amountsOut": {{"{:?}": "998700"}}
        }}"#,
        addr(0x77),
        addr(0xaa)
    );
    let mock = server
        .mock("POST", "/api/v1/shortcuts/bundle")
        .match_header("authorization", "Bearer test-key")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("chainId".into(), "1".into()),
            Matcher::UrlEncoded("skipQuote".into(), "false".into()),
            Matcher::UrlEncoded("routingStrategy".into(), "router".into()),
        ]))
        .match_body(Matcher::Regex(r#""action":"deposit""#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let response = client(server.url()).bundle(&zap_in_request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.tx.to, addr(0x77));
    assert_eq!(response.tx.data.as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(response.gas, U256::from(412_000u64));
    assert_eq!(response.amounts_out.get(&addr(0xaa)), Some(&U256::from(998_700u64)));
}

#[tokio::test]
async fn test_rate_limit_status_is_retryable() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/v1/shortcuts/bundle")
        .match_query(Matcher::Any)
        .with_status(429)
        .create_async()
        .await;

    let err = client(server.url()).bundle(&zap_in_request()).await.unwrap_err();
    assert_eq!(err, RouterError::RateLimited);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_server_and_client_errors_are_classified() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/v1/shortcuts/bundle")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;
    server
        .mock("GET", "/api/v1/shortcuts/route")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body("unknown token")
        .create_async()
        .await;

    let router = client(server.url());

    let err = router.bundle(&zap_in_request()).await.unwrap_err();
    assert!(matches!(err, RouterError::Server { status: 503, .. }));
    assert!(err.is_retryable());

    let err = router
        .route_quote(addr(0x01), addr(0x02), U256::from(5u64), addr(0x11))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RouterError::Client {
            status: 400,
            body: "unknown token".to_string()
        }
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/v1/shortcuts/bundle")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"gas": "1"}"#)
        .create_async()
        .await;

    let err = client(server.url()).bundle(&zap_in_request()).await.unwrap_err();
    assert!(matches!(err, RouterError::Decode(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_route_quote_sends_pair_and_amount() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/shortcuts/route")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("tokenIn".into(), format!("{:?}", addr(0x01))),
            Matcher::UrlEncoded("tokenOut".into(), format!("{:?}", addr(0x02))),
            Matcher::UrlEncoded("amountIn".into(), "1000000000000000000".into()),
            Matcher::UrlEncoded("fromAddress".into(), format!("{:?}", addr(0x11))),
        ]))
        .with_status(200)
        .with_body(r#"{"amountOut": 2013456789, "gas": "180000"}"#)
        .create_async()
        .await;

    let quote = client(server.url())
        .route_quote(
            addr(0x01),
            addr(0x02),
            U256::exp10(18),
            addr(0x11),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(quote.amount_out, U256::from(2_013_456_789u64));
    assert_eq!(quote.gas, U256::from(180_000u64));
}

#[tokio::test]
async fn test_token_price_endpoint() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", format!("/api/v1/prices/1/{:?}", addr(0x01)).as_str())
        .with_status(200)
        .with_body(r#"{"price": "3150.25"}"#)
        .create_async()
        .await;

    let price = client(server.url()).token_price(addr(0x01)).await.unwrap();
    assert_eq!(price.to_string(), "3150.25");
}
