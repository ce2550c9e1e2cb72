//! Zap quote CLI
//!
//! Loads the zap configuration, quotes one flow against the live router and
//! RPC endpoint, and prints the quote (bundle and transaction included) as JSON.
//!
//! ```text
//! zap_quote zap-in --token-in 0xC02a... --vault 0x27B5... --amount 1000000000000000000 --from 0x...
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use config::load_config;
use types::{Address, U256};
use zap_engine::{log_simulation, StateOverrides, ZapService};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Flow {
    ZapIn,
    ZapOut,
    VaultToVault,
    Hybrid,
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "zap_quote")]
#[command(about = "Quote a vault zap through the aggregator router")]
struct Args {
    /// Zap flow to quote
    #[arg(value_enum)]
    flow: Flow,

    /// Token (or source vault for vault-to-vault) being sold
    #[arg(long)]
    token_in: String,

    /// Vault receiving the deposit; for zap-out, the vault being exited
    #[arg(long)]
    vault: String,

    /// Token received by zap-out
    #[arg(long)]
    token_out: Option<String>,

    /// Amount in base units (decimal string)
    #[arg(long)]
    amount: String,

    /// Address the bundle executes from
    #[arg(long)]
    from: String,

    /// Configuration file path
    #[arg(short, long, default_value = "config/zap.toml")]
    config: PathBuf,

    /// Environment (development, staging, production)
    #[arg(short, long)]
    environment: Option<String>,

    /// Run a preflight simulation of the returned transaction
    #[arg(long)]
    simulate: bool,
}

fn parse_address(label: &str, raw: &str) -> Result<Address> {
    Address::from_str(raw).with_context(|| format!("Invalid {} address: {}", label, raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("zap_engine=info".parse()?),
        )
        .init();

    info!("📁 Config file: {:?}", args.config);
    info!("🌍 Environment: {}", args.environment.as_deref().unwrap_or("default"));

    let config = load_config(Some(&args.config), args.environment.as_deref())
        .context("Failed to load configuration")?;
    let service = ZapService::from_config(config)?;

    let token_in = parse_address("token-in", &args.token_in)?;
    let vault = parse_address("vault", &args.vault)?;
    let from = parse_address("from", &args.from)?;
    let amount = U256::from_dec_str(&args.amount)
        .map_err(|e| anyhow::anyhow!("Invalid amount {}: {}", args.amount, e))?;

    let quote = match args.flow {
        Flow::ZapIn => service.quote_zap_in(token_in, vault, amount, from).await?,
        Flow::ZapOut => {
            let Some(raw) = args.token_out.as_deref() else {
                bail!("--token-out is required for zap-out");
            };
            let token_out = parse_address("token-out", raw)?;
            service.quote_zap_out(vault, token_out, amount, from).await?
        }
        Flow::VaultToVault => service.quote_vault_to_vault(token_in, vault, amount, from).await?,
        Flow::Hybrid => service.quote_hybrid(token_in, vault, amount, from).await?,
    };

    let Some(quote) = quote else {
        bail!("No quote available; see log output for the failing step");
    };
    println!("{}", serde_json::to_string_pretty(&quote)?);

    if args.simulate {
        let outcome = service
            .preflight(&quote, from, &StateOverrides::new())
            .await
            .context("Preflight simulation failed")?;
        log_simulation!("Preflight outcome: {:?}", outcome);
    }

    Ok(())
}
