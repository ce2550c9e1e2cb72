//! Service configuration and defaults
//!
//! Default values and protocol identifiers shared by the zap engine and its
//! configuration so that the `Default` impls and the composer agree.

/// Aggregator router defaults
pub mod router {
    pub const DEFAULT_BASE_URL: &str = "https://api.enso.finance";

    /// Routing strategy passed through to the aggregator
    pub const DEFAULT_ROUTING_STRATEGY: &str = "router";

    /// Request budget shared by every call to the aggregator
    pub const DEFAULT_RATE_LIMIT_PER_SEC: u32 = 10;

    pub const REQUEST_TIMEOUT_MS: u64 = 10_000;
}

/// Protocol identifiers the aggregator understands
pub mod protocols {
    /// Aggregator-routed swap leg
    pub const ROUTE: &str = "enso";
    pub const ERC20: &str = "erc20";
    pub const ERC4626: &str = "erc4626";
    pub const CURVE: &str = "curve";
}

/// Quote defaults
pub mod quote {
    /// 0.5%
    pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;

    /// USD prices are reused for this long across quotes
    pub const PRICE_CACHE_TTL_SECS: u64 = 60;

    /// Upper bound on one quote request including every concurrent read
    pub const QUOTE_TIMEOUT_MS: u64 = 15_000;
}

/// Network defaults
pub mod network {
    pub const MAINNET_CHAIN_ID: u64 = 1;
    pub const RPC_TIMEOUT_MS: u64 = 10_000;
}

/// Simulation backend defaults
pub mod simulation {
    pub const DEFAULT_BASE_URL: &str = "https://api.tenderly.co/api/v1";
}
