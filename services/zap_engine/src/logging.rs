//! Standardized emoji logging for zap engine modules
//!
//! Keeps emoji usage consistent across quoting, routing and simulation so
//! lifecycle lines stand out from per-request `debug!` detail.

/// Standard emoji set for zap engine logging
pub struct LogEmoji;

impl LogEmoji {
    // Status indicators
    pub const SUCCESS: &'static str = "✅"; // Operation succeeded
    pub const ERROR: &'static str = "❌"; // Operation failed
    pub const WARNING: &'static str = "⚠️"; // Quote dropped or degraded

    // Module-specific
    pub const QUOTE: &'static str = "🔍"; // Quote estimation
    pub const BUNDLE: &'static str = "📦"; // Bundle composition
    pub const NETWORK: &'static str = "🌐"; // Router / RPC calls
    pub const POOL: &'static str = "🏊"; // Pool snapshot reads
    pub const SIMULATE: &'static str = "🧪"; // Preflight simulation
    pub const MONEY: &'static str = "💰"; // USD pricing
}

// Convenience macros for standardized logging
#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::SUCCESS, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!("{} {}", $crate::logging::LogEmoji::ERROR, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_quote_dropped {
    ($($arg:tt)*) => {
        tracing::warn!("{} {}", $crate::logging::LogEmoji::WARNING, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_quote {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::QUOTE, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_bundle {
    ($($arg:tt)*) => {
        tracing::debug!("{} {}", $crate::logging::LogEmoji::BUNDLE, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_network {
    ($($arg:tt)*) => {
        tracing::debug!("{} {}", $crate::logging::LogEmoji::NETWORK, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_pool {
    ($($arg:tt)*) => {
        tracing::debug!("{} {}", $crate::logging::LogEmoji::POOL, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_simulation {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::SIMULATE, format!($($arg)*))
    };
}
