use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Top-level configuration for the SwapVault service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwapVaultConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub trading: TradingConfig,
}

/// Service-level settings (identity, bind address, metrics).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port the Prometheus exporter binds to; 0 disables metrics.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Trading engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradingConfig {
    /// How long both parties have to lock after an accept, in seconds.
    #[serde(default = "default_lock_window_secs")]
    pub lock_window_secs: u64,
    /// How often the expiry sweeper scans for lapsed lock windows, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Upper bound on the number of items a requester may offer at once.
    #[serde(default = "default_max_offered_items")]
    pub max_offered_items: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            lock_window_secs: default_lock_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_offered_items: default_max_offered_items(),
        }
    }
}
