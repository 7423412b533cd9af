use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SwapVaultConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    // Perform environment variable substitution
    let substituted = substitution::substitute_env_vars(&content)?;

    let config: SwapVaultConfig =
        serde_yaml::from_str(&substituted).with_context(|| "Failed to parse YAML configuration")?;

    info!("Configuration loaded successfully");
    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> SwapVaultConfig {
    SwapVaultConfig {
        service: ServiceConfig {
            name: "swapvault".to_string(),
            host: default_host(),
            port: default_port(),
            metrics_port: default_metrics_port(),
        },
        trading: TradingConfig::default(),
    }
}

#[instrument(skip(config, path))]
pub fn save_config<P: AsRef<Path>>(config: &SwapVaultConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    let yaml = serde_yaml::to_string(config).with_context(|| "Failed to serialize config")?;
    fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;
    info!("Configuration written to: {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let config = generate_default_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: SwapVaultConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.service.name, config.service.name);
        assert_eq!(
            parsed.trading.lock_window_secs,
            config.trading.lock_window_secs
        );
    }
}
