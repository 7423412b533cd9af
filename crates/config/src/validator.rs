use crate::*;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("Service port must be non-zero")]
    InvalidServicePort,

    #[error("lock_window_secs must be a positive integer")]
    InvalidLockWindow,

    #[error("sweep_interval_secs must be a positive integer")]
    InvalidSweepInterval,

    #[error("max_offered_items must be a positive integer")]
    InvalidMaxOfferedItems,
}

/// Result of validating a configuration: hard errors and advisory warnings.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate_config(config: &SwapVaultConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.service.name.trim().is_empty() {
        report.errors.push(ValidationError::MissingServiceName);
    }

    if config.service.port == 0 {
        report.errors.push(ValidationError::InvalidServicePort);
    }

    if config.trading.lock_window_secs == 0 {
        report.errors.push(ValidationError::InvalidLockWindow);
    }

    if config.trading.sweep_interval_secs == 0 {
        report.errors.push(ValidationError::InvalidSweepInterval);
    }

    if config.trading.max_offered_items == 0 {
        report.errors.push(ValidationError::InvalidMaxOfferedItems);
    }

    if config.trading.sweep_interval_secs > config.trading.lock_window_secs {
        report.warnings.push(format!(
            "sweep interval ({}s) is longer than the lock window ({}s); expired trades may linger for a full extra cycle",
            config.trading.sweep_interval_secs, config.trading.lock_window_secs
        ));
    }

    if config.service.metrics_port != 0 && config.service.metrics_port == config.service.port {
        report.warnings.push(
            "metrics_port equals the service port; the exporter will fail to bind".to_string(),
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = generate_default_config();
        let report = validate_config(&config);
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_zero_lock_window_is_error() {
        let mut config = generate_default_config();
        config.trading.lock_window_secs = 0;
        let report = validate_config(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_slow_sweep_is_warning() {
        let mut config = generate_default_config();
        config.trading.lock_window_secs = 60;
        config.trading.sweep_interval_secs = 300;
        let report = validate_config(&config);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }
}
