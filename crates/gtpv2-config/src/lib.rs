use std::net::SocketAddr;
use std::time::Duration;

use gtpv2_dict::InterfaceType;
use gtpv2_logging::LogFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Settings of one GTPv2-C Connection
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// Address the control-plane socket binds to
    pub local_addr: SocketAddr,
    /// Value advertised in Recovery IEs
    pub restart_counter: u8,
    /// F-TEID interface types whose TEIDs index Sessions
    #[validate(custom(function = "validate_interface_types"))]
    pub indexed_interface_types: Vec<u8>,
    /// Check version and TEID of inbound messages before dispatch
    pub validation: bool,
    #[validate(range(min = 1, max = 60000))]
    pub echo_timeout_ms: u64,
    #[validate(range(min = 1, max = 1024))]
    pub teid_allocation_attempts: usize,
    #[validate(range(min = 64, max = 65535))]
    pub recv_buffer_size: usize,
    #[validate(length(min = 1))]
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_addr: SocketAddr::from(([0, 0, 0, 0], 2123)),
            restart_counter: 0,
            indexed_interface_types: vec![InterfaceType::S11S4SgwGtpC as u8],
            validation: true,
            echo_timeout_ms: 3000,
            teid_allocation_attempts: 16,
            recv_buffer_size: 1500,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl EngineConfig {
    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.echo_timeout_ms)
    }
}

fn validate_interface_types(types: &[u8]) -> Result<(), ValidationError> {
    if types.iter().all(|t| InterfaceType::from_u8(*t).is_some()) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_interface_type"))
    }
}

/// Load configuration from file, overridden by `GTPV2_*` environment variables
pub fn load_config<T>(path: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("GTPV2"))
        .build()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError(e.to_string()))?;

    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}

/// Load configuration from YAML string (for testing)
pub fn load_from_yaml<T>(yaml: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let config: T =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::LoadError(e.to_string()))?;
    config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.local_addr.port(), 2123);
        assert_eq!(config.echo_timeout(), Duration::from_secs(3));
        assert_eq!(config.teid_allocation_attempts, 16);
        assert!(config.validation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
local_addr: "127.0.0.1:2123"
restart_counter: 7
indexed_interface_types: [6, 11]
log_level: debug
log_format: pretty
"#;
        let config: EngineConfig = load_from_yaml(yaml).unwrap();
        assert_eq!(config.local_addr, "127.0.0.1:2123".parse().unwrap());
        assert_eq!(config.restart_counter, 7);
        assert_eq!(config.indexed_interface_types, vec![6, 11]);
        assert_eq!(config.log_format, LogFormat::Pretty);
        // Unset fields keep their defaults
        assert_eq!(config.recv_buffer_size, 1500);
    }

    #[test]
    fn test_unknown_interface_type_rejected() {
        let yaml = r#"
indexed_interface_types: [11, 99]
"#;
        let result: Result<EngineConfig, _> = load_from_yaml(yaml);
        match result {
            Err(ConfigError::ValidationError(_)) => (), // Expected
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_validation_error() {
        let yaml = r#"
teid_allocation_attempts: 0
"#;
        let result: Result<EngineConfig, _> = load_from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("gtpv2-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "restart_counter: 3\nvalidation: false\n").unwrap();

        let config: EngineConfig = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.restart_counter, 3);
        assert!(!config.validation);

        std::fs::remove_file(&path).unwrap();
    }
}
