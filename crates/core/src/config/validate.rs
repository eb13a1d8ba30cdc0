use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Event buffer is not 0
/// - Encoder timeout is not 0
/// - Output suffix is set when writing next to the source
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.engine.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "engine.event_buffer cannot be 0".to_string(),
        ));
    }

    if config.encoder.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "encoder.timeout_secs cannot be 0".to_string(),
        ));
    }

    // Would overwrite sources with the same extension
    if config.encoder.output_dir.is_none() && config.encoder.output_suffix.is_empty() {
        return Err(ConfigError::ValidationError(
            "encoder.output_suffix cannot be empty without encoder.output_dir".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_event_buffer_zero_fails() {
        let mut config = Config::default();
        config.engine.event_buffer = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_timeout_zero_fails() {
        let mut config = Config::default();
        config.encoder.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_suffix() {
        let mut config = Config::default();
        config.encoder.output_suffix = String::new();
        assert!(validate_config(&config).is_err());

        config.encoder.output_dir = Some(PathBuf::from("/srv/encoded"));
        assert!(validate_config(&config).is_ok());
    }
}
