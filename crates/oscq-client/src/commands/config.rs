//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.filter.to_message_filter().map_err(ClientError::Config)?;

    if config.service.name.is_empty() {
        return Err(ClientError::Config("service name must not be empty".to_string()));
    }
    if config.http.timeout == 0 {
        return Err(ClientError::Config("http timeout must be at least 1 second".to_string()));
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ClientResult<()> {
    let config_path = ClientConfig::default_path();
    println!("config: {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_bad_settings() {
        assert!(validate(&ClientConfig::default()).is_ok());

        let mut config = ClientConfig::default();
        config.filter.parameter_pattern = Some("[".to_string());
        assert!(matches!(validate(&config), Err(ClientError::Config(_))));

        let mut config = ClientConfig::default();
        config.http.timeout = 0;
        assert!(validate(&config).is_err());
    }
}
