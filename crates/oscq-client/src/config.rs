//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/oscq/config.toml` by default:
//!
//! ```toml
//! debug = false
//!
//! [service]
//! name = "oscq-client"
//! address = "127.0.0.1"
//! peer_prefix = "VRChat-Client-"
//!
//! [filter]
//! receive_messages = true
//! receive_parameter_changes = true
//! address_pattern = "^/avatar/parameters/"
//!
//! [http]
//! timeout = 5
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use oscq_core::MessageFilter;
use oscq_discovery::FetcherConfig;
use serde::{Deserialize, Serialize};

use crate::query_service::QueryConfig;

/// Configuration for the oscq client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// How this process advertises itself and which peers it accepts.
    pub service: ServiceSettings,

    /// Which inbound messages are delivered.
    pub filter: FilterSettings,

    /// HTTP client settings.
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Instance name advertised over mDNS.
    pub name: String,

    /// Address the responder and the OSC receiver listen on.
    pub address: IpAddr,

    /// Only peers whose instance name starts with this are accepted.
    pub peer_prefix: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        let query = QueryConfig::default();
        Self {
            name: query.service_name,
            address: query.address,
            peer_prefix: query.peer_prefix,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub receive_messages: bool,
    pub receive_parameter_changes: bool,

    /// Regex matched against the full address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_pattern: Option<String>,

    /// Regex matched against the bare parameter name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_pattern: Option<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            receive_messages: true,
            receive_parameter_changes: true,
            address_pattern: None,
            parameter_pattern: None,
        }
    }
}

impl FilterSettings {
    /// Builds the filter, compiling both patterns.
    pub fn to_message_filter(&self) -> Result<MessageFilter, String> {
        let mut filter = MessageFilter::new()
            .with_receive_messages(self.receive_messages)
            .with_receive_parameter_changes(self.receive_parameter_changes);

        if let Some(ref pattern) = self.address_pattern {
            filter
                .set_address_pattern(pattern)
                .map_err(|e| format!("invalid address_pattern: {}", e))?;
        }
        if let Some(ref pattern) = self.parameter_pattern {
            filter
                .set_parameter_pattern(pattern)
                .map_err(|e| format!("invalid parameter_pattern: {}", e))?;
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: FetcherConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oscq")
    }

    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            service_name: self.service.name.clone(),
            address: self.service.address,
            peer_prefix: self.service.peer_prefix.clone(),
        }
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig::new(self.service.name.clone())
            .with_timeout(Duration::from_secs(self.http.timeout))
    }
}

/// Loopback, the default advertised address.
pub(crate) const DEFAULT_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

#[cfg(test)]
mod tests {
    use super::*;
    use oscq_core::{Message, ParameterChangedMessage};
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert!(!config.debug);
        assert_eq!(config.service.name, "oscq-client");
        assert_eq!(config.service.address, DEFAULT_ADDRESS);
        assert_eq!(config.service.peer_prefix, "VRChat-Client-");
        assert!(config.filter.receive_messages);
        assert!(config.filter.receive_parameter_changes);
        assert_eq!(config.http.timeout, 5);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
[service]
name = "my-tool"

[filter]
parameter_pattern = "^Foo$"
"#,
        )
        .unwrap();

        assert_eq!(config.service.name, "my-tool");
        assert_eq!(config.service.peer_prefix, "VRChat-Client-");
        assert_eq!(config.filter.parameter_pattern.as_deref(), Some("^Foo$"));
        assert!(config.filter.receive_messages);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "debug = true\n[service]\naddress = \"192.168.1.5\"\n[http]\ntimeout = 2").unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert!(config.debug);
        assert_eq!(config.service.address, "192.168.1.5".parse::<IpAddr>().unwrap());
        assert_eq!(config.fetcher_config().timeout, Duration::from_secs(2));
        assert_eq!(config.fetcher_config().user_agent(), "OscQuery-oscq-client");
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[service]\naddress = \"not an ip\"").unwrap();
        let err = ClientConfig::load_from(file.path()).unwrap_err();
        assert!(err.contains("failed to parse config"));
    }

    #[test]
    fn builds_message_filter() {
        let settings = FilterSettings {
            receive_messages: false,
            address_pattern: Some("^/avatar/parameters/".to_string()),
            parameter_pattern: Some("^Foo$".to_string()),
            ..FilterSettings::default()
        };
        let filter = settings.to_message_filter().unwrap();

        assert!(!filter.receive_messages);
        assert!(filter.receive_parameter_changes);
        let foo = ParameterChangedMessage::new("Foo", true);
        assert!(filter.matches_address(foo.message()));
        assert!(filter.matches_parameter(&foo));
        assert!(!filter.matches_address(&Message::new("/chatbox/input", vec![])));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let settings = FilterSettings {
            address_pattern: Some("(".to_string()),
            ..FilterSettings::default()
        };
        assert!(settings.to_message_filter().unwrap_err().contains("address_pattern"));
    }

    #[test]
    fn dump_round_trips() {
        let config = ClientConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.service.name, config.service.name);
        assert!(!text.contains("address_pattern"));
    }
}
