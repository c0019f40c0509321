//! Service configuration and the TOML loader.

use crate::errors::EdgeflowError;
use crate::export::{BrokerAddress, ExportOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const CONFIG_DIRECTORY: &str = "./res";
const CONFIG_DIR_ENV: &str = "EDGEFLOW_CONF_DIR";
const CONFIG_FILE_NAME: &str = "configuration.toml";

/// Which trigger drives the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
    /// HTTP request/response trigger.
    #[default]
    Http,
    /// Message-bus subscription trigger.
    MessageBus,
}

/// Trigger binding: kind plus the bus topics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BindingConfig {
    /// Trigger kind.
    pub trigger: TriggerKind,

    /// Topic the bus trigger subscribes to.
    pub subscribe_topic: String,

    /// Topic the bus trigger publishes pipeline output to.
    pub publish_topic: String,
}

/// Message bus endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageBusConfig {
    /// Broker host name or IP address.
    pub host: String,

    /// Broker port.
    pub port: u16,

    /// Client identifier presented to the broker.
    pub client_id: String,

    /// Quality-of-service level for subscriptions and publishes.
    pub qos: u8,
}

impl Default for MessageBusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "edgeflow".to_string(),
            qos: 0,
        }
    }
}

/// HTTP trigger serving settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 48095,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Broker export settings: address plus sender options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Broker address.
    pub address: BrokerAddress,

    /// Client certificate file, for TLS protocols.
    #[serde(default)]
    pub cert_file: Option<PathBuf>,

    /// Client private key file, for TLS protocols.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Sender options.
    #[serde(default)]
    pub options: ExportOptions,
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfiguration {
    /// Trigger binding.
    pub binding: BindingConfig,

    /// Message bus endpoint, for the bus trigger.
    pub message_bus: MessageBusConfig,

    /// HTTP serving settings, for the http trigger.
    pub service: ServiceConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Broker export settings, when an export stage is configured.
    pub export: Option<ExportConfig>,

    /// Application-specific settings.
    pub application_settings: HashMap<String, String>,
}

/// Loads the configuration for an optional profile.
///
/// The directory is `config_dir` when given, else `$EDGEFLOW_CONF_DIR`,
/// else `./res`; a profile's file lives in a subdirectory of the same
/// name.
pub fn load(
    profile: Option<&str>,
    config_dir: Option<&Path>,
) -> Result<AppConfiguration, EdgeflowError> {
    let mut file = determine_path(config_dir);
    if let Some(profile) = profile {
        if !profile.is_empty() {
            file.push(profile);
        }
    }
    file.push(CONFIG_FILE_NAME);
    load_file(&file)
}

fn load_file(path: &Path) -> Result<AppConfiguration, EdgeflowError> {
    let contents = std::fs::read_to_string(path).map_err(|err| {
        EdgeflowError::Configuration(format!(
            "could not load configuration file {}: {err}",
            path.display()
        ))
    })?;
    toml::from_str(&contents).map_err(|err| {
        EdgeflowError::Configuration(format!(
            "unable to parse configuration file {}: {err}",
            path.display()
        ))
    })
}

fn determine_path(config_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = config_dir {
        return dir.to_path_buf();
    }
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(CONFIG_DIRECTORY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    const SAMPLE: &str = r#"
[binding]
trigger = "message-bus"
subscribe_topic = "events/in"
publish_topic = "events/out"

[message_bus]
host = "broker.local"
port = 1884
client_id = "edge-svc"
qos = 1

[logging]
level = "debug"

[application_settings]
application_name = "simple-filter-xml"
"#;

    #[test]
    fn test_load_parses_all_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("configuration.toml"), SAMPLE).expect("write");

        let config = load(None, Some(dir.path())).expect("load");

        assert_eq!(config.binding.trigger, TriggerKind::MessageBus);
        assert_eq!(config.binding.subscribe_topic, "events/in");
        assert_eq!(config.message_bus.host, "broker.local");
        assert_eq!(config.message_bus.qos, 1);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.application_settings.get("application_name"),
            Some(&"simple-filter-xml".to_string())
        );
    }

    #[test]
    fn test_load_uses_profile_subdirectory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let profile_dir = dir.path().join("docker");
        fs::create_dir(&profile_dir).expect("mkdir");
        fs::write(profile_dir.join("configuration.toml"), SAMPLE).expect("write");

        let config = load(Some("docker"), Some(dir.path())).expect("load");

        assert_eq!(config.binding.publish_topic, "events/out");
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");

        let err = load(None, Some(dir.path())).unwrap_err();

        assert!(matches!(err, EdgeflowError::Configuration(_)));
        assert!(err.to_string().contains("configuration.toml"));
    }

    #[test]
    fn test_parse_error_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("configuration.toml"), "not toml at all [")
            .expect("write");

        let err = load(None, Some(dir.path())).unwrap_err();

        assert!(matches!(err, EdgeflowError::Configuration(_)));
    }

    #[test]
    fn test_defaults_are_sensible() {
        let config = AppConfiguration::default();
        assert_eq!(config.binding.trigger, TriggerKind::Http);
        assert_eq!(config.service.port, 48095);
        assert_eq!(config.message_bus.port, 1883);
        assert_eq!(config.logging.level, "info");
        assert!(config.export.is_none());
    }
}
