use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub behaviors: BehaviorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where the broker's startup behaviors come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehaviorSettings {
    /// Path of a behavior document on disk
    pub file: Option<String>,
    /// A behavior document given inline; takes precedence over `file`
    pub json: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("broker").required(false));

        // Add environment variables with prefix "BROKER_"
        config = config.add_source(
            config::Environment::with_prefix("BROKER")
                .separator("_")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let mut app_config: AppConfig = config.try_deserialize()?;

        // Platform-assigned port wins over everything else
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            app_config.server.port = port;
        }

        Ok(app_config)
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Identity of this broker process: the platform's instance id when running
/// under one, otherwise a fresh random id.
pub fn broker_instance_id() -> String {
    std::env::var("VCAP_APPLICATION")
        .ok()
        .and_then(|raw| instance_id_from_vcap(&raw))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn instance_id_from_vcap(raw: &str) -> Option<String> {
    let application: serde_json::Value = serde_json::from_str(raw).ok()?;
    application
        .get("instance_id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server_address(), "0.0.0.0:8080");
        assert!(config.behaviors.file.is_none());
        assert!(config.behaviors.json.is_none());
    }

    #[test]
    fn test_instance_id_from_vcap() {
        assert_eq!(
            instance_id_from_vcap(r#"{"instance_id": "abc-123", "name": "broker"}"#),
            Some("abc-123".to_string())
        );
        assert_eq!(instance_id_from_vcap(r#"{"name": "broker"}"#), None);
        assert_eq!(instance_id_from_vcap("not json"), None);
    }
}
