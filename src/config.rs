use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub http: HttpConfig,
    pub devices_file: PathBuf,
    pub media_catalog_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    pub client_id: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_required(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("{key} environment variable is required"))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Path of the device store; the only setting `register` needs.
pub fn devices_file_from_env() -> PathBuf {
    PathBuf::from(env_or_default("DEVICES_FILE", "devices.json".to_string()))
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            mqtt: MqttConfig {
                broker_host: env_required("MQTT_BROKER_HOST")?,
                broker_port: env_or_default("MQTT_BROKER_PORT", 1883),
                username: env_optional("MQTT_USERNAME"),
                password: env_optional("MQTT_PASSWORD"),
                topic_prefix: env_or_default("MQTT_TOPIC_PREFIX", "esp32_audio".to_string()),
                client_id: env_or_default("MQTT_CLIENT_ID", "esp32-audio-bridge".to_string()),
            },
            http: HttpConfig {
                timeout_secs: env_or_default("HTTP_TIMEOUT_SECS", 10),
            },
            devices_file: devices_file_from_env(),
            media_catalog_file: env_optional("MEDIA_CATALOG_FILE").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.mqtt.broker_host.is_empty() {
            return Err("MQTT_BROKER_HOST must not be empty".into());
        }
        if self.mqtt.topic_prefix.is_empty() || self.mqtt.topic_prefix.ends_with('/') {
            return Err("MQTT_TOPIC_PREFIX must be non-empty without a trailing '/'".into());
        }
        if self.http.timeout_secs == 0 {
            return Err("HTTP_TIMEOUT_SECS must be > 0".into());
        }
        Ok(())
    }

    pub fn bridge_status_topic(&self) -> String {
        format!("{}/bridge_status", self.mqtt.topic_prefix)
    }
}
