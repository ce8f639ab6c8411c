use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub source: SourceConfig,
    #[serde(default)]
    pub labeler: LabelerConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8081
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl SourceConfig {
    pub fn get_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelerConfig {
    /// Annotation is disabled when unset.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_labeler_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_labeler_timeout_ms(),
        }
    }
}

fn default_labeler_timeout_ms() -> u64 {
    10_000
}

impl LabelerConfig {
    /// The configured endpoint, treating a blank value as unset.
    pub fn endpoint(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn get_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverlayConfig {
    #[serde(default = "default_overlay_color")]
    pub color: [u8; 3],
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            color: default_overlay_color(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_overlay_color() -> [u8; 3] {
    [255, 0, 0]
}

fn default_jpeg_quality() -> u8 {
    crate::codec::DEFAULT_JPEG_QUALITY
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    /// The metrics listener is only started when a port is set.
    #[serde(default)]
    pub port: Option<u16>,
}

impl MetricsConfig {
    pub fn get_address(&self, host: &str) -> Option<String> {
        self.port.map(|port| format!("{}:{}", host, port))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.source.url.trim().is_empty() {
            return Err("source.url must point at an MJPEG stream".into());
        }
        Ok(())
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no working directory: {e}")))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("MJPEG")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    parse_config(config)
}

fn parse_config(config: config::Config) -> Result<Config, config::ConfigError> {
    let config: Config = config.try_deserialize::<Config>()?;
    config.validate().map_err(config::ConfigError::Message)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn load(yaml: &str) -> Result<Config, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        parse_config(config)
    }

    #[test]
    fn test_defaults_apply() {
        let config = load(
            r#"
log_level: info
source:
  url: http://camera.local/stream
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.get_address(), "0.0.0.0:8081");
        assert_eq!(config.source.get_reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.labeler.endpoint(), None);
        assert_eq!(config.overlay.color, [255, 0, 0]);
        assert!(config.metrics.get_address("0.0.0.0").is_none());
    }

    #[test]
    fn test_full_configuration() {
        let config = load(
            r#"
log_level: DEBUG
server:
  host: 127.0.0.1
  port: 9000
source:
  url: http://camera.local/stream
  reconnect_delay_secs: 1
labeler:
  url: http://labeler.local/label
  timeout_ms: 250
overlay:
  color: [0, 255, 0]
metrics:
  port: 9100
"#,
        )
        .unwrap();

        assert!(matches!(config.log_level, LogLevel::Debug));
        assert_eq!(config.server.get_address(), "127.0.0.1:9000");
        assert_eq!(config.labeler.endpoint(), Some("http://labeler.local/label"));
        assert_eq!(config.labeler.get_timeout(), Duration::from_millis(250));
        assert_eq!(config.overlay.color, [0, 255, 0]);
        assert_eq!(
            config.metrics.get_address("127.0.0.1").as_deref(),
            Some("127.0.0.1:9100")
        );
    }

    #[test]
    fn test_blank_labeler_url_disables_annotation() {
        let config = load(
            r#"
log_level: info
source:
  url: http://camera.local/stream
labeler:
  url: "  "
"#,
        )
        .unwrap();

        assert_eq!(config.labeler.endpoint(), None);
    }

    #[test]
    fn test_missing_source_url_is_rejected() {
        let result = load(
            r#"
log_level: info
source:
  url: ""
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let result = load(
            r#"
log_level: trace
source:
  url: http://camera.local/stream
"#,
        );
        assert!(result.is_err());
    }
}
