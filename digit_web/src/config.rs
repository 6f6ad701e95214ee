use digit_recognition::config::{ClassifierConfig, LabelsConfig, ModelConfig, Validatable};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub labels: Option<LabelsConfig>,
    #[serde(default)]
    pub model_card: ModelCardConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        self.model.validate()?;
        if let Some(labels) = &self.labels {
            labels.validate()?;
        }
        self.classifier
            .classifier()
            .map_err(|e| format!("classifier: {}", e))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Static facts about the deployed model, shown to clients as-is.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelCardConfig {
    pub name: String,
    pub description: String,
    pub accuracy: f32,
    pub precision: f32,
}

impl Default for ModelCardConfig {
    fn default() -> Self {
        Self {
            name: "MNIST digit recognizer".to_string(),
            description: "Convolutional neural network trained on handwritten digits.".to_string(),
            accuracy: 0.895,
            precision: 0.957,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
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

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            other => Err(format!(
                "{} is not a supported minimum log level. Use `debug`, `info` or `warn`.",
                other
            )),
        }
    }
}

pub fn build_configuration(
    configuration_directory: &Path,
    environment: Environment,
) -> Result<Config, config::ConfigError> {
    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(format!("{}.yaml", environment.as_str())),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    config.try_deserialize::<Config>()
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = build_configuration(&configuration_directory, environment)?;

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        return Err(config::ConfigError::Message(e));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use digit_recognition::{classification::OutputActivation, TensorLayout};
    use std::path::PathBuf;

    fn configuration_directory() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../configuration")
    }

    #[test]
    fn test_local_configuration() {
        let config = build_configuration(&configuration_directory(), Environment::Local).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.model.input_size, 28);
        assert_eq!(config.model.layout, TensorLayout::Nhwc);
        assert!((config.classifier.confidence_threshold - 0.60).abs() < f32::EPSILON);
        assert_eq!(
            config.classifier.output_activation,
            OutputActivation::Softmax
        );
        assert!(config.labels.is_some());
    }

    #[test]
    fn test_production_configuration() {
        let config =
            build_configuration(&configuration_directory(), Environment::Production).unwrap();

        assert_eq!(config.server.get_address(), "0.0.0.0:8080");
        assert_eq!(config.log_level, LogLevel::Info);
        assert!((config.model_card.accuracy - 0.895).abs() < f32::EPSILON);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::try_from("PRODUCTION".to_string()),
            Ok(Environment::Production)
        );
        assert!(Environment::try_from("staging".to_string()).is_err());
        assert!(LogLevel::try_from("trace".to_string()).is_err());
    }
}
