//! Client configuration: endpoints, default model, request timeout.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ModelName};

pub const DEFAULT_INFERENCE_URL: &str = "https://inference.smallcloud.ai/v1/contrast";
pub const DEFAULT_REPORT_URL: &str = "https://www.smallcloud.ai/v1/report-to-mothership";
pub const DEFAULT_ACTIVATION_URL: &str = "https://max.smallcloud.ai/v1/api-activate";
pub const DEFAULT_MODEL: &str = "CONTRASTcode/stable";

/// Endpoints and defaults used by [`crate::InferenceClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub inference_url: String,
    pub report_url: String,
    pub activation_url: String,
    /// Model used when the settings store has none.
    pub default_model: String,
    /// Whole-request timeout applied by the HTTP transport.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            inference_url: DEFAULT_INFERENCE_URL.to_string(),
            report_url: DEFAULT_REPORT_URL.to_string(),
            activation_url: DEFAULT_ACTIVATION_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Checks every endpoint and the default model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            ("inference_url", &self.inference_url),
            ("report_url", &self.report_url),
            ("activation_url", &self.activation_url),
        ] {
            if url.trim().is_empty() {
                return Err(ConfigError::EmptyEndpoint { name });
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::UnsupportedScheme {
                    name,
                    url: url.clone(),
                });
            }
        }
        self.default_model_name().map(|_| ())
    }

    /// The default model as a typed name.
    pub fn default_model_name(&self) -> Result<ModelName, ConfigError> {
        ModelName::new(self.default_model.trim()).ok_or(ConfigError::EmptyDefaultModel)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(
            config.default_model_name().map(|m| m.to_string()),
            Ok(DEFAULT_MODEL.to_string())
        );
    }

    #[test]
    fn rejects_bad_endpoints() {
        let config = ClientConfig {
            report_url: " ".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyEndpoint { name: "report_url" })
        );

        let config = ClientConfig {
            activation_url: "ftp://max.smallcloud.ai".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedScheme { name: "activation_url", .. })
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"inference_url": "http://127.0.0.1:8008/v1/contrast", "request_timeout": 5}"#)
                .expect("parses");
        assert_eq!(config.inference_url, "http://127.0.0.1:8008/v1/contrast");
        assert_eq!(config.report_url, DEFAULT_REPORT_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn empty_default_model_is_rejected() {
        let config = ClientConfig {
            default_model: String::new(),
            ..ClientConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyDefaultModel));
    }
}
