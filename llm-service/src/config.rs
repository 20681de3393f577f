//! Configuration for the chat-completions client.

use crate::errors::LlmError;

/// Complete configuration for one OpenAI-compatible model endpoint.
///
/// The caller (usually the review engine) builds this from its own
/// configuration snapshot; this crate only validates and consumes it.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `https://api.deepseek.com`.
    /// The client appends `/v1/chat/completions`.
    pub endpoint: String,
    /// Model identifier passed through to the provider.
    pub model: String,
    /// Bearer token for the `Authorization` header.
    pub api_key: String,
    /// Sampling temperature; review runs want low-variance output.
    pub temperature: f32,
    /// Full-request deadline in seconds.
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Validates endpoint scheme, key presence, and parameter ranges.
    pub fn validate(&self) -> Result<(), LlmError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(LlmError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.model.trim().is_empty() {
            return Err(LlmError::InvalidParameter {
                name: "model",
                reason: "must not be empty".into(),
            });
        }
        if self.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(self.endpoint.clone()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LlmError::InvalidParameter {
                name: "temperature",
                reason: format!("{} is outside 0.0..=2.0", self.temperature),
            });
        }
        if self.timeout_secs == 0 {
            return Err(LlmError::InvalidParameter {
                name: "timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> LlmConfig {
        LlmConfig {
            endpoint: "https://api.deepseek.com".into(),
            model: "deepseek/deepseek-chat".into(),
            api_key: "sk-test".into(),
            temperature: 0.2,
            timeout_secs: 120,
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_bad_endpoint_scheme() {
        let mut cfg = valid();
        cfg.endpoint = "ftp://example.com".into();
        assert!(matches!(
            cfg.validate(),
            Err(LlmError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn rejects_missing_api_key() {
        let mut cfg = valid();
        cfg.api_key = "  ".into();
        assert!(matches!(cfg.validate(), Err(LlmError::MissingApiKey(_))));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let mut cfg = valid();
        cfg.temperature = 3.5;
        assert!(matches!(
            cfg.validate(),
            Err(LlmError::InvalidParameter { name: "temperature", .. })
        ));
    }
}
