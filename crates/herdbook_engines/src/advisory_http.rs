#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use serde_json::Value;

use crate::advisory::AdvisoryError;

pub const DEFAULT_ADVISORY_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_ADVISORY_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ADVISORY_TIMEOUT_MS: u64 = 15_000;

pub const PROVIDER_NAME: &str = "openai_compatible";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryHttpConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl AdvisoryHttpConfig {
    /// `None` when no API key is configured: the advisory capability is absent
    /// and callers go straight to the rule evaluator.
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("HERDBOOK_ADVISORY_API_KEY")
            .ok()
            .and_then(trim_non_empty)?;
        let endpoint = env::var("HERDBOOK_ADVISORY_URL")
            .ok()
            .and_then(trim_non_empty)
            .unwrap_or_else(|| DEFAULT_ADVISORY_URL.to_string());
        let model = env::var("HERDBOOK_ADVISORY_MODEL")
            .ok()
            .and_then(trim_non_empty)
            .unwrap_or_else(|| DEFAULT_ADVISORY_MODEL.to_string());
        let timeout_ms = env::var("HERDBOOK_ADVISORY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| (100..=120_000).contains(v))
            .unwrap_or(DEFAULT_ADVISORY_TIMEOUT_MS);
        Some(Self {
            endpoint,
            api_key,
            model,
            timeout_ms,
            user_agent: "herdbook-advisory/1.0".to_string(),
        })
    }
}

fn trim_non_empty(raw: String) -> Option<String> {
    let v = raw.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

/// Blocking chat-completion client. One request per call, no retries.
#[derive(Debug, Clone)]
pub struct HttpAdvisoryClient {
    config: AdvisoryHttpConfig,
    agent: ureq::Agent,
}

impl HttpAdvisoryClient {
    pub fn new(config: AdvisoryHttpConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms.max(100));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(&config.user_agent)
            .build();
        Self { config, agent }
    }

    pub fn config(&self) -> &AdvisoryHttpConfig {
        &self.config
    }

    /// Sends the prompt and returns the assistant message text.
    pub fn complete(&self, prompt: &str) -> Result<String, AdvisoryError> {
        let payload = serde_json::json!({
            "model": self.config.model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [
                {
                    "role": "system",
                    "content": "You are a livestock breeding advisor. Reply with JSON only.",
                },
                {"role": "user", "content": prompt},
            ],
        });
        let response = self
            .agent
            .post(&self.config.endpoint)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .set("Authorization", &format!("Bearer {}", self.config.api_key))
            .send_json(payload)
            .map_err(error_from_ureq)?;
        let body: Value = serde_json::from_reader(response.into_reader())
            .map_err(|e| AdvisoryError::Malformed(format!("json_parse: {e}")))?;
        extract_message_content(&body)
            .ok_or_else(|| AdvisoryError::Malformed("missing choices[0].message.content".to_string()))
    }
}

fn extract_message_content(body: &Value) -> Option<String> {
    body.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn error_from_ureq(err: ureq::Error) -> AdvisoryError {
    match err {
        ureq::Error::Status(status, _) => AdvisoryError::Transport {
            kind: "http_non_2xx",
            http_status: Some(status),
        },
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            AdvisoryError::Transport {
                kind: classify_transport_error_kind(&combined),
                http_status: None,
            }
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_http_01_message_content_is_extracted_from_first_choice() {
        let body = serde_json::json!({
            "id": "cmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  {\"compatible\": true}  "}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}},
            ],
        });
        assert_eq!(
            extract_message_content(&body).as_deref(),
            Some("{\"compatible\": true}")
        );
        assert_eq!(extract_message_content(&serde_json::json!({"choices": []})), None);
    }

    #[test]
    fn at_http_02_transport_errors_are_classified_without_secrets() {
        assert_eq!(classify_transport_error_kind("Io timed out reading"), "timeout");
        assert_eq!(classify_transport_error_kind("Dns failed lookup"), "dns");
        assert_eq!(classify_transport_error_kind("ConnectionFailed refused"), "connection");
        assert_eq!(classify_transport_error_kind("Io broken pipe"), "transport");
    }

    #[test]
    fn at_http_03_unreachable_endpoint_fails_as_transport() {
        let client = HttpAdvisoryClient::new(AdvisoryHttpConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            api_key: "test-key".to_string(),
            model: DEFAULT_ADVISORY_MODEL.to_string(),
            timeout_ms: 500,
            user_agent: "herdbook-test".to_string(),
        });
        let err = client.complete("hello").unwrap_err();
        assert!(matches!(err, AdvisoryError::Transport { .. }));
    }
}
