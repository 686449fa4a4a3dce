//! Blocking HTTP action client.
//!
//! # Responsibilities
//! - Submit deploy and invoke actions to the REST API
//! - Extract the correlation key (and deployed target) from the response
//! - Enforce the configured request timeout
//!
//! # Security Constraints
//! - API keys ONLY from environment variables
//! - Never log keys or sensitive data

use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::fs;
use std::time::Duration;

use crate::client::types::{
    ActionClient, ActionError, ActionResult, DeployRequest, InvokeRequest, Submission,
};
use crate::config::ApiConfig;
use crate::envelope::CorrelationKey;

/// Environment variable holding the API write key.
pub const API_KEY_ENV_VAR: &str = "TXBRIDGE_API_KEY";

/// Environment variable holding the stream read key.
pub const API_READ_KEY_ENV_VAR: &str = "TXBRIDGE_API_READ_KEY";

/// Read a required secret from the environment.
pub fn secret_from_env(var: &str) -> ActionResult<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ActionError::Credentials(format!("{} is not set", var))),
    }
}

/// `ActionClient` backed by a blocking `reqwest` client.
///
/// Must be created and dropped outside any Tokio runtime.
pub struct HttpActionClient {
    client: Client,
    config: ApiConfig,
    api_key: String,
}

impl HttpActionClient {
    /// Create a client with an explicit API key.
    pub fn new(config: ApiConfig, api_key: impl Into<String>) -> ActionResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ActionError::Request(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(base_url = %config.base_url, "Action client initialized");

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    /// Create a client with the key from [`API_KEY_ENV_VAR`].
    pub fn from_env(config: ApiConfig) -> ActionResult<Self> {
        let api_key = secret_from_env(API_KEY_ENV_VAR)?;
        Self::new(config, api_key)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn post(&self, url: String, body: &Value) -> ActionResult<Value> {
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(ActionError::Request(format!("{} returned {}: {}", url, status, text)));
        }

        response.json::<Value>().map_err(|e| self.map_transport_error(e))
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ActionError {
        if e.is_timeout() {
            ActionError::Timeout(self.config.timeout_secs)
        } else {
            ActionError::Request(e.to_string())
        }
    }
}

impl ActionClient for HttpActionClient {
    fn deploy(&self, request: &DeployRequest) -> ActionResult<Submission> {
        let mut body = json!({
            "name": request.contract_name,
            "inputs": request.inputs,
        });
        if let Some(path) = &request.source_path {
            let code = fs::read_to_string(path)
                .map_err(|e| ActionError::Input(format!("{}: {}", path, e)))?;
            body["code"] = Value::String(code);
        }

        let response = self.post(self.endpoint("deploy"), &body)?;
        let submission = parse_submission(&response)?;
        tracing::debug!(
            label = %request.label,
            contract = %request.contract_name,
            key = %submission.key,
            "Deploy submitted"
        );
        Ok(submission)
    }

    fn invoke(&self, request: &InvokeRequest) -> ActionResult<Submission> {
        let path = format!("contract/{}/{}", request.target, request.method);
        let response = self.post(self.endpoint(&path), &Value::Object(request.params.clone()))?;
        let submission = parse_submission(&response)?;
        tracing::debug!(method = %request.method, key = %submission.key, "Invoke submitted");
        Ok(submission)
    }
}

impl std::fmt::Debug for HttpActionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpActionClient")
            .field("base_url", &self.config.base_url)
            .field("timeout_secs", &self.config.timeout_secs)
            .finish()
    }
}

/// Pull the correlation key out of an API response.
///
/// Accepts `{"data": {...}}`, `{"data": [{...}]}` or a bare object, with the
/// key under `txhash`, `txHash` or `hash`.
pub fn parse_submission(body: &Value) -> ActionResult<Submission> {
    if body.get("success") == Some(&Value::Bool(false)) {
        let reason = body
            .get("error")
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(ActionError::Rejected(reason));
    }

    let data = body.get("data").unwrap_or(body);
    let entry = match data {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    };

    let key = ["txhash", "txHash", "hash"]
        .iter()
        .find_map(|field| entry.get(*field).and_then(Value::as_str))
        .ok_or(ActionError::MissingKey)?;

    let target = entry
        .get("contract")
        .and_then(Value::as_str)
        .map(str::to_owned);

    Ok(Submission {
        key: CorrelationKey::from(key),
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deploy_response() {
        let body = json!({"success": true, "data": {"contract": "0xc0ffee", "txhash": "0xd1"}});
        let submission = parse_submission(&body).unwrap();
        assert_eq!(submission.key.as_str(), "0xd1");
        assert_eq!(submission.target.as_deref(), Some("0xc0ffee"));
    }

    #[test]
    fn test_parse_invoke_response() {
        let body = json!({"success": true, "data": [{"txHash": "0xtx1"}]});
        let submission = parse_submission(&body).unwrap();
        assert_eq!(submission.key.as_str(), "0xtx1");
        assert!(submission.target.is_none());
    }

    #[test]
    fn test_parse_rejection_and_missing_key() {
        let body = json!({"success": false, "error": "insufficient balance"});
        let err = parse_submission(&body).unwrap_err();
        assert_eq!(err.to_string(), "API rejected action: insufficient balance");

        let body = json!({"success": true, "data": []});
        assert!(matches!(parse_submission(&body), Err(ActionError::MissingKey)));
    }

    #[test]
    fn test_missing_secret() {
        let err = secret_from_env("TXBRIDGE_TEST_DEFINITELY_UNSET").unwrap_err();
        assert!(matches!(err, ActionError::Credentials(_)));
    }
}
