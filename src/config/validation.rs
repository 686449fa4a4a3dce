//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URL schemes for the stream and API endpoints
//! - Validate value ranges (intervals and timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::BridgeConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field}: unsupported scheme '{scheme}' (expected one of {expected})")]
    UnsupportedScheme {
        field: &'static str,
        scheme: String,
        expected: &'static str,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "stream.url", &config.stream.url, &["ws", "wss"], "ws, wss");
    check_url(&mut errors, "api.base_url", &config.api.base_url, &["http", "https"], "http, https");

    let non_zero: [(&'static str, u64); 7] = [
        ("stream.connect_timeout_secs", config.stream.connect_timeout_secs),
        ("stream.idle_timeout_secs", config.stream.idle_timeout_secs),
        ("stream.ping_timeout_secs", config.stream.ping_timeout_secs),
        ("stream.idle_poll_ms", config.stream.idle_poll_ms),
        ("api.timeout_secs", config.api.timeout_secs),
        ("engine.poll_interval_ms", config.engine.poll_interval_ms),
        ("shutdown.join_timeout_secs", config.shutdown.join_timeout_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    if config.engine.max_in_flight == 0 {
        errors.push(ValidationError::Zero { field: "engine.max_in_flight" });
    }

    let workflow = &config.workflow;
    let names: [(&'static str, &str); 5] = [
        ("workflow.source_contract.name", &workflow.source_contract.name),
        ("workflow.audit_contract.name", &workflow.audit_contract.name),
        ("workflow.update_method", &workflow.update_method),
        ("workflow.expected_event", &workflow.expected_event),
        ("workflow.audit_method", &workflow.audit_method),
    ];
    for (field, value) in names {
        if value.trim().is_empty() {
            errors.push(ValidationError::Empty { field });
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &str,
    schemes: &[&str],
    expected: &'static str,
) {
    match Url::parse(value) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ValidationError::UnsupportedScheme {
            field,
            scheme: url.scheme().to_string(),
            expected,
        }),
        Err(_) => errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}
