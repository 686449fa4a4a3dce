//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root configuration for the event bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Notification stream (WebSocket) settings.
    pub stream: StreamConfig,

    /// External action API settings.
    pub api: ApiConfig,

    /// Correlation engine settings.
    pub engine: EngineConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Deploy-then-audit workflow driven by `txbridge run`.
    pub workflow: WorkflowConfig,
}

/// Notification stream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// WebSocket endpoint (ws:// or wss://).
    pub url: String,

    /// Connect + registration handshake timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Silence on the socket before a ping is sent, in seconds.
    pub idle_timeout_secs: u64,

    /// Time allowed for any frame to arrive after a ping, in seconds.
    pub ping_timeout_secs: u64,

    /// Shutdown-flag polling interval once the connection has ended.
    pub idle_poll_ms: u64,

    /// Perform the register/ack handshake after connecting.
    pub register: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws".to_string(),
            connect_timeout_secs: 10,
            idle_timeout_secs: 20,
            ping_timeout_secs: 10,
            idle_poll_ms: 1000,
            register: true,
        }
    }
}

/// External action API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL for action submission.
    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8545/api".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Correlation engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a single channel wait, in milliseconds.
    /// The shutdown flag is checked every time a wait returns.
    pub poll_interval_ms: u64,

    /// Completed round-trips before the correlation loop returns (0 = forever).
    pub rounds: u64,

    /// Actions allowed to await their confirmation at the same time.
    pub max_in_flight: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            rounds: 1,
            max_in_flight: 1,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Maximum time to wait for the background subscriber to stop.
    pub join_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { join_timeout_secs: 15 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// A contract to deploy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractConfig {
    /// Contract name as known to the API.
    pub name: String,

    /// Optional path to the contract source, sent along with the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,

    /// Constructor inputs.
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

/// Deploy-then-audit workflow configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Contract whose updates are audited.
    pub source_contract: ContractConfig,

    /// Contract receiving the audit entries.
    pub audit_contract: ContractConfig,

    /// Method called on the source contract each round.
    pub update_method: String,

    /// Event emitted by the update call.
    pub expected_event: String,

    /// Method called on the audit contract once the event arrives.
    pub audit_method: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let mut inputs = Map::new();
        inputs.insert("initLicenseid".to_string(), Value::from("RANDOMLICENSEID"));
        inputs.insert("initNote".to_string(), Value::from("RANDOMNOTE"));

        Self {
            source_contract: ContractConfig {
                name: "myDemoContract".to_string(),
                source_path: Some("myDemoContract.sol".to_string()),
                inputs,
            },
            audit_contract: ContractConfig {
                name: "myAuditLog".to_string(),
                source_path: Some("myAuditLog.sol".to_string()),
                inputs: Map::new(),
            },
            update_method: "setContractInformation".to_string(),
            expected_event: "ContractIncremented".to_string(),
            audit_method: "addAuditLog".to_string(),
        }
    }
}
