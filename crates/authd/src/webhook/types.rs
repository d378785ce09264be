//! Wire types for the broker's webhook protocol (JSON over HTTP POST).
//! Field names match the broker's contract exactly; they are not renamed to
//! Rust convention beyond what serde's `rename_all` already covers.

use serde::{Deserialize, Serialize};

fn default_qos() -> u8 {
    0
}

/// Fields shared by every decision-point request.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseRequest {
    #[serde(default)]
    pub mountpoint: String,
    pub client_id: String,
    pub username: String,
    #[serde(default)]
    pub peer_addr: String,
    #[serde(default)]
    pub peer_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub clean_session: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub topic: String,
    #[serde(default = "default_qos")]
    pub qos: u8,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub retain: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicFilter {
    pub topic: String,
    #[serde(default = "default_qos")]
    pub qos: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub topics: Vec<TopicFilter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
}

/// The broker-facing verdict for a CONNECT/PUBLISH decision: either `ok` or a
/// tagged deny carrying the error-kind string, never a bare bool.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DecisionResponse {
    Ok(OkBody),
    Deny { result: DenyResult },
}

#[derive(Debug, Clone, Serialize)]
pub struct OkBody {
    pub result: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenyResult {
    pub error: &'static str,
}

impl DecisionResponse {
    pub fn ok() -> Self {
        DecisionResponse::Ok(OkBody { result: "ok" })
    }

    pub fn deny(error_kind: &'static str) -> Self {
        DecisionResponse::Deny {
            result: DenyResult { error: error_kind },
        }
    }
}

/// One filter's outcome within a SUBSCRIBE response: the granted qos, or a
/// rejection marker. The broker convention represented here is a negative qos.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SubscribeOutcome {
    Granted { topic: String, qos: u8 },
    Rejected { topic: String, qos: i8 },
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeResponse {
    pub result: &'static str,
    pub topics: Vec<SubscribeOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
