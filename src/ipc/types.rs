use crate::config::EngineConfig;
use crate::model::de_id;
use serde::Deserialize;

/// One JSON line from the host. Hosts number their requests, so the id may
/// be a string or an integer; replies always echo it as a string.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Startup settings only; every request carries its own data snapshot.
pub struct AppState {
    pub config: EngineConfig,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        tracing::info!(
            tie_epsilon = config.tie_epsilon,
            divisor = ?config.primary_annual_divisor,
            prefer_server_values = config.prefer_server_values,
            "engine config in effect"
        );
        Self { config }
    }
}
