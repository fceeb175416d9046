//! Engine settings.
//!
//! Loaded once at startup from the TOML file named by `BULLETIND_CONFIG`
//! (defaults apply when the variable is unset). Any request may override
//! single fields through `params.config`.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_ENV: &str = "BULLETIND_CONFIG";

/// Averages closer than this share a rank.
pub const DEFAULT_TIE_EPSILON: f64 = 0.01;

/// How the primary annual average is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAnnualDivisor {
    /// Always divide by nine; months without grades count as 0.
    FixedNine,
    /// Divide by the number of months that have an average.
    MonthsWithData,
}

impl PrimaryAnnualDivisor {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fixed_nine" | "fixednine" | "9" => Some(Self::FixedNine),
            "months_with_data" | "monthswithdata" => Some(Self::MonthsWithData),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    #[serde(alias = "tie_epsilon")]
    pub tie_epsilon: f64,
    #[serde(alias = "primary_annual_divisor")]
    pub primary_annual_divisor: PrimaryAnnualDivisor,
    #[serde(alias = "prefer_server_values")]
    pub prefer_server_values: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tie_epsilon: DEFAULT_TIE_EPSILON,
            primary_annual_divisor: PrimaryAnnualDivisor::FixedNine,
            prefer_server_values: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tie_epsilon.is_finite() || self.tie_epsilon < 0.0 {
            return Err(ConfigError::new(
                "tieEpsilon must be a finite, non-negative number",
            ));
        }
        Ok(())
    }

    /// Applies a JSON override object (`params.config`) on top of `self`.
    pub fn with_overrides(&self, raw: Option<&serde_json::Value>) -> Result<Self, ConfigError> {
        let Some(raw) = raw else {
            return Ok(self.clone());
        };
        if raw.is_null() {
            return Ok(self.clone());
        }
        let Some(obj) = raw.as_object() else {
            return Err(ConfigError::new("config must be an object"));
        };

        let mut out = self.clone();
        match obj.get("tieEpsilon") {
            None => {}
            Some(v) if v.is_null() => {}
            Some(v) => {
                let Some(eps) = v.as_f64() else {
                    return Err(ConfigError::new("config.tieEpsilon must be a number"));
                };
                out.tie_epsilon = eps;
            }
        }
        match obj.get("primaryAnnualDivisor") {
            None => {}
            Some(v) if v.is_null() => {}
            Some(v) => {
                let Some(d) = v.as_str().and_then(PrimaryAnnualDivisor::parse) else {
                    return Err(ConfigError::new(
                        "config.primaryAnnualDivisor must be one of: fixed_nine, months_with_data",
                    ));
                };
                out.primary_annual_divisor = d;
            }
        }
        match obj.get("preferServerValues") {
            None => {}
            Some(v) if v.is_null() => {}
            Some(v) => {
                let Some(b) = v.as_bool() else {
                    return Err(ConfigError::new(
                        "config.preferServerValues must be a boolean",
                    ));
                };
                out.prefer_server_values = b;
            }
        }
        out.validate()?;
        Ok(out)
    }
}

pub fn load_from_path(path: &Path) -> anyhow::Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    tracing::info!(path = %path.display(), ?cfg, "loaded engine config");
    Ok(cfg)
}

pub fn load_from_env() -> anyhow::Result<EngineConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(p) if !p.trim().is_empty() => load_from_path(Path::new(p.trim())),
        _ => Ok(EngineConfig::default()),
    }
}
