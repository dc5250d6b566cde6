//! Loader for the journey extraction rule set
//!
//! Rules live in `config/journey_rules.yaml` (path set by
//! `journey.rules_path`). When the file is absent the copy compiled into the
//! binary is used, so a fresh checkout extracts journeys without extra setup.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::models::Direction;
use crate::utils::SyncError;

const BUILTIN_RULES: &str = include_str!("../../config/journey_rules.yaml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyRulesConfig {
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleConfig {
    Keyword(KeywordRuleConfig),
    MenuFlow(MenuFlowConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRuleConfig {
    pub name: String,
    pub pattern: String,
    pub field: String,
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Regex group used as the value
    #[serde(default)]
    pub capture: Option<usize>,
    /// Literal value, when no capture group is used
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuFlowConfig {
    #[serde(default = "default_start_prompt")]
    pub start_prompt: String,
}

fn default_start_prompt() -> String {
    "how can we assist you today".to_string()
}

impl Default for MenuFlowConfig {
    fn default() -> Self {
        Self {
            start_prompt: default_start_prompt(),
        }
    }
}

impl JourneyRulesConfig {
    pub fn builtin() -> Result<Self, SyncError> {
        Self::from_yaml(BUILTIN_RULES)
    }

    pub fn from_yaml(content: &str) -> Result<Self, SyncError> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| SyncError::Config(format!("invalid journey rules: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, falling back to the built-in rules when it does not exist
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                tracing::info!("📂 Loading journey rules from {}", path.display());
                Self::from_yaml(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("📂 {} not found, using built-in journey rules", path.display());
                Self::builtin()
            }
            Err(e) => Err(SyncError::Config(format!(
                "cannot read journey rules {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.rules.is_empty() {
            return Err(SyncError::Config("journey rules: at least one rule is required".to_string()));
        }

        for rule in &self.rules {
            match rule {
                RuleConfig::Keyword(k) => {
                    if k.field.trim().is_empty() {
                        return Err(SyncError::Config(format!("rule '{}': field is empty", k.name)));
                    }
                    match (&k.capture, &k.value) {
                        (Some(_), Some(_)) => {
                            return Err(SyncError::Config(format!(
                                "rule '{}': set either capture or value, not both",
                                k.name
                            )))
                        }
                        (None, None) => {
                            return Err(SyncError::Config(format!(
                                "rule '{}': capture or value is required",
                                k.name
                            )))
                        }
                        _ => {}
                    }
                }
                RuleConfig::MenuFlow(m) => {
                    if m.start_prompt.trim().is_empty() {
                        return Err(SyncError::Config("menu_flow: start_prompt is empty".to_string()));
                    }
                }
            }
        }

        Ok(())
    }
}
