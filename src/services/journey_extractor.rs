//! Journey extraction
//!
//! Runs an ordered rule list over one conversation. Rules write into a shared
//! field map, so a later rule (or a later message within a rule) overrides an
//! earlier value for the same field. Extraction has no side effects.

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::menu_flow::MenuFlowRule;
use crate::config::{JourneyRulesConfig, KeywordRuleConfig, RuleConfig};
use crate::models::{Conversation, Direction, JourneyRecord};
use crate::utils::SyncError;

pub trait ExtractionRule: Send + Sync {
    fn name(&self) -> &str;

    /// Every field this rule may set
    fn fields(&self) -> Vec<String>;

    fn apply(&self, conversation: &Conversation, fields: &mut BTreeMap<String, Value>);
}

#[derive(Debug, Clone)]
enum KeywordValue {
    Capture(usize),
    Literal(Value),
}

/// Case-insensitive regex over message text
#[derive(Debug, Clone)]
pub struct KeywordRule {
    name: String,
    regex: Regex,
    field: String,
    direction: Option<Direction>,
    value: KeywordValue,
}

impl KeywordRule {
    pub fn from_config(config: &KeywordRuleConfig) -> Result<Self, SyncError> {
        let regex = RegexBuilder::new(&config.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| SyncError::Config(format!("rule '{}': invalid pattern: {}", config.name, e)))?;

        let value = match (config.capture, &config.value) {
            (Some(group), None) => {
                if group >= regex.captures_len() {
                    return Err(SyncError::Config(format!(
                        "rule '{}': capture group {} does not exist in pattern",
                        config.name, group
                    )));
                }
                KeywordValue::Capture(group)
            }
            (None, Some(literal)) => KeywordValue::Literal(literal.clone()),
            _ => {
                return Err(SyncError::Config(format!(
                    "rule '{}': exactly one of capture or value is required",
                    config.name
                )))
            }
        };

        Ok(Self {
            name: config.name.clone(),
            regex,
            field: config.field.clone(),
            direction: config.direction,
            value,
        })
    }

    fn value_for(&self, text: &str) -> Option<Value> {
        match &self.value {
            KeywordValue::Literal(v) => self.regex.is_match(text).then(|| v.clone()),
            KeywordValue::Capture(group) => {
                let captured = self.regex.captures(text)?.get(*group)?.as_str().trim();
                (!captured.is_empty()).then(|| Value::String(captured.to_string()))
            }
        }
    }
}

impl ExtractionRule for KeywordRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<String> {
        vec![self.field.clone()]
    }

    fn apply(&self, conversation: &Conversation, fields: &mut BTreeMap<String, Value>) {
        let messages = conversation
            .entries
            .iter()
            .filter(|e| self.direction.map_or(true, |d| d == e.direction));

        for entry in messages {
            if let Some(value) = self.value_for(&entry.message_text) {
                fields.insert(self.field.clone(), value);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Record(JourneyRecord),
    /// No rule matched; nothing is sent anywhere
    NoSignal,
}

pub struct JourneyExtractor {
    rules: Vec<Box<dyn ExtractionRule>>,
}

impl JourneyExtractor {
    pub fn new(rules: Vec<Box<dyn ExtractionRule>>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &JourneyRulesConfig) -> Result<Self, SyncError> {
        let mut rules: Vec<Box<dyn ExtractionRule>> = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            match rule {
                RuleConfig::Keyword(k) => rules.push(Box::new(KeywordRule::from_config(k)?)),
                RuleConfig::MenuFlow(m) => rules.push(Box::new(MenuFlowRule::new(m))),
            }
        }
        Ok(Self::new(rules))
    }

    pub fn builtin() -> Result<Self, SyncError> {
        Self::from_config(&JourneyRulesConfig::builtin()?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        Self::from_config(&JourneyRulesConfig::load(path).await?)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Union of the fields all rules may set, for mapping validation
    pub fn produced_fields(&self) -> BTreeSet<String> {
        self.rules.iter().flat_map(|r| r.fields()).collect()
    }

    pub fn extract(&self, conversation: &Conversation) -> Extraction {
        let Some(span) = conversation.span() else {
            return Extraction::NoSignal;
        };

        let mut fields = BTreeMap::new();
        for rule in &self.rules {
            rule.apply(conversation, &mut fields);
        }

        if fields.is_empty() {
            return Extraction::NoSignal;
        }

        Extraction::Record(JourneyRecord {
            phone_number: conversation.phone_number.clone(),
            derived_fields: fields,
            span,
        })
    }
}
