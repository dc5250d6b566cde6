pub mod field_mapping;
pub mod journey_rules;
pub mod settings;

pub use field_mapping::{FieldFormat, FieldMapEntry, FieldMapping};
pub use journey_rules::{JourneyRulesConfig, KeywordRuleConfig, MenuFlowConfig, RuleConfig};
pub use settings::Settings;
