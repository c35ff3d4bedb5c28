//! Rule-set model and loading
//!
//! A rule set is a named, versioned document: metadata, category
//! descriptors, an ordered sequence of rules, and engine-wide validation
//! settings. Rule sets may be authored in JSON or YAML; after
//! deserialization every condition path is compiled once, so evaluation
//! never re-parses path strings. A loaded rule set is immutable.

use crate::condition::{Condition, EmptyMatchPolicy};
use crate::error::LoadError;
use crate::report::Severity;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// Rule-set identity and provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetMeta {
    pub name: String,

    #[serde(default)]
    pub jurisdiction: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub effective_date: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Descriptor for a rule category (keyed by category id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCategory {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// Engine-wide validation configuration carried by the rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Overrides the validator's default time budget when set
    pub timeout_seconds: Option<f64>,

    /// Violations reported per rule; additional failing instances are dropped
    pub max_violations_per_rule: usize,

    /// Severities that block compliance
    pub blocking_severities: Vec<Severity>,

    /// Policy for collection conditions that resolve zero elements
    pub on_empty_match: EmptyMatchPolicy,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            max_violations_per_rule: 10,
            blocking_severities: vec![Severity::Critical],
            on_empty_match: EmptyMatchPolicy::default(),
        }
    }
}

/// A single building-code rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier within the rule set
    pub id: String,

    /// Category id referencing the rule set's category map
    #[serde(default)]
    pub category: Option<String>,

    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,

    /// Detailed description
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub severity: Severity,

    /// Building types this rule applies to; empty or `"*"` means all
    #[serde(default)]
    pub building_types: Vec<String>,

    pub condition: Condition,

    /// Violation message template (`{current_value}`, `{required_value}`,
    /// `{unit}`, `{allowed_values}`, `{field}` placeholders)
    pub message: String,

    /// Optional suggestion template
    #[serde(default)]
    pub suggestion: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Rule {
    /// Whether this rule applies to the given building type.
    pub fn applies_to(&self, building_type: &str) -> bool {
        self.building_types.is_empty()
            || self
                .building_types
                .iter()
                .any(|t| t == building_type || t == "*")
    }
}

/// Source document format, decided by the source location's extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Yaml,
}

impl SourceFormat {
    pub fn from_location(location: &str) -> Self {
        let lower = location.to_lowercase();
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            SourceFormat::Yaml
        } else {
            SourceFormat::Json
        }
    }
}

/// A named, versioned collection of building-code rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(rename = "metadata")]
    pub meta: RuleSetMeta,

    #[serde(default)]
    pub categories: BTreeMap<String, RuleCategory>,

    pub rules: Vec<Rule>,

    #[serde(default)]
    pub settings: ValidationSettings,
}

impl RuleSet {
    /// Parse and compile a rule-set document.
    pub fn parse(content: &str, format: SourceFormat) -> Result<Self, LoadError> {
        let mut rule_set: Self = match format {
            SourceFormat::Json => serde_json::from_str(content)?,
            SourceFormat::Yaml => serde_yaml::from_str(content)?,
        };
        rule_set.compile()?;
        Ok(rule_set)
    }

    /// Validate rule ids and pre-parse every condition path.
    fn compile(&mut self) -> Result<(), LoadError> {
        let mut seen = HashSet::new();
        for rule in &mut self.rules {
            if !seen.insert(rule.id.clone()) {
                return Err(LoadError::Schema(format!("duplicate rule id '{}'", rule.id)));
            }
            if let Some(category) = &rule.category {
                if !self.categories.is_empty() && !self.categories.contains_key(category) {
                    warn!(
                        "rule '{}' references undeclared category '{}'",
                        rule.id, category
                    );
                }
            }
            rule.condition.compile().map_err(|e| LoadError::Path {
                path: e.path,
                message: format!("in rule '{}': {}", rule.id, e.message),
            })?;
        }
        Ok(())
    }

    /// Enabled rules that apply to a building type, in declaration order.
    pub fn applicable_rules<'a>(
        &'a self,
        building_type: &'a str,
    ) -> impl Iterator<Item = &'a Rule> {
        self.rules
            .iter()
            .filter(move |rule| rule.enabled && rule.applies_to(building_type))
    }

    /// The rule set's own time budget, when configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.settings
            .timeout_seconds
            .filter(|secs| *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Whether a severity blocks compliance under this rule set's policy.
    pub fn is_blocking(&self, severity: Severity) -> bool {
        self.settings.blocking_severities.contains(&severity)
    }
}
