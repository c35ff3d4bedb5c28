//! Validation report types
//!
//! The engine's output is a [`ValidationResult`]: an immutable value handed
//! back to the caller for persistence or serialization. The engine itself
//! never stores or transmits it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Severity classification for rule violations
///
/// Ordered by escalation so `Critical > Warning > Info`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational finding
    Info,
    /// Should be addressed but does not block compliance
    #[default]
    Warning,
    /// Blocks compliance
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "critical" | "error" => Ok(Severity::Critical),
            _ => Err(()),
        }
    }
}

/// A rendered, severity-tagged record of one failed condition instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule that produced this violation
    pub rule_id: String,

    /// Human-readable rule name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,

    /// Category id from the rule set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Severity of the violated rule
    pub severity: Severity,

    /// Rendered violation message
    pub message: String,

    /// Rendered suggestion, when the rule carries a suggestion template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// Value found in the specification (null when the field was missing)
    #[serde(default)]
    pub current_value: Value,

    /// Value the rule requires
    #[serde(default)]
    pub required_value: Value,

    /// Unit label for the compared values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// The compliance report for one validation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Name of the rule set the specification was checked against
    pub rule_set: String,

    /// Version of that rule set
    pub rule_set_version: String,

    /// Building type the rules were filtered by
    pub building_type: String,

    /// Caller-supplied identity recorded on the report
    pub validated_by: String,

    /// True iff no blocking violations remain
    pub is_compliant: bool,

    /// Blocking violations (per the rule set's severity policy)
    pub violations: Vec<Violation>,

    /// Non-blocking findings
    pub warnings: Vec<Violation>,

    /// Number of applicable rules evaluated
    pub rules_checked: usize,

    /// Wall-clock time spent validating
    pub duration: Duration,
}

impl ValidationResult {
    /// Whether any non-blocking findings were reported.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Total findings across both partitions.
    pub fn total_findings(&self) -> usize {
        self.violations.len() + self.warnings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("critical".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!("error".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!("warning".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("info".parse::<Severity>(), Ok(Severity::Info));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_severity_display_round_trip() {
        for severity in [Severity::Info, Severity::Warning, Severity::Critical] {
            assert_eq!(severity.to_string().parse::<Severity>(), Ok(severity));
        }
    }

    #[test]
    fn test_severity_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        let severity: Severity = serde_json::from_str("\"info\"").unwrap();
        assert_eq!(severity, Severity::Info);
    }

    #[test]
    fn test_result_helpers() {
        let result = ValidationResult {
            rule_set: "residential".to_string(),
            rule_set_version: "2024.1".to_string(),
            building_type: "residential".to_string(),
            validated_by: "tester".to_string(),
            is_compliant: true,
            violations: Vec::new(),
            warnings: vec![Violation {
                rule_id: "r1".to_string(),
                rule_name: None,
                category: None,
                severity: Severity::Warning,
                message: "m".to_string(),
                suggestion: None,
                current_value: Value::Null,
                required_value: Value::Null,
                unit: None,
            }],
            rules_checked: 1,
            duration: Duration::from_millis(3),
        };
        assert!(result.has_warnings());
        assert_eq!(result.total_findings(), 1);
    }
}
