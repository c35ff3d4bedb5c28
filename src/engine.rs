//! Rule evaluation engine
//!
//! Applies a rule set to a design specification: filters rules by building
//! type, evaluates each condition in declaration order, and renders one
//! violation per failing instance (capped per rule). The engine mutates
//! neither the specification nor the rule set.

use crate::condition::Evaluation;
use crate::error::ValidationError;
use crate::report::{Severity, Violation};
use crate::ruleset::{Rule, RuleSet};
use log::{debug, trace};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Evaluation time budget with its expiry point
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

/// What one engine run produced
#[derive(Debug, Default)]
pub struct EngineReport {
    /// Violations in rule declaration order, document order within a rule
    pub violations: Vec<Violation>,
    /// Applicable rules that were evaluated
    pub rules_checked: usize,
}

/// The rule evaluation engine
#[derive(Debug, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply a rule set to a design specification.
    ///
    /// The deadline is checked before each rule: once it elapses no new rule
    /// is started and the run fails with a timeout. Results are ordered and
    /// deterministic for unchanged inputs.
    pub fn apply(
        &self,
        rule_set: &RuleSet,
        spec: &Value,
        building_type: &str,
        deadline: Option<Deadline>,
    ) -> Result<EngineReport, ValidationError> {
        let cap = rule_set.settings.max_violations_per_rule;
        let mut report = EngineReport::default();

        for rule in &rule_set.rules {
            if !rule.enabled || !rule.applies_to(building_type) {
                trace!("rule '{}' skipped for '{}'", rule.id, building_type);
                continue;
            }
            if let Some(deadline) = deadline {
                if deadline.expired() {
                    return Err(ValidationError::Timeout {
                        budget: deadline.budget(),
                    });
                }
            }
            report.rules_checked += 1;

            let outcome = rule
                .condition
                .evaluate(spec, rule_set.settings.on_empty_match)
                .map_err(|e| ValidationError::UnsupportedCondition {
                    rule_id: rule.id.clone(),
                    kind: e.kind,
                })?;

            match outcome {
                Evaluation::Satisfied | Evaluation::NotApplicable => {
                    trace!("rule '{}': {:?}", rule.id, outcome);
                }
                Evaluation::EmptyMatch => {
                    report.violations.push(empty_match_finding(rule));
                }
                Evaluation::Failed(checks) => {
                    let total = checks.len();
                    if total > cap {
                        debug!(
                            "rule '{}': {} failing instances, reporting first {}",
                            rule.id, total, cap
                        );
                    }
                    for check in checks.into_iter().take(cap) {
                        report.violations.push(render_violation(rule, &check));
                    }
                }
            }
        }

        Ok(report)
    }
}

/// Render a message template, substituting `{placeholder}` bindings.
///
/// Placeholders without a binding are left verbatim so a mis-authored
/// template is visible in the output.
pub fn render(template: &str, bindings: &HashMap<&str, String>) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| match bindings.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex"))
}

fn render_violation(rule: &Rule, check: &crate::condition::FailedCheck) -> Violation {
    let mut bindings = HashMap::new();
    bindings.insert("current_value", display_value(&check.current));
    bindings.insert("required_value", display_value(&check.required));
    bindings.insert("unit", check.unit.clone().unwrap_or_default());
    bindings.insert(
        "allowed_values",
        rule.condition
            .allowed_values
            .as_ref()
            .map(|values| {
                values
                    .iter()
                    .map(display_value)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default(),
    );
    bindings.insert("field", rule.condition.field.clone());

    Violation {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        category: rule.category.clone(),
        severity: rule.severity,
        message: render(&rule.message, &bindings),
        suggestion: rule
            .suggestion
            .as_ref()
            .map(|template| render(template, &bindings)),
        current_value: check.current.clone(),
        required_value: check.required.clone(),
        unit: check.unit.clone(),
    }
}

/// Non-blocking finding for a collection condition with zero matches under
/// the `warn` empty-match policy.
fn empty_match_finding(rule: &Rule) -> Violation {
    Violation {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        category: rule.category.clone(),
        severity: Severity::Warning,
        message: format!(
            "no applicable elements found for '{}'",
            rule.condition.field
        ),
        suggestion: None,
        current_value: Value::Null,
        required_value: Value::Null,
        unit: None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "(missing)".to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::SourceFormat;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rule_set(rules: Value) -> RuleSet {
        let content = json!({"metadata": {"name": "test"}, "rules": rules}).to_string();
        RuleSet::parse(&content, SourceFormat::Json).unwrap()
    }

    #[test]
    fn test_render_substitution() {
        let mut bindings = HashMap::new();
        bindings.insert("current_value", "4.5".to_string());
        bindings.insert("required_value", "5".to_string());
        bindings.insert("unit", "m".to_string());
        assert_eq!(
            render("Setback {current_value}{unit} is below {required_value}{unit}", &bindings),
            "Setback 4.5m is below 5m"
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholders_verbatim() {
        let bindings = HashMap::new();
        assert_eq!(render("value is {mystery}", &bindings), "value is {mystery}");
    }

    #[test]
    fn test_apply_renders_violation() {
        let rules = json!([{
            "id": "setback-front",
            "name": "Front setback",
            "severity": "critical",
            "condition": {"type": "minimum_value", "field": "setbacks.front", "value": 5.0, "unit": "m"},
            "message": "Front setback is {current_value}{unit}, minimum is {required_value}{unit}",
            "suggestion": "Increase the front setback to {required_value}{unit}",
        }]);
        let spec = json!({"setbacks": {"front": 4.5}});
        let report = RuleEngine::new()
            .apply(&rule_set(rules), &spec, "residential", None)
            .unwrap();

        assert_eq!(report.rules_checked, 1);
        assert_eq!(report.violations.len(), 1);
        let violation = &report.violations[0];
        assert_eq!(violation.rule_id, "setback-front");
        assert_eq!(violation.severity, Severity::Critical);
        assert_eq!(violation.message, "Front setback is 4.5m, minimum is 5.0m");
        assert_eq!(
            violation.suggestion.as_deref(),
            Some("Increase the front setback to 5.0m")
        );
        assert_eq!(violation.current_value, json!(4.5));
        assert_eq!(violation.required_value, json!(5.0));
        assert_eq!(violation.unit.as_deref(), Some("m"));
    }

    #[test]
    fn test_building_type_filter_produces_no_violations() {
        let rules = json!([{
            "id": "industrial-only",
            "building_types": ["industrial"],
            "severity": "critical",
            "condition": {"type": "minimum_value", "field": "setbacks.front", "value": 50.0},
            "message": "m",
        }]);
        let spec = json!({"setbacks": {"front": 1.0}});
        let report = RuleEngine::new()
            .apply(&rule_set(rules), &spec, "residential", None)
            .unwrap();
        assert_eq!(report.rules_checked, 0);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_violation_cap_per_rule() {
        let rules = json!([{
            "id": "ceiling-height",
            "condition": {"type": "minimum_value", "field": "spaces[*].ceiling", "value": 2.4},
            "message": "ceiling {current_value}",
        }]);
        let spaces: Vec<Value> = (0..15).map(|_| json!({"ceiling": 2.0})).collect();
        let spec = json!({"spaces": spaces});
        let report = RuleEngine::new()
            .apply(&rule_set(rules), &spec, "residential", None)
            .unwrap();
        // Default cap is 10
        assert_eq!(report.violations.len(), 10);
        assert!(report.violations.iter().all(|v| v.rule_id == "ceiling-height"));
    }

    #[test]
    fn test_violations_keep_declaration_and_document_order() {
        let rules = json!([
            {"id": "first", "condition": {"type": "minimum_value", "field": "spaces[*].area", "value": 9.0}, "message": "area {current_value}"},
            {"id": "second", "condition": {"type": "required_field", "field": "permit"}, "message": "m"},
        ]);
        let spec = json!({"spaces": [{"area": 7.0}, {"area": 8.0}]});
        let report = RuleEngine::new()
            .apply(&rule_set(rules), &spec, "residential", None)
            .unwrap();
        let summary: Vec<(&str, &str)> = report
            .violations
            .iter()
            .map(|v| (v.rule_id.as_str(), v.message.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("first", "area 7.0"), ("first", "area 8.0"), ("second", "m")]
        );
    }

    #[test]
    fn test_unsupported_condition_carries_rule_id() {
        let rules = json!([{
            "id": "mystery",
            "condition": {"type": "maximum_noise", "field": "hvac.noise", "value": 40.0},
            "message": "m",
        }]);
        let error = RuleEngine::new()
            .apply(&rule_set(rules), &json!({}), "residential", None)
            .unwrap_err();
        match error {
            ValidationError::UnsupportedCondition { rule_id, kind } => {
                assert_eq!(rule_id, "mystery");
                assert_eq!(kind, "maximum_noise");
            }
            other => panic!("expected UnsupportedCondition, got {:?}", other),
        }
    }

    #[test]
    fn test_expired_deadline_stops_evaluation() {
        let rules = json!([{
            "id": "r1",
            "condition": {"type": "required_field", "field": "a"},
            "message": "m",
        }]);
        let deadline = Deadline::after(Duration::ZERO);
        let error = RuleEngine::new()
            .apply(&rule_set(rules), &json!({"a": 1}), "residential", Some(deadline))
            .unwrap_err();
        assert!(matches!(error, ValidationError::Timeout { .. }));
    }

    #[test]
    fn test_empty_match_warn_policy() {
        let content = json!({
            "metadata": {"name": "test"},
            "settings": {"on_empty_match": "warn"},
            "rules": [{
                "id": "bedroom-area",
                "severity": "critical",
                "condition": {"type": "minimum_area", "field": "spaces[?(@.type=='bedroom')].area", "value": 9.0},
                "message": "m",
            }],
        })
        .to_string();
        let rule_set = RuleSet::parse(&content, SourceFormat::Json).unwrap();
        let spec = json!({"spaces": [{"type": "kitchen", "area": 6.0}]});
        let report = RuleEngine::new()
            .apply(&rule_set, &spec, "residential", None)
            .unwrap();
        assert_eq!(report.violations.len(), 1);
        let finding = &report.violations[0];
        assert_eq!(finding.severity, Severity::Warning);
        assert!(finding.message.contains("no applicable elements"));
    }

    #[test]
    fn test_allowed_values_placeholder() {
        let rules = json!([{
            "id": "material",
            "condition": {
                "type": "required_field",
                "field": "structure.material",
                "allowed_values": ["concrete", "steel"],
            },
            "message": "material {current_value} is not one of: {allowed_values}",
        }]);
        let spec = json!({"structure": {"material": "straw"}});
        let report = RuleEngine::new()
            .apply(&rule_set(rules), &spec, "residential", None)
            .unwrap();
        assert_eq!(
            report.violations[0].message,
            "material straw is not one of: concrete, steel"
        );
    }
}
