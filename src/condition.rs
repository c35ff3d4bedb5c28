//! Condition model and evaluation
//!
//! A rule carries exactly one [`Condition`]: a typed check against the design
//! specification. Conditions are plain data deserialized from the rule-set
//! document; their field paths are compiled once at load time and evaluation
//! is a pure function over the specification. Missing data never raises - a
//! value that cannot be found simply fails (or skips) the check.

use crate::path::{values_equal, FieldPath, PathParseError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// The closed set of condition types the evaluator implements
///
/// Unrecognized type strings deserialize to `Unknown` and surface as an
/// [`UnsupportedCondition`] error when the rule is evaluated, so a rule set
/// authored for a newer engine still loads and fails with a precise error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionKind {
    MinimumValue,
    MaximumValue,
    RequiredField,
    MinimumCount,
    MinimumArea,
    MinimumPercentage,
    Unknown(String),
}

impl From<String> for ConditionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "minimum_value" => ConditionKind::MinimumValue,
            "maximum_value" => ConditionKind::MaximumValue,
            "required_field" => ConditionKind::RequiredField,
            "minimum_count" => ConditionKind::MinimumCount,
            "minimum_area" => ConditionKind::MinimumArea,
            "minimum_percentage" => ConditionKind::MinimumPercentage,
            _ => ConditionKind::Unknown(s),
        }
    }
}

impl From<ConditionKind> for String {
    fn from(kind: ConditionKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionKind::MinimumValue => write!(f, "minimum_value"),
            ConditionKind::MaximumValue => write!(f, "maximum_value"),
            ConditionKind::RequiredField => write!(f, "required_field"),
            ConditionKind::MinimumCount => write!(f, "minimum_count"),
            ConditionKind::MinimumArea => write!(f, "minimum_area"),
            ConditionKind::MinimumPercentage => write!(f, "minimum_percentage"),
            ConditionKind::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// Numeric comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl CompareOp {
    /// Apply the operator. Float equality is exact; no epsilon is introduced.
    pub fn compare(&self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Gte => left >= right,
            CompareOp::Gt => left > right,
            CompareOp::Lte => left <= right,
            CompareOp::Lt => left < right,
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Gte => ">=",
            CompareOp::Gt => ">",
            CompareOp::Lte => "<=",
            CompareOp::Lt => "<",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        };
        write!(f, "{}", symbol)
    }
}

/// Policy for collection conditions that resolve zero elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyMatchPolicy {
    /// Nothing to violate: the condition is vacuously satisfied
    #[default]
    Satisfied,
    /// Report a non-critical "no applicable elements" finding
    Warn,
}

/// A rule's condition, as authored in the rule-set document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Condition type tag
    #[serde(rename = "type")]
    pub kind: ConditionKind,

    /// Field path into the design specification
    #[serde(default)]
    pub field: String,

    /// Comparison operator; defaults to `>=` (`<=` for `maximum_value`)
    #[serde(default)]
    pub operator: Option<CompareOp>,

    /// Numeric threshold
    #[serde(default)]
    pub value: Option<f64>,

    /// Unit label carried into violations (e.g. "m", "m²")
    #[serde(default)]
    pub unit: Option<String>,

    /// For `required_field`: the resolved value must be one of these
    #[serde(default)]
    pub allowed_values: Option<Vec<Value>>,

    /// For `minimum_percentage`: denominator path (numerator is `field`)
    #[serde(default)]
    pub total_field: Option<String>,

    /// Gating sub-condition; when unsatisfied the rule is not applicable
    #[serde(default)]
    pub applies_when: Option<Box<Condition>>,

    #[serde(skip)]
    pub(crate) path: Option<FieldPath>,

    #[serde(skip)]
    pub(crate) total_path: Option<FieldPath>,
}

/// Evaluation error: the rule set references a condition type this engine
/// does not implement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported condition type '{kind}'")]
pub struct UnsupportedCondition {
    pub kind: String,
}

/// One failing instance of a condition
#[derive(Debug, Clone, PartialEq)]
pub struct FailedCheck {
    pub current: Value,
    pub required: Value,
    pub unit: Option<String>,
}

/// Outcome of evaluating a condition against a specification
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Every resolved instance passed
    Satisfied,
    /// Gated off by `applies_when`; the rule does not apply
    NotApplicable,
    /// A collection condition resolved zero elements under the `warn` policy
    EmptyMatch,
    /// One entry per failing instance, in document order
    Failed(Vec<FailedCheck>),
}

impl Condition {
    /// Compile the condition's field paths. Called once after the rule set
    /// is deserialized; evaluation never re-parses path strings.
    pub(crate) fn compile(&mut self) -> Result<(), PathParseError> {
        if matches!(self.kind, ConditionKind::Unknown(_)) {
            // Unknown kinds keep their raw shape and fail at evaluation.
            return Ok(());
        }
        self.path = Some(FieldPath::parse(&self.field)?);
        self.total_path = match &self.total_field {
            Some(total) => Some(FieldPath::parse(total)?),
            None => None,
        };
        if let Some(gate) = &mut self.applies_when {
            gate.compile()?;
        }
        Ok(())
    }

    /// The operator in effect, applying the per-kind default.
    pub fn effective_op(&self) -> CompareOp {
        self.operator.unwrap_or(match self.kind {
            ConditionKind::MaximumValue => CompareOp::Lte,
            _ => CompareOp::Gte,
        })
    }

    /// Evaluate against a design specification.
    pub fn evaluate(
        &self,
        doc: &Value,
        on_empty: EmptyMatchPolicy,
    ) -> Result<Evaluation, UnsupportedCondition> {
        if let Some(gate) = &self.applies_when {
            if gate.evaluate(doc, EmptyMatchPolicy::Satisfied)? != Evaluation::Satisfied {
                return Ok(Evaluation::NotApplicable);
            }
        }

        let matches = match &self.path {
            Some(path) => path.resolve(doc),
            None => Vec::new(),
        };

        match &self.kind {
            ConditionKind::MinimumValue | ConditionKind::MaximumValue => {
                // A path with no match cannot be shown compliant: fail with a
                // null current value rather than silently passing.
                if matches.is_empty() {
                    return Ok(Evaluation::Failed(vec![self.failed(Value::Null)]));
                }
                Ok(self.check_each_numeric(&matches))
            }
            ConditionKind::RequiredField => Ok(self.check_required(&matches)),
            ConditionKind::MinimumCount => Ok(self.check_count(&matches)),
            ConditionKind::MinimumArea => {
                if matches.is_empty() {
                    return Ok(empty_outcome(on_empty));
                }
                Ok(self.check_each_numeric(&matches))
            }
            ConditionKind::MinimumPercentage => Ok(self.check_percentage(doc, &matches, on_empty)),
            ConditionKind::Unknown(raw) => Err(UnsupportedCondition { kind: raw.clone() }),
        }
    }

    /// Test every resolved value independently; each failing instance becomes
    /// its own check ("fail if any fails").
    fn check_each_numeric(&self, matches: &[&Value]) -> Evaluation {
        let op = self.effective_op();
        let threshold = self.value.unwrap_or(0.0);
        let failures: Vec<FailedCheck> = matches
            .iter()
            .filter(|value| !value.as_f64().is_some_and(|n| op.compare(n, threshold)))
            .map(|value| self.failed((*value).clone()))
            .collect();
        if failures.is_empty() {
            Evaluation::Satisfied
        } else {
            Evaluation::Failed(failures)
        }
    }

    fn check_required(&self, matches: &[&Value]) -> Evaluation {
        let found = matches.iter().find(|value| !value.is_null());
        match found {
            None => Evaluation::Failed(vec![FailedCheck {
                current: Value::Null,
                required: self
                    .allowed_values
                    .clone()
                    .map(Value::Array)
                    .unwrap_or_else(|| Value::String("present".to_string())),
                unit: self.unit.clone(),
            }]),
            Some(value) => match &self.allowed_values {
                Some(allowed) if !allowed.iter().any(|a| values_equal(a, value)) => {
                    Evaluation::Failed(vec![FailedCheck {
                        current: (*value).clone(),
                        required: Value::Array(allowed.clone()),
                        unit: self.unit.clone(),
                    }])
                }
                _ => Evaluation::Satisfied,
            },
        }
    }

    fn check_count(&self, matches: &[&Value]) -> Evaluation {
        // A single numeric match is the count itself (`fire_safety.exits = 2`
        // means two exits); an array match is measured by its length.
        let count = if matches.len() == 1 {
            match matches[0] {
                Value::Array(items) => items.len() as f64,
                other => other.as_f64().unwrap_or(1.0),
            }
        } else {
            matches.len() as f64
        };
        let threshold = self.value.unwrap_or(0.0);
        if self.effective_op().compare(count, threshold) {
            Evaluation::Satisfied
        } else {
            Evaluation::Failed(vec![FailedCheck {
                current: whole_number(count),
                required: whole_number(threshold),
                unit: self.unit.clone(),
            }])
        }
    }

    fn check_percentage(
        &self,
        doc: &Value,
        matches: &[&Value],
        on_empty: EmptyMatchPolicy,
    ) -> Evaluation {
        let (satisfying, total) = match &self.total_path {
            Some(total_path) => (matches.len(), total_path.resolve(doc).len()),
            // Without a denominator path, the field resolves a boolean flag
            // collection and the percentage is the share of `true`.
            None => (
                matches
                    .iter()
                    .filter(|value| value.as_bool() == Some(true))
                    .count(),
                matches.len(),
            ),
        };
        if total == 0 {
            return empty_outcome(on_empty);
        }
        let percentage = 100.0 * satisfying as f64 / total as f64;
        let threshold = self.value.unwrap_or(0.0);
        if self.effective_op().compare(percentage, threshold) {
            Evaluation::Satisfied
        } else {
            Evaluation::Failed(vec![FailedCheck {
                current: whole_number(percentage),
                required: whole_number(threshold),
                unit: self.unit.clone().or_else(|| Some("%".to_string())),
            }])
        }
    }

    fn failed(&self, current: Value) -> FailedCheck {
        FailedCheck {
            current,
            required: self.value.map(Value::from).unwrap_or(Value::Null),
            unit: self.unit.clone(),
        }
    }
}

fn empty_outcome(on_empty: EmptyMatchPolicy) -> Evaluation {
    match on_empty {
        EmptyMatchPolicy::Satisfied => Evaluation::Satisfied,
        EmptyMatchPolicy::Warn => Evaluation::EmptyMatch,
    }
}

/// Render whole numbers as integers (counts, percentages).
fn whole_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < u64::MAX as f64 && n >= 0.0 {
        Value::from(n as u64)
    } else {
        Value::from(n)
    }
}
