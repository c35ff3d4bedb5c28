//! Error types for rule-set loading and validation

use std::time::Duration;
use thiserror::Error;

/// Top-level validation error
///
/// Missing data in the design specification is never an error; path
/// resolution and condition evaluation treat it as "not satisfied" or
/// "not applicable". Only structural problems (unresolvable or malformed
/// rule sets, unknown condition types, blown time budgets) reach the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("rule set '{name}' not found")]
    RuleSetNotFound { name: String },

    #[error("failed to load rule set '{name}' from {location}")]
    RuleSetLoad {
        name: String,
        location: String,
        #[source]
        reason: LoadError,
    },

    #[error("rule '{rule_id}' uses unsupported condition type '{kind}'")]
    UnsupportedCondition { rule_id: String, kind: String },

    #[error("validation exceeded the {:.1}s time budget", budget.as_secs_f64())]
    Timeout { budget: Duration },
}

/// Underlying cause of a rule-set load failure
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid field path '{path}': {message}")]
    Path { path: String, message: String },

    #[error("invalid rule set: {0}")]
    Schema(String),
}
