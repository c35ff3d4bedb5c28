//! Ordinance - Building-Code Validation Engine
//!
//! Validates building design specifications (JSON documents) against
//! declarative rule sets authored in YAML or JSON. Rules address fields of
//! the specification through dotted paths with wildcard, index, and filter
//! segments; failed conditions are rendered into severity-tagged violations.
//!
//! # Architecture
//!
//! ```text
//! Validator -> RuleSetCache -> RuleSetSource -> document
//!          \-> RuleEngine -> Condition -> FieldPath -> specification
//! ```
//!
//! The validator loads the named rule set through a TTL + mtime invalidated
//! cache, evaluates each applicable rule in declaration order under a time
//! budget, and partitions the findings by the rule set's blocking-severity
//! policy into a [`ValidationResult`].
//!
//! # Authoring Rule Sets
//!
//! Create a YAML (or JSON) document (e.g., `residential-2024.yaml`):
//!
//! ```yaml
//! metadata:
//!   name: residential-2024
//!   jurisdiction: Springfield
//!   version: "2024.1"
//!
//! rules:
//!   - id: setback-front
//!     severity: critical
//!     condition:
//!       type: minimum_value
//!       field: setbacks.front
//!       value: 5.0
//!       unit: m
//!     message: "Front setback is {current_value}{unit}, minimum is {required_value}{unit}"
//!
//!   - id: bedroom-area
//!     severity: warning
//!     condition:
//!       type: minimum_area
//!       field: "spaces[?(@.type=='bedroom')].area"
//!       value: 9.0
//!       unit: m²
//!     message: "Bedroom area {current_value}{unit} is below {required_value}{unit}"
//! ```
//!
//! # Example
//!
//! ```no_run
//! use ordinance::Validator;
//! use serde_json::json;
//!
//! let validator = Validator::from_dir("rule-sets");
//! let spec = json!({"setbacks": {"front": 4.5}});
//! let result = validator
//!     .validate(&spec, "residential-2024", "residential", "inspector-7")?;
//! assert!(!result.is_compliant);
//! # Ok::<(), ordinance::ValidationError>(())
//! ```

pub mod cache;
pub mod condition;
pub mod engine;
pub mod error;
pub mod path;
pub mod report;
pub mod ruleset;
pub mod validator;

// Re-export main types
pub use cache::{CacheStats, Clock, DirectorySource, RuleSetCache, RuleSetSource, SystemClock};
pub use condition::{
    CompareOp, Condition, ConditionKind, EmptyMatchPolicy, Evaluation, FailedCheck,
};
pub use engine::{Deadline, EngineReport, RuleEngine};
pub use error::{LoadError, ValidationError};
pub use path::{FieldPath, PathParseError};
pub use report::{Severity, ValidationResult, Violation};
pub use ruleset::{
    Rule, RuleCategory, RuleSet, RuleSetMeta, SourceFormat, ValidationSettings,
};
pub use validator::Validator;
