//! Validation orchestrator
//!
//! [`Validator`] is the crate's front door: it loads the named rule set
//! through the cache, runs the engine under a time budget, partitions the
//! findings by the rule set's blocking-severity policy, and assembles the
//! final [`ValidationResult`]. It holds no per-call state, so one validator
//! can serve concurrent callers.

use crate::cache::{CacheStats, Clock, DirectorySource, RuleSetCache, RuleSetSource};
use crate::engine::{Deadline, RuleEngine};
use crate::error::ValidationError;
use crate::report::ValidationResult;
use log::info;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Validates design specifications against named rule sets
pub struct Validator {
    cache: RuleSetCache,
    engine: RuleEngine,
    timeout: Duration,
}

impl Validator {
    /// Default per-call time budget, used when the rule set does not carry
    /// its own `timeout_seconds`.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(source: Arc<dyn RuleSetSource>) -> Self {
        Self {
            cache: RuleSetCache::new(source, RuleSetCache::DEFAULT_TTL),
            engine: RuleEngine::new(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Validator over rule-set documents in a directory
    /// (`<dir>/<name>.{json,yaml,yml}`).
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(DirectorySource::new(dir.as_ref())))
    }

    /// Set the cache TTL. Zero disables caching.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache.set_ttl(ttl);
        self
    }

    /// Replace the cache's wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache.set_clock(clock);
        self
    }

    /// Set the default time budget for a validation call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate a design specification against a named rule set.
    ///
    /// The specification is read-only; repeated calls with unchanged inputs
    /// produce the same findings. A rule set's own `timeout_seconds`
    /// overrides the validator's default budget.
    pub fn validate(
        &self,
        spec: &Value,
        rule_set_name: &str,
        building_type: &str,
        validated_by: &str,
    ) -> Result<ValidationResult, ValidationError> {
        let started = Instant::now();
        let rule_set = self.cache.load(rule_set_name)?;
        let budget = rule_set.timeout().unwrap_or(self.timeout);

        let report = self.engine.apply(
            &rule_set,
            spec,
            building_type,
            Some(Deadline::after(budget)),
        )?;

        let (violations, warnings): (Vec<_>, Vec<_>) = report
            .violations
            .into_iter()
            .partition(|finding| rule_set.is_blocking(finding.severity));

        let result = ValidationResult {
            rule_set: rule_set.meta.name.clone(),
            rule_set_version: rule_set.meta.version.clone(),
            building_type: building_type.to_string(),
            validated_by: validated_by.to_string(),
            is_compliant: violations.is_empty(),
            violations,
            warnings,
            rules_checked: report.rules_checked,
            duration: started.elapsed(),
        };
        info!(
            "validated against '{}' v{}: {} rules, {} violations, {} warnings, compliant={}",
            result.rule_set,
            result.rule_set_version,
            result.rules_checked,
            result.violations.len(),
            result.warnings.len(),
            result.is_compliant,
        );
        Ok(result)
    }

    /// Cache hit/miss counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop one cached rule set, or all of them.
    pub fn invalidate(&self, rule_set_name: Option<&str>) {
        self.cache.invalidate(rule_set_name);
    }
}
