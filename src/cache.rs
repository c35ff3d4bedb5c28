//! Rule-set cache
//!
//! Parsing and compiling a rule-set document is the expensive step of a
//! validation call, so parsed rule sets are cached by name. An entry is
//! served as long as its TTL has not elapsed and the source's modification
//! timestamp still matches; otherwise the source is re-read and the entry
//! replaced wholesale. Entries are `Arc`-shared, so readers never observe a
//! half-updated rule set. The clock and the source are injected seams for
//! testability.

use crate::error::{LoadError, ValidationError};
use crate::ruleset::{RuleSet, SourceFormat};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Injected time source (Unix seconds)
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Where rule-set documents come from
///
/// The engine only reads sources; it never writes them. `modified` feeds
/// cache invalidation and returns `None` when the source has no usable
/// modification timestamp (which forces a reload).
pub trait RuleSetSource: Send + Sync {
    /// Read the raw document for a rule-set name.
    fn read(&self, name: &str) -> io::Result<String>;

    /// Current modification timestamp of the source, in Unix seconds.
    fn modified(&self, name: &str) -> Option<u64>;

    /// Human-readable source identifier for error messages.
    fn location(&self, name: &str) -> String;
}

/// Filesystem source: `<root>/<name>.{json,yaml,yml}`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        ["json", "yaml", "yml"]
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", name, ext)))
            .find(|candidate| candidate.is_file())
    }
}

impl RuleSetSource for DirectorySource {
    fn read(&self, name: &str) -> io::Result<String> {
        match self.resolve(name) {
            Some(path) => fs::read_to_string(path),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no rule-set document for '{}'", name),
            )),
        }
    }

    fn modified(&self, name: &str) -> Option<u64> {
        let metadata = fs::metadata(self.resolve(name)?).ok()?;
        let modified = metadata.modified().ok()?;
        modified.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
    }

    fn location(&self, name: &str) -> String {
        match self.resolve(name) {
            Some(path) => path.display().to_string(),
            None => self.root.join(name).display().to_string(),
        }
    }
}

/// One cached, parsed rule set
#[derive(Debug, Clone)]
struct CacheEntry {
    rule_set: Arc<RuleSet>,
    inserted_at: u64,
    source_mtime: Option<u64>,
    source_bytes: usize,
}

/// Observable cache counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub cached_items: usize,
    pub approx_size_bytes: usize,
}

/// Cache of parsed rule sets keyed by name
pub struct RuleSetCache {
    source: Arc<dyn RuleSetSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RuleSetCache {
    /// Default entry time-to-live: one hour.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

    pub fn new(source: Arc<dyn RuleSetSource>, ttl: Duration) -> Self {
        Self {
            source,
            clock: Arc::new(SystemClock),
            ttl,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Replace the wall clock (tests drive TTL expiry with a manual clock).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    pub(crate) fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    /// Load a rule set, serving from cache when the entry is fresh.
    ///
    /// A TTL of zero disables caching entirely: every call is a miss. A
    /// failed reload surfaces the error without evicting a previously cached
    /// valid entry for the name.
    pub fn load(&self, name: &str) -> Result<Arc<RuleSet>, ValidationError> {
        if !self.ttl.is_zero() {
            let now = self.clock.now_unix();
            let entries = self.read_entries();
            if let Some(entry) = entries.get(name) {
                let within_ttl = now.saturating_sub(entry.inserted_at) < self.ttl.as_secs();
                let source_unchanged = self.source.modified(name) == entry.source_mtime;
                if within_ttl && source_unchanged {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("rule set '{}' served from cache", name);
                    return Ok(Arc::clone(&entry.rule_set));
                }
                debug!(
                    "rule set '{}' is {}, reloading",
                    name,
                    if within_ttl { "stale" } else { "expired" }
                );
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Capture the mtime before reading so a write racing the read marks
        // the entry stale rather than fresh.
        let source_mtime = self.source.modified(name);
        let (rule_set, source_bytes) = self.read_and_parse(name)?;

        if !self.ttl.is_zero() {
            let entry = CacheEntry {
                rule_set: Arc::clone(&rule_set),
                inserted_at: self.clock.now_unix(),
                source_mtime,
                source_bytes,
            };
            self.write_entries().insert(name.to_string(), entry);
        }
        Ok(rule_set)
    }

    fn read_and_parse(&self, name: &str) -> Result<(Arc<RuleSet>, usize), ValidationError> {
        let location = self.source.location(name);
        let content = self.source.read(name).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ValidationError::RuleSetNotFound {
                    name: name.to_string(),
                }
            } else {
                ValidationError::RuleSetLoad {
                    name: name.to_string(),
                    location: location.clone(),
                    reason: LoadError::Io(e),
                }
            }
        })?;
        let format = SourceFormat::from_location(&location);
        let rule_set = RuleSet::parse(&content, format).map_err(|reason| {
            ValidationError::RuleSetLoad {
                name: name.to_string(),
                location,
                reason,
            }
        })?;
        debug!(
            "loaded rule set '{}' ({} rules, {} bytes)",
            name,
            rule_set.rules.len(),
            content.len()
        );
        Ok((Arc::new(rule_set), content.len()))
    }

    /// Remove one named entry, or clear the whole cache.
    pub fn invalidate(&self, name: Option<&str>) {
        let mut entries = self.write_entries();
        match name {
            Some(name) => {
                entries.remove(name);
            }
            None => entries.clear(),
        }
    }

    /// Hit/miss counters and an approximate memory footprint.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let entries = self.read_entries();
        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            cached_items: entries.len(),
            approx_size_bytes: entries.values().map(|e| e.source_bytes).sum(),
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
