//! In-memory cache of the compiled rule set fetched from the control plane.
//!
//! Holds `{fingerprint, compiled rules, fetched_at}`, replaced
//! atomically on a non-empty sync response. TTL bounds staleness for
//! fail-safe evaluation; an expired cache forces a re-sync before the next
//! `observe`.

use std::time::Duration;

use tk_core::compiler::CompiledRule;
use tk_core::fingerprint::Fingerprint;
use tk_core::identity::Timestamp;

/// A single cached snapshot of the active, in-scope rule set.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub rules: Vec<CompiledRule>,
    pub fetched_at: Timestamp,
}

/// Holds at most one snapshot; replaced wholesale on each successful sync.
#[derive(Debug, Default)]
pub struct RuleCache {
    entry: Option<CacheEntry>,
    ttl: Option<Duration>,
}

impl RuleCache {
    /// `ttl = None` means the cache never expires on its own (a re-sync is
    /// still attempted on the sensor's normal cadence).
    pub fn new(ttl: Option<Duration>) -> Self {
        Self { entry: None, ttl }
    }

    pub fn current(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.entry.as_ref().map(|e| &e.fingerprint)
    }

    /// Replace the cache. Called on every sync response whose fingerprint
    /// differs from the prior one; an unchanged-fingerprint response
    /// should instead call [`RuleCache::touch`].
    pub fn replace(&mut self, fingerprint: Fingerprint, rules: Vec<CompiledRule>, fetched_at: Timestamp) {
        self.entry = Some(CacheEntry { fingerprint, rules, fetched_at });
    }

    /// Refresh `fetched_at` without changing the cached rule set, for a
    /// sync response that reported "no change".
    pub fn touch(&mut self, at: Timestamp) {
        if let Some(entry) = &mut self.entry {
            entry.fetched_at = at;
        }
    }

    /// Whether the cache has exceeded its TTL as of `now`. A cache with no
    /// TTL, or no entry at all, is never stale by this measure (an empty
    /// cache is handled separately by the fail-safe pass-through rule).
    pub fn is_stale(&self, now: Timestamp) -> bool {
        match (&self.entry, self.ttl) {
            (Some(entry), Some(ttl)) => {
                let age = now.signed_duration_since(entry.fetched_at);
                age.to_std().map(|age| age > ttl).unwrap_or(false)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tk_testkit::fixtures::simple_rule;
    use tk_core::rule::{FieldType, Operator};

    fn compiled(rule_name: &str) -> CompiledRule {
        let rule = simple_rule(rule_name, Operator::Eq, FieldType::Text, serde_json::json!("x"));
        tk_core::compiler::compile(&rule).expect("fixture rule compiles").0
    }

    #[test]
    fn empty_cache_is_never_stale() {
        let cache = RuleCache::new(Some(Duration::from_secs(60)));
        assert!(!cache.is_stale(chrono::Utc::now()));
    }

    #[test]
    fn replace_then_expired_ttl_reports_stale() {
        let mut cache = RuleCache::new(Some(Duration::from_secs(60)));
        let fetched_at = chrono::Utc::now() - chrono::Duration::seconds(120);
        cache.replace(Fingerprint("a".repeat(64)), vec![compiled("f")], fetched_at);
        assert!(cache.is_stale(chrono::Utc::now()));
    }

    #[test]
    fn touch_refreshes_fetched_at_without_changing_rules() {
        let mut cache = RuleCache::new(Some(Duration::from_secs(60)));
        let fetched_at = chrono::Utc::now() - chrono::Duration::seconds(120);
        cache.replace(Fingerprint("a".repeat(64)), vec![compiled("f")], fetched_at);
        cache.touch(chrono::Utc::now());
        assert!(!cache.is_stale(chrono::Utc::now()));
        assert_eq!(cache.current().unwrap().rules.len(), 1);
    }
}
