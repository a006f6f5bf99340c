// Rule Engine
// Registry of detectors keyed by rule type. Every request fans out one blocking
// task per enabled detector and waits for all of them before returning.

use super::rules::{build_rules, Rule};
use crate::models::{RuleResult, RuleType};
use crate::services::config_store::{AppConfig, RuleConfig};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct RuleEngine {
    rules: RwLock<HashMap<RuleType, Arc<dyn Rule>>>,
    settings: BTreeMap<RuleType, RuleConfig>,
}

impl RuleEngine {
    /// An empty registry using the per-rule settings of `config`.
    pub fn new(config: &AppConfig) -> Self {
        let settings = RuleType::ALL
            .iter()
            .map(|&t| (t, config.rule(t)))
            .collect();
        Self {
            rules: RwLock::new(HashMap::new()),
            settings,
        }
    }

    /// A registry holding all ten built-in detectors.
    pub fn from_config(config: &AppConfig) -> Self {
        let engine = Self::new(config);
        for rule in build_rules(config) {
            engine.register(rule);
        }
        info!(
            "[RULE_ENGINE] registered {} detectors, {} enabled",
            engine.count_rules(),
            engine.count_enabled_rules()
        );
        engine
    }

    // Registry guards never stay poisoned: a detector cannot panic while one is held
    fn read(&self) -> RwLockReadGuard<'_, HashMap<RuleType, Arc<dyn Rule>>> {
        self.rules.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RuleType, Arc<dyn Rule>>> {
        self.rules.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds `rule`, replacing any detector already registered for its type.
    pub fn register(&self, rule: Arc<dyn Rule>) {
        let rule_type = rule.rule_type();
        if self.write().insert(rule_type, rule).is_some() {
            debug!("[RULE_ENGINE] replaced detector {}", rule_type);
        }
    }

    pub fn unregister(&self, rule_type: RuleType) -> Option<Arc<dyn Rule>> {
        self.write().remove(&rule_type)
    }

    pub fn get(&self, rule_type: RuleType) -> Option<Arc<dyn Rule>> {
        self.read().get(&rule_type).cloned()
    }

    pub fn is_enabled(&self, rule_type: RuleType) -> bool {
        self.settings.get(&rule_type).map(|s| s.enabled).unwrap_or(true)
    }

    /// Registered and enabled rule types, in declaration order.
    pub fn enabled_rule_types(&self) -> Vec<RuleType> {
        let rules = self.read();
        RuleType::ALL
            .iter()
            .copied()
            .filter(|t| rules.contains_key(t) && self.is_enabled(*t))
            .collect()
    }

    pub fn count_rules(&self) -> usize {
        self.read().len()
    }

    pub fn count_enabled_rules(&self) -> usize {
        self.enabled_rule_types().len()
    }

    /// Runs every enabled detector over `text`.
    pub async fn check(&self, text: &str) -> Vec<RuleResult> {
        let snapshot: Vec<Arc<dyn Rule>> = {
            let rules = self.read();
            rules
                .iter()
                .filter(|(t, _)| self.is_enabled(**t))
                .map(|(_, r)| Arc::clone(r))
                .collect()
        };
        self.dispatch(text, snapshot).await
    }

    /// Runs only the requested detectors; unknown or disabled types are skipped.
    pub async fn check_subset(&self, text: &str, rule_types: &[RuleType]) -> Vec<RuleResult> {
        let wanted: BTreeSet<RuleType> = rule_types.iter().copied().collect();
        let snapshot: Vec<Arc<dyn Rule>> = {
            let rules = self.read();
            wanted
                .iter()
                .filter(|t| self.is_enabled(**t))
                .filter_map(|t| rules.get(t).cloned())
                .collect()
        };
        self.dispatch(text, snapshot).await
    }

    async fn dispatch(&self, text: &str, rules: Vec<Arc<dyn Rule>>) -> Vec<RuleResult> {
        let shared: Arc<str> = Arc::from(text);
        let mut join_set: JoinSet<RuleResult> = JoinSet::new();

        for rule in rules {
            let text = Arc::clone(&shared);
            let settings = self.settings.get(&rule.rule_type()).cloned().unwrap_or_default();
            join_set.spawn_blocking(move || run_isolated(rule.as_ref(), &settings, &text));
        }

        let mut results = Vec::with_capacity(join_set.len());
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(result) => results.push(result),
                Err(e) => warn!("[RULE_ENGINE] detector task failed: {}", e),
            }
        }

        results.sort_by_key(|r| r.rule_type);
        debug!(
            "[RULE_ENGINE] {} results, {} detected",
            results.len(),
            results.iter().filter(|r| r.detected).count()
        );
        results
    }
}

/// Runs one detector; a panic becomes a neutral, non-detected result.
fn run_isolated(rule: &dyn Rule, settings: &RuleConfig, text: &str) -> RuleResult {
    match catch_unwind(AssertUnwindSafe(|| rule.check(text))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!("[RULE_ENGINE] detector {} panicked: {}", rule.rule_type(), reason);

            let mut neutral = RuleResult::new(
                rule.rule_type(),
                rule.name(),
                rule.description(),
                settings.severity,
                settings.threshold,
            );
            neutral.message = format!("Detector failed: {}", reason);
            neutral
        }
    }
}
