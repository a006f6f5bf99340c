// Signal Detectors
// Ten independent heuristics, each a pure function of the input text:
// - lexical: high-frequency vocabulary, repeated sentence starters, false ranges
// - leakage: citation anomalies, knowledge-cutoff phrases, assistant tone
// - formatting: em dash density, markdown residue, emoji
// - personal_voice: absence of personal markers ("perfectionism")

use crate::models::{Match, Position, RuleResult, RuleType};
use crate::services::config_store::{AppConfig, RuleConfig};
use crate::services::text_processor::context_snippet;
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

mod formatting;
mod leakage;
mod lexical;
mod personal_voice;

pub use formatting::{EmDashRule, EmojiRule, MarkdownRule};
pub use leakage::{CitationAnomalyRule, CollaborativeToneRule, KnowledgeCutoffRule};
pub use lexical::{FalseRangeRule, HighFrequencyWordsRule, SentenceStartersRule};
pub use personal_voice::PerfectionismRule;

/// A pluggable detector. Implementations must not keep per-call state.
pub trait Rule: Send + Sync {
    fn rule_type(&self) -> RuleType;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn check(&self, text: &str) -> RuleResult;
}

/// Instantiate all ten detectors from the given configuration.
pub fn build_rules(config: &AppConfig) -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(HighFrequencyWordsRule::new(config)),
        Arc::new(SentenceStartersRule::new(config)),
        Arc::new(FalseRangeRule::new(config)),
        Arc::new(CitationAnomalyRule::new(config)),
        Arc::new(EmDashRule::new(config)),
        Arc::new(MarkdownRule::new(config)),
        Arc::new(EmojiRule::new(config)),
        Arc::new(KnowledgeCutoffRule::new(config)),
        Arc::new(CollaborativeToneRule::new(config)),
        Arc::new(PerfectionismRule::new(config)),
    ]
}

fn blank_result(rule: &dyn Rule, settings: &RuleConfig) -> RuleResult {
    RuleResult::new(
        rule.rule_type(),
        rule.name(),
        rule.description(),
        settings.severity,
        settings.threshold,
    )
}

fn make_match(text: &str, position: Position, reason: String) -> Match {
    Match {
        text: text
            .get(position.offset..position.end())
            .unwrap_or_default()
            .to_string(),
        position,
        context: context_snippet(text, position.offset, position.length),
        reason,
    }
}

/// `100 - per_unit * (count - threshold)` once past the threshold, floored at 0.
pub(crate) fn deduction_score(count: usize, threshold: usize, per_unit: f64) -> f64 {
    if count <= threshold {
        return 100.0;
    }
    (100.0 - per_unit * (count - threshold) as f64).max(0.0)
}

/// Ordinary polarity: detected once `count` reaches the threshold.
fn settle_count(result: &mut RuleResult, per_unit: f64) {
    result.detected = result.count > 0 && result.count >= result.threshold;
    result.score = if result.detected {
        deduction_score(result.count, result.threshold, per_unit)
    } else {
        100.0
    };
}

/// Absolute detectors: any hit is conclusive.
fn settle_absolute(result: &mut RuleResult) {
    result.detected = result.count > 0;
    result.score = if result.detected { 0.0 } else { 100.0 };
}

fn compile_patterns(rule_type: RuleType, patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("[RULES] {} skipping invalid pattern {:?}: {}", rule_type, p, e);
                None
            }
        })
        .collect()
}
