// Lexical detectors: overused vocabulary, stock sentence openers, "from X to Y" ranges

use super::{blank_result, compile_patterns, make_match, settle_count, Rule};
use crate::models::{RuleResult, RuleType};
use crate::services::config_store::{AppConfig, RuleConfig};
use crate::services::text_processor::{find_word, position_at, split_sentences};
use regex::{Regex, RegexBuilder};
use tracing::warn;

const HIGH_FREQUENCY_DEDUCTION: f64 = 10.0;
const STARTER_DEDUCTION: f64 = 8.0;
const FALSE_RANGE_DEDUCTION: f64 = 15.0;

/// Flags vocabulary that language models reach for far more than people do.
/// Only keywords that individually reach the threshold contribute to the count.
pub struct HighFrequencyWordsRule {
    settings: RuleConfig,
    keywords: Vec<String>,
}

impl HighFrequencyWordsRule {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            settings: config.rule(RuleType::HighFrequencyWords),
            keywords: config.lexicon.high_frequency_words.clone(),
        }
    }
}

impl Rule for HighFrequencyWordsRule {
    fn rule_type(&self) -> RuleType {
        RuleType::HighFrequencyWords
    }

    fn name(&self) -> &'static str {
        "High-frequency AI vocabulary"
    }

    fn description(&self) -> &'static str {
        "Detects overuse of words such as crucial, pivotal and vital that generated text favours"
    }

    fn check(&self, text: &str) -> RuleResult {
        let mut result = blank_result(self, &self.settings);
        let mut flagged = Vec::new();

        for keyword in &self.keywords {
            let hits = find_word(text, keyword);
            if hits.is_empty() || hits.len() < self.settings.threshold {
                continue;
            }
            result.count += hits.len();
            flagged.push(format!("{} x{}", keyword, hits.len()));
            for pos in hits {
                result.add_match(make_match(text, pos, format!("high-frequency word \"{}\"", keyword)));
            }
        }

        settle_count(&mut result, HIGH_FREQUENCY_DEDUCTION);
        result.message = if result.detected {
            format!(
                "{} overused keyword occurrences ({}), threshold {}",
                result.count,
                flagged.join(", "),
                result.threshold
            )
        } else {
            "No overused keywords".to_string()
        };
        result
    }
}

/// Counts sentences that open with a stock connective ("Moreover", "此外").
pub struct SentenceStartersRule {
    settings: RuleConfig,
    starters: Vec<(String, Regex)>,
}

impl SentenceStartersRule {
    pub fn new(config: &AppConfig) -> Self {
        let starters = config
            .lexicon
            .sentence_starters
            .iter()
            .filter(|s| !s.trim().is_empty())
            .filter_map(|s| {
                let word = s.trim();
                let boundary = if word.ends_with(|c: char| c.is_ascii_alphanumeric()) { r"\b" } else { "" };
                let pattern = format!("^{}{}", regex::escape(word), boundary);
                match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                    Ok(re) => Some((word.to_string(), re)),
                    Err(e) => {
                        warn!("[RULES] sentence_starters skipping {:?}: {}", word, e);
                        None
                    }
                }
            })
            .collect();

        Self {
            settings: config.rule(RuleType::SentenceStarters),
            starters,
        }
    }
}

impl Rule for SentenceStartersRule {
    fn rule_type(&self) -> RuleType {
        RuleType::SentenceStarters
    }

    fn name(&self) -> &'static str {
        "Repetitive sentence starters"
    }

    fn description(&self) -> &'static str {
        "Detects sentences opening with connectives such as Additionally, Furthermore and Moreover"
    }

    fn check(&self, text: &str) -> RuleResult {
        let mut result = blank_result(self, &self.settings);

        for sentence in split_sentences(text) {
            // One hit per sentence at most
            let hit = self
                .starters
                .iter()
                .find_map(|(word, re)| re.find(&sentence.text).map(|m| (word, m.len())));
            if let Some((word, len)) = hit {
                result.count += 1;
                let pos = position_at(text, sentence.position.offset, len);
                result.add_match(make_match(text, pos, format!("sentence opens with \"{}\"", word)));
            }
        }

        settle_count(&mut result, STARTER_DEDUCTION);
        result.message = if result.detected {
            format!(
                "{} sentences open with stock connectives, threshold {}",
                result.count, result.threshold
            )
        } else {
            "Sentence openings look varied".to_string()
        };
        result
    }
}

/// Flags sweeping "from X to Y" constructions that span unrelated categories.
pub struct FalseRangeRule {
    settings: RuleConfig,
    patterns: Vec<Regex>,
}

impl FalseRangeRule {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            settings: config.rule(RuleType::FalseRange),
            patterns: compile_patterns(RuleType::FalseRange, &config.lexicon.false_range_patterns),
        }
    }
}

impl Rule for FalseRangeRule {
    fn rule_type(&self) -> RuleType {
        RuleType::FalseRange
    }

    fn name(&self) -> &'static str {
        "False range expressions"
    }

    fn description(&self) -> &'static str {
        "Detects \"from X to Y\" phrasing that implies a range where none exists"
    }

    fn check(&self, text: &str) -> RuleResult {
        let mut result = blank_result(self, &self.settings);

        for re in &self.patterns {
            for m in re.find_iter(text) {
                result.count += 1;
                let pos = position_at(text, m.start(), m.len());
                result.add_match(make_match(text, pos, "possible false range".to_string()));
            }
        }

        settle_count(&mut result, FALSE_RANGE_DEDUCTION);
        result.message = if result.detected {
            format!(
                "{} false range expressions, threshold {}",
                result.count, result.threshold
            )
        } else {
            "No false range expressions".to_string()
        };
        result
    }
}
