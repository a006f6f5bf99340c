// Leakage detectors: traces left behind by chat assistants.
// Citation anomalies and knowledge-cutoff phrases are conclusive on a single hit.

use super::{blank_result, make_match, settle_absolute, settle_count, Rule};
use crate::models::{RuleResult, RuleType};
use crate::services::config_store::{AppConfig, RuleConfig};
use crate::services::text_processor::find_pattern;

const COLLABORATIVE_DEDUCTION: f64 = 10.0;

/// Tracking parameters, citation placeholders and template dates.
pub struct CitationAnomalyRule {
    settings: RuleConfig,
    markers: Vec<(String, &'static str)>,
}

impl CitationAnomalyRule {
    pub fn new(config: &AppConfig) -> Self {
        let lexicon = &config.lexicon;
        let tagged = |items: &[String], reason: &'static str| {
            items
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| (s.clone(), reason))
                .collect::<Vec<_>>()
        };
        let mut markers = tagged(lexicon.utm_markers.as_slice(), "chatbot tracking parameter");
        markers.extend(tagged(lexicon.ghost_markers.as_slice(), "leftover citation placeholder"));
        markers.extend(tagged(lexicon.placeholder_dates.as_slice(), "placeholder date"));

        Self {
            settings: config.rule(RuleType::CitationAnomaly),
            markers,
        }
    }
}

impl Rule for CitationAnomalyRule {
    fn rule_type(&self) -> RuleType {
        RuleType::CitationAnomaly
    }

    fn name(&self) -> &'static str {
        "Citation anomalies"
    }

    fn description(&self) -> &'static str {
        "Detects chatbot UTM parameters, ghost citation markers and placeholder dates"
    }

    fn check(&self, text: &str) -> RuleResult {
        let mut result = blank_result(self, &self.settings);

        for (marker, reason) in &self.markers {
            for pos in find_pattern(text, marker) {
                result.count += 1;
                result.add_match(make_match(text, pos, format!("{}: {}", reason, marker)));
            }
        }

        settle_absolute(&mut result);
        result.message = if result.detected {
            format!("{} citation anomalies left by generation tooling", result.count)
        } else {
            "No citation anomalies".to_string()
        };
        result
    }
}

/// Phrases in which a model refers to its own training data.
pub struct KnowledgeCutoffRule {
    settings: RuleConfig,
    phrases: Vec<String>,
}

impl KnowledgeCutoffRule {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            settings: config.rule(RuleType::KnowledgeCutoff),
            phrases: config.lexicon.knowledge_cutoff_phrases.clone(),
        }
    }
}

impl Rule for KnowledgeCutoffRule {
    fn rule_type(&self) -> RuleType {
        RuleType::KnowledgeCutoff
    }

    fn name(&self) -> &'static str {
        "Knowledge cutoff phrases"
    }

    fn description(&self) -> &'static str {
        "Detects references to a training cutoff such as \"As of my last knowledge update\""
    }

    fn check(&self, text: &str) -> RuleResult {
        let mut result = blank_result(self, &self.settings);

        for phrase in &self.phrases {
            for pos in find_pattern(text, phrase) {
                result.count += 1;
                result.add_match(make_match(text, pos, "knowledge cutoff disclaimer".to_string()));
            }
        }

        settle_absolute(&mut result);
        result.message = if result.detected {
            format!("{} knowledge cutoff phrases", result.count)
        } else {
            "No knowledge cutoff phrases".to_string()
        };
        result
    }
}

/// Assistant sign-offs ("I hope this helps", "Let me know if").
pub struct CollaborativeToneRule {
    settings: RuleConfig,
    phrases: Vec<String>,
}

impl CollaborativeToneRule {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            settings: config.rule(RuleType::CollaborativeTone),
            phrases: config.lexicon.collaborative_phrases.clone(),
        }
    }
}

impl Rule for CollaborativeToneRule {
    fn rule_type(&self) -> RuleType {
        RuleType::CollaborativeTone
    }

    fn name(&self) -> &'static str {
        "Collaborative assistant tone"
    }

    fn description(&self) -> &'static str {
        "Detects helper phrases typical of chat assistants"
    }

    fn check(&self, text: &str) -> RuleResult {
        let mut result = blank_result(self, &self.settings);

        for phrase in &self.phrases {
            for pos in find_pattern(text, phrase) {
                result.count += 1;
                result.add_match(make_match(text, pos, format!("assistant phrase \"{}\"", phrase)));
            }
        }

        settle_count(&mut result, COLLABORATIVE_DEDUCTION);
        result.message = if result.detected {
            format!(
                "{} assistant-style phrases, threshold {}",
                result.count, result.threshold
            )
        } else {
            "No assistant-style phrasing".to_string()
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citation_utm_is_absolute() {
        let rule = CitationAnomalyRule::new(&AppConfig::default());
        let result = rule.check("See https://example.com/page?utm_source=chatgpt.com for details.");
        assert!(result.detected);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.count, 1);
        assert_eq!(result.matches[0].text, "utm_source=chatgpt.com");
        assert!(result.matches[0].reason.contains("tracking"));
    }

    #[test]
    fn test_citation_ghost_and_dates() {
        let rule = CitationAnomalyRule::new(&AppConfig::default());
        let text = "Revenue grew fast contentReference[oaicite:3] and closed on YYYY-MM-DD.";
        let result = rule.check(text);
        assert_eq!(result.count, 2);
        assert!(result.detected);

        let clean = rule.check("Published 2023-05-17 in the spring issue.");
        assert!(!clean.detected);
        assert_eq!(clean.score, 100.0);
    }

    #[test]
    fn test_knowledge_cutoff_detected() {
        let rule = KnowledgeCutoffRule::new(&AppConfig::default());
        let result = rule.check("As of my last knowledge update, the library was stable.");
        assert!(result.detected);
        assert_eq!(result.score, 0.0);

        let zh = rule.check("截至我的知识更新，该项目仍在维护。");
        assert!(zh.detected);
        assert_eq!(zh.matches[0].position.offset, 0);
    }

    #[test]
    fn test_collaborative_threshold() {
        let rule = CollaborativeToneRule::new(&AppConfig::default());
        let two = rule.check("I hope this helps! Let me know if anything is unclear.");
        assert_eq!(two.count, 2);
        assert!(!two.detected);

        let five = rule.check(
            "I hope this helps. Let me know if you need more. Feel free to ask. \
             I hope this helps again. Feel free to reach out.",
        );
        assert_eq!(five.count, 5);
        assert!(five.detected);
        assert_eq!(five.score, 80.0);
    }
}
