// Perfectionism detector: fires when personal markers are scarce.
// Polarity is inverted: a low count of first-person pronouns, emotional words
// and hedges means the text reads suspiciously impersonal.

use super::{blank_result, make_match, Rule};
use crate::models::{Position, RuleResult, RuleType};
use crate::services::config_store::{AppConfig, RuleConfig};
use crate::services::text_processor::{extract_words, find_pattern, find_word, Token};

const DEFICIT_DEDUCTION: f64 = 10.0;

pub struct PerfectionismRule {
    settings: RuleConfig,
    categories: [(&'static str, Vec<String>); 3],
}

impl PerfectionismRule {
    pub fn new(config: &AppConfig) -> Self {
        let lexicon = &config.lexicon;
        Self {
            settings: config.rule(RuleType::Perfectionism),
            categories: [
                ("first-person pronoun", lexicon.first_person_pronouns.clone()),
                ("emotional word", lexicon.emotional_words.clone()),
                ("uncertainty marker", lexicon.uncertainty_markers.clone()),
            ],
        }
    }
}

/// The token with any contraction suffix dropped: "I'm" -> "i".
fn stem(token: &Token) -> &str {
    token
        .lower
        .split(['\'', '\u{2019}'])
        .next()
        .unwrap_or(&token.lower)
}

/// Single ASCII words match whole tokens (so "I'm" counts as "I"); ASCII phrases
/// match on word boundaries; others (CJK) match as substrings.
fn locate(text: &str, words: &[Token], marker: &str) -> Vec<Position> {
    let marker = marker.trim();
    if marker.is_empty() {
        return Vec::new();
    }
    if !marker.is_ascii() {
        return find_pattern(text, marker);
    }
    if !marker.chars().all(|c| c.is_ascii_alphanumeric()) {
        return find_word(text, marker);
    }
    let needle = marker.to_lowercase();
    words
        .iter()
        .filter(|w| stem(w) == needle)
        .map(|w| w.position)
        .collect()
}

impl Rule for PerfectionismRule {
    fn rule_type(&self) -> RuleType {
        RuleType::Perfectionism
    }

    fn name(&self) -> &'static str {
        "Missing personal voice"
    }

    fn description(&self) -> &'static str {
        "Detects text lacking first-person pronouns, emotion and hedging"
    }

    fn check(&self, text: &str) -> RuleResult {
        let mut result = blank_result(self, &self.settings);
        let words = extract_words(text);
        if words.is_empty() {
            result.message = "Empty text".to_string();
            return result;
        }

        let mut tallies = Vec::with_capacity(self.categories.len());
        for (label, markers) in &self.categories {
            let mut found = 0;
            for marker in markers.iter().filter(|m| !m.is_empty()) {
                for pos in locate(text, &words, marker) {
                    found += 1;
                    result.add_match(make_match(text, pos, format!("{} \"{}\"", label, marker)));
                }
            }
            tallies.push(format!("{} {}", found, label));
            result.count += found;
        }

        result.detected = result.count < result.threshold;
        if result.detected {
            let deficit = result.threshold - result.count;
            result.score = (100.0 - DEFICIT_DEDUCTION * deficit as f64).max(0.0);
            result.message = format!(
                "Only {} personal markers ({}), expected at least {}",
                result.count,
                tallies.join(", "),
                result.threshold
            );
        } else {
            result.message = format!("{} personal markers ({})", result.count, tallies.join(", "));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_text_passes() {
        let rule = PerfectionismRule::new(&AppConfig::default());
        let text = "I think this is interesting. I feel that maybe we could try a different approach. \
                    I'm not sure if this will work, but I believe it's worth trying.";
        let result = rule.check(text);
        assert_eq!(result.count, 8);
        assert!(!result.detected);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_impersonal_text_detected() {
        let rule = PerfectionismRule::new(&AppConfig::default());
        let text = "The solution is optimal and will work perfectly. The system delivers consistent results.";
        let result = rule.check(text);
        assert_eq!(result.count, 0);
        assert!(result.detected);
        assert_eq!(result.score, 50.0);
    }

    #[test]
    fn test_pronoun_inside_word_ignored() {
        let rule = PerfectionismRule::new(&AppConfig::default());
        // "This", "is" and "myth" must not count as "I" or "my"
        let result = rule.check("This is a myth. It is fine.");
        assert_eq!(result.count, 0);
    }

    #[test]
    fn test_phrase_markers_counted() {
        let mut config = AppConfig::default();
        config.lexicon.uncertainty_markers = vec!["in my opinion".to_string(), "sort of".to_string()];
        config.lexicon.first_person_pronouns.clear();
        config.lexicon.emotional_words.clear();
        let rule = PerfectionismRule::new(&config);

        let text = "In my opinion the plan is sort of fine. It is sort of late, in my opinion. \
                    The rest is sort of done.";
        let result = rule.check(text);
        assert_eq!(result.count, 5);
        assert!(!result.detected);
        assert_eq!(result.score, 100.0);
        assert!(result.matches.iter().any(|m| m.text == "In my opinion"));
    }

    #[test]
    fn test_phrase_marker_needs_word_boundary() {
        let mut config = AppConfig::default();
        config.lexicon.uncertainty_markers = vec!["sort of".to_string()];
        let rule = PerfectionismRule::new(&config);
        // "resort often" must not count as "sort of"
        let result = rule.check("We resort often to the same tools.");
        assert_eq!(result.count, 0);
    }

    #[test]
    fn test_chinese_markers() {
        let rule = PerfectionismRule::new(&AppConfig::default());
        let text = "我觉得这个方案可能有效。我希望这能帮助大家理解。也许我们可以尝试不同的方法。";
        let result = rule.check(text);
        assert_eq!(result.count, 6);
        assert!(!result.detected);
    }
}
