// Formatting detectors: em dash density, markdown residue, emoji

use super::{blank_result, compile_patterns, make_match, settle_count, Rule};
use crate::models::{RuleResult, RuleType};
use crate::services::config_store::{AppConfig, RuleConfig};
use crate::services::text_processor::position_at;
use regex::Regex;

const EM_DASH: char = '\u{2014}';
/// Points lost per unit of density (dashes per 1000 chars) above the threshold.
const EM_DASH_DENSITY_DEDUCTION: f64 = 5.0;
const MARKDOWN_DEDUCTION: f64 = 10.0;
const EMOJI_DEDUCTION: f64 = 8.0;

/// Em dashes per 1000 characters; the rule threshold is a density, not a count.
pub struct EmDashRule {
    settings: RuleConfig,
}

impl EmDashRule {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            settings: config.rule(RuleType::EmDashDensity),
        }
    }
}

impl Rule for EmDashRule {
    fn rule_type(&self) -> RuleType {
        RuleType::EmDashDensity
    }

    fn name(&self) -> &'static str {
        "Em dash density"
    }

    fn description(&self) -> &'static str {
        "Detects heavy use of em dashes (\u{2014}), a hallmark of generated prose"
    }

    fn check(&self, text: &str) -> RuleResult {
        let mut result = blank_result(self, &self.settings);
        let char_count = text.chars().count();
        if char_count == 0 {
            result.message = "Empty text".to_string();
            return result;
        }

        for (idx, c) in text.char_indices() {
            if c == EM_DASH {
                result.count += 1;
                let pos = position_at(text, idx, c.len_utf8());
                result.add_match(make_match(text, pos, "em dash".to_string()));
            }
        }

        let density = result.count as f64 * 1000.0 / char_count as f64;
        let limit = self.settings.threshold as f64;
        result.detected = result.count > 0 && density >= limit;
        if result.detected {
            result.score = (100.0 - (density - limit) * EM_DASH_DENSITY_DEDUCTION).clamp(0.0, 100.0);
            result.message = format!(
                "Em dash density {:.2} per 1000 chars exceeds {:.2}",
                density, limit
            );
        } else {
            result.message = format!("Em dash density {:.2} per 1000 chars", density);
        }
        result
    }
}

/// Markup syntax (headings, bold, links, code fences) left in supposedly plain prose.
pub struct MarkdownRule {
    settings: RuleConfig,
    patterns: Vec<Regex>,
}

impl MarkdownRule {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            settings: config.rule(RuleType::MarkdownResidue),
            patterns: compile_patterns(RuleType::MarkdownResidue, &config.lexicon.markdown_patterns),
        }
    }
}

impl Rule for MarkdownRule {
    fn rule_type(&self) -> RuleType {
        RuleType::MarkdownResidue
    }

    fn name(&self) -> &'static str {
        "Markdown residue"
    }

    fn description(&self) -> &'static str {
        "Detects leftover markdown such as ##, **bold**, [links](url) and code fences"
    }

    fn check(&self, text: &str) -> RuleResult {
        let mut result = blank_result(self, &self.settings);

        for re in &self.patterns {
            for m in re.find_iter(text) {
                result.count += 1;
                let pos = position_at(text, m.start(), m.len());
                result.add_match(make_match(text, pos, "markdown syntax".to_string()));
            }
        }

        settle_count(&mut result, MARKDOWN_DEDUCTION);
        result.message = if result.detected {
            format!("{} markdown artifacts, threshold {}", result.count, result.threshold)
        } else {
            "No markdown residue".to_string()
        };
        result
    }
}

/// Pictographic emoji. Modifiers, variation selectors and ZWJ sequences fold
/// into the emoji they decorate; a regional-indicator pair counts as one flag.
pub struct EmojiRule {
    settings: RuleConfig,
}

impl EmojiRule {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            settings: config.rule(RuleType::EmojiAnomaly),
        }
    }
}

pub(crate) fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F600..=0x1F64F
        | 0x1F300..=0x1F5FF
        | 0x1F680..=0x1F6FF
        | 0x1F1E0..=0x1F1FF
        | 0x2600..=0x26FF
        | 0x2700..=0x27BF
        | 0x1F900..=0x1F9FF
        | 0x1FA70..=0x1FAFF)
}

fn is_regional_indicator(c: char) -> bool {
    matches!(c as u32, 0x1F1E6..=0x1F1FF)
}

fn is_modifier(c: char) -> bool {
    matches!(c as u32, 0xFE00..=0xFE0F | 0x1F3FB..=0x1F3FF)
}

const ZWJ: char = '\u{200D}';

/// Byte spans of each emoji cluster in `text`.
fn emoji_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if !is_emoji(c) || is_modifier(c) {
            continue;
        }
        let mut end = start + c.len_utf8();

        if is_regional_indicator(c) {
            if let Some(&(j, n)) = chars.peek() {
                if is_regional_indicator(n) {
                    end = j + n.len_utf8();
                    chars.next();
                }
            }
        }

        while let Some(&(j, n)) = chars.peek() {
            if is_modifier(n) {
                end = j + n.len_utf8();
                chars.next();
            } else if n == ZWJ {
                chars.next();
                end = j + n.len_utf8();
                if let Some(&(k, joined)) = chars.peek() {
                    if is_emoji(joined) {
                        end = k + joined.len_utf8();
                        chars.next();
                    }
                }
            } else {
                break;
            }
        }

        spans.push((start, end));
    }

    spans
}

impl Rule for EmojiRule {
    fn rule_type(&self) -> RuleType {
        RuleType::EmojiAnomaly
    }

    fn name(&self) -> &'static str {
        "Emoji anomaly"
    }

    fn description(&self) -> &'static str {
        "Detects dense emoji decoration typical of chatbot formatting"
    }

    fn check(&self, text: &str) -> RuleResult {
        let mut result = blank_result(self, &self.settings);

        for (start, end) in emoji_spans(text) {
            result.count += 1;
            let pos = position_at(text, start, end - start);
            result.add_match(make_match(text, pos, "emoji".to_string()));
        }

        settle_count(&mut result, EMOJI_DEDUCTION);
        result.message = if result.detected {
            format!("{} emoji, threshold {}", result.count, result.threshold)
        } else {
            "Emoji usage is normal".to_string()
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_em_dash_plain_text() {
        let rule = EmDashRule::new(&AppConfig::default());
        let result = rule.check("This is a normal text without any em dashes.");
        assert!(!result.detected);
        assert_eq!(result.count, 0);
    }

    #[test]
    fn test_em_dash_sparse_in_long_text() {
        let rule = EmDashRule::new(&AppConfig::default());
        let text = "This is a long paragraph about technology and innovation that discusses various topics in depth. \
                    The technology landscape is changing rapidly. Modern software development practices have evolved \
                    significantly. This is important \u{2014} really important for understanding the context.";
        let result = rule.check(text);
        assert_eq!(result.count, 1);
        assert!(!result.detected);
    }

    #[test]
    fn test_em_dash_dense() {
        let rule = EmDashRule::new(&AppConfig::default());
        let text = "AI is transforming \u{2014} fundamentally changing \u{2014} every aspect \u{2014} from healthcare \
                    \u{2014} to finance \u{2014} creating unprecedented \u{2014} opportunities \u{2014} for innovation \
                    \u{2014} across industries.";
        let result = rule.check(text);
        assert_eq!(result.count, 8);
        assert!(result.detected);
        assert!(result.score < 100.0);
        assert_eq!(result.matches[0].text, "\u{2014}");
    }

    #[test]
    fn test_double_hyphen_is_not_em_dash() {
        let rule = EmDashRule::new(&AppConfig::default());
        let result = rule.check("This -- is -- a -- test -- with -- many -- double -- dashes.");
        assert_eq!(result.count, 0);
        assert!(!result.detected);
    }

    #[test]
    fn test_markdown_headers_and_bold() {
        let rule = MarkdownRule::new(&AppConfig::default());
        let headers = rule.check("## Intro\nText\n## Body\nMore\n## End\nDone");
        assert_eq!(headers.count, 3);
        assert!(headers.detected);

        let bold = rule.check("This is **important** and **very** **much** **so**.");
        assert_eq!(bold.count, 4);
        assert!(bold.detected);
        assert_eq!(bold.score, 90.0);
    }

    #[test]
    fn test_markdown_bare_heading_markers() {
        let rule = MarkdownRule::new(&AppConfig::default());
        let result = rule.check("##Intro\ntext\n###\nmore\n#Body\ndone");
        assert_eq!(result.count, 3);
        assert!(result.detected);
    }

    #[test]
    fn test_markdown_mixed_and_plain() {
        let rule = MarkdownRule::new(&AppConfig::default());
        let mixed = rule.check("## Title\nSome **bold** words and [a link](https://example.com).");
        assert_eq!(mixed.count, 3);
        assert!(mixed.detected);

        let fences = rule.check("```\ncode\n```\ntext\n```\nmore\n```");
        assert!(fences.detected);

        assert!(!rule.check("Plain prose with no markup at all.").detected);
        assert!(!rule.check("Only one **bold** phrase here.").detected);
        assert!(!rule.check("Issue #42 is fixed.").detected);
    }

    #[test]
    fn test_emoji_counting() {
        let rule = EmojiRule::new(&AppConfig::default());
        let few = rule.check("Great job \u{1F600} see you \u{1F680}");
        assert_eq!(few.count, 2);
        assert!(!few.detected);

        let many = rule.check("\u{1F600}\u{1F680}\u{2728}\u{1F525}\u{1F4A1}\u{1F389} launch day");
        assert_eq!(many.count, 6);
        assert!(many.detected);
        assert_eq!(many.score, 92.0);
    }

    #[test]
    fn test_emoji_clusters_fold() {
        // heart + VS16, thumbs up + skin tone, family ZWJ sequence, flag pair
        let text = "\u{2764}\u{FE0F} \u{1F44D}\u{1F3FD} \u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467} \u{1F1FA}\u{1F1F8}";
        let spans = emoji_spans(text);
        assert_eq!(spans.len(), 4);
        for (s, e) in spans {
            assert!(text.get(s..e).is_some());
        }
    }
}
