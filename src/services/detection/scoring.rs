// Score Calculator
// Rule results -> five weighted dimensions -> total, then multiplicative red-flag penalties.

use crate::models::{DimensionScore, DimensionScores, RuleResult, RuleType, Score};
use crate::services::config_store::DimensionWeights;
use std::collections::BTreeMap;
use tracing::debug;

/// Floor applied once any red-flag factor has been multiplied in.
pub const RED_FLAG_FLOOR: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    VocabularyDiversity,
    SentenceComplexity,
    Personalization,
    LogicalCoherence,
    EmotionalAuthenticity,
}

/// (dimension, feeding rule, share of the dimension's max, issue text)
const ROUTES: &[(Dimension, RuleType, f64, &str)] = &[
    (Dimension::VocabularyDiversity, RuleType::HighFrequencyWords, 0.6, "Overuses vocabulary favoured by language models"),
    (Dimension::VocabularyDiversity, RuleType::SentenceStarters, 0.4, "Repeats stock sentence openers"),
    (Dimension::SentenceComplexity, RuleType::SentenceStarters, 0.5, "Sentence structure is monotonous"),
    (Dimension::SentenceComplexity, RuleType::EmDashDensity, 0.5, "Em dashes are overused"),
    (Dimension::Personalization, RuleType::Perfectionism, 1.0, "Lacks first-person voice, emotion and hedging"),
    (Dimension::LogicalCoherence, RuleType::FalseRange, 1.0, "Uses sweeping \"from X to Y\" ranges"),
    (Dimension::EmotionalAuthenticity, RuleType::CollaborativeTone, 0.5, "Uses assistant-style collaborative phrasing"),
    (Dimension::EmotionalAuthenticity, RuleType::Perfectionism, 0.5, "Emotionally flat, overly polished tone"),
];

/// How a detected red-flag rule scales the total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedFlagPenalty {
    pub base_factor: f64,
    pub max_deduction_rate: f64,
    /// Severity-adjusted curve bounded below by `base_factor`, as opposed to a linear rate.
    pub bounded: bool,
}

impl RedFlagPenalty {
    pub fn for_rule(rule_type: RuleType) -> Option<Self> {
        let (base_factor, max_deduction_rate, bounded) = match rule_type {
            RuleType::CitationAnomaly | RuleType::KnowledgeCutoff => (0.50, 0.50, true),
            RuleType::MarkdownResidue => (0.80, 0.20, false),
            RuleType::EmojiAnomaly => (0.90, 0.10, false),
            _ => return None,
        };
        Some(Self { base_factor, max_deduction_rate, bounded })
    }

    /// Multiplier for a detection with the given rule score.
    pub fn factor(&self, rule_score: f64) -> f64 {
        let severity = ((100.0 - rule_score) / 100.0).clamp(0.0, 1.0);
        if self.bounded {
            (1.0 - (1.0 - self.base_factor) * severity).max(self.base_factor)
        } else {
            1.0 - severity * self.max_deduction_rate
        }
    }
}

pub struct ScoreCalculator {
    weights: DimensionWeights,
}

impl ScoreCalculator {
    pub fn new(weights: DimensionWeights) -> Self {
        Self { weights }
    }

    pub fn calculate(&self, results: &[RuleResult]) -> Score {
        let dimensions = self.calculate_dimensions(results);
        let total = self.total_with_red_flags(&dimensions, results);
        let breakdown: BTreeMap<RuleType, f64> = results.iter().map(|r| (r.rule_type, r.score)).collect();

        debug!("[SCORING] total={:.2} from {} rule results", total, results.len());
        Score {
            total,
            dimensions,
            breakdown,
        }
    }

    pub fn calculate_dimensions(&self, results: &[RuleResult]) -> DimensionScores {
        DimensionScores {
            vocabulary_diversity: self.dimension(
                Dimension::VocabularyDiversity,
                results,
                self.weights.vocabulary_diversity,
                "Range and variety of word choice",
                "Vocabulary is varied with no generated-text patterns",
            ),
            sentence_complexity: self.dimension(
                Dimension::SentenceComplexity,
                results,
                self.weights.sentence_complexity,
                "Variety and complexity of sentence structure",
                "Sentence structure reads naturally",
            ),
            personalization: self.dimension(
                Dimension::Personalization,
                results,
                self.weights.personalization,
                "Degree of personal style and subjective expression",
                "Personal voice is present",
            ),
            logical_coherence: self.dimension(
                Dimension::LogicalCoherence,
                results,
                self.weights.logical_coherence,
                "Naturalness of the logical structure",
                "Logic flows naturally",
            ),
            emotional_authenticity: self.dimension(
                Dimension::EmotionalAuthenticity,
                results,
                self.weights.emotional_authenticity,
                "Authenticity of emotional expression",
                "Emotional expression reads as genuine",
            ),
        }
    }

    fn dimension(
        &self,
        which: Dimension,
        results: &[RuleResult],
        max_score: f64,
        description: &str,
        clean_description: &str,
    ) -> DimensionScore {
        let mut dim = DimensionScore::new(max_score.max(0.0), description);

        for (_, rule_type, share, issue) in ROUTES.iter().filter(|(d, ..)| *d == which) {
            let Some(result) = find(results, *rule_type) else { continue };
            if !result.detected {
                continue;
            }
            let deduction = (100.0 - result.score.clamp(0.0, 100.0)) / 100.0 * dim.max_score * share;
            dim.deduct(deduction, Some(issue.to_string()));
        }

        if dim.issues.is_empty() {
            dim.description = clean_description.to_string();
        }
        dim
    }

    /// Sum of dimension scores, clamped to 0-100.
    pub fn calculate_total(&self, dimensions: &DimensionScores) -> f64 {
        dimensions.sum().clamp(0.0, 100.0)
    }

    /// Total with every detected red flag multiplied in. The result is floored at
    /// `RED_FLAG_FLOOR`, but never above the unpenalized total: a red flag can only lower a score.
    pub fn total_with_red_flags(&self, dimensions: &DimensionScores, results: &[RuleResult]) -> f64 {
        let base = self.calculate_total(dimensions);
        let mut total = base;
        let mut applied = false;

        for result in results.iter().filter(|r| r.detected) {
            if let Some(penalty) = RedFlagPenalty::for_rule(result.rule_type) {
                let factor = penalty.factor(result.score);
                debug!("[SCORING] red flag {} factor {:.3}", result.rule_type, factor);
                total *= factor;
                applied = true;
            }
        }

        if applied {
            total = total.max(RED_FLAG_FLOOR.min(base)).min(base);
        }
        total
    }
}

fn find(results: &[RuleResult], rule_type: RuleType) -> Option<&RuleResult> {
    results.iter().find(|r| r.rule_type == rule_type)
}

/// Rule-layer confidence for tiered fusion.
pub fn rule_confidence(total: f64, results: &[RuleResult]) -> f64 {
    let detected = results.iter().filter(|r| r.detected).count();
    let red_flags = results
        .iter()
        .filter(|r| r.detected && r.rule_type.is_red_flag())
        .count();

    let mut confidence = total / 100.0 + 0.1 * red_flags as f64;
    if detected >= 5 {
        confidence += 0.15;
    } else if detected >= 3 {
        confidence += 0.10;
    }
    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn result(rule_type: RuleType, detected: bool, score: f64) -> RuleResult {
        let mut r = RuleResult::new(rule_type, "test", "test", Severity::Medium, 3);
        r.detected = detected;
        r.score = score;
        r
    }

    fn clean_results() -> Vec<RuleResult> {
        RuleType::ALL.iter().map(|&t| result(t, false, 100.0)).collect()
    }

    fn calculator() -> ScoreCalculator {
        ScoreCalculator::new(DimensionWeights::default())
    }

    #[test]
    fn test_clean_results_score_full() {
        let score = calculator().calculate(&clean_results());
        assert_eq!(score.total, 100.0);
        assert_eq!(score.breakdown.len(), 10);
        for dim in score.dimensions.iter() {
            assert_eq!(dim.percentage, 100.0);
            assert_eq!(dim.level, "excellent");
            assert!(dim.issues.is_empty());
        }
    }

    #[test]
    fn test_double_red_flag_multiplies() {
        let mut results = clean_results();
        results[3] = result(RuleType::CitationAnomaly, true, 0.0);
        results[7] = result(RuleType::KnowledgeCutoff, true, 0.0);
        let score = calculator().calculate(&results);
        assert!((score.total - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_knowledge_cutoff_halves_total() {
        let mut results = clean_results();
        // Perfectionism at 50 costs 12.5 personalization + 5 emotional -> 82.5
        results[9] = result(RuleType::Perfectionism, true, 50.0);
        let calc = calculator();
        let before = calc.calculate(&results).total;
        assert!((before - 82.5).abs() < 1e-9);

        results[7] = result(RuleType::KnowledgeCutoff, true, 0.0);
        let after = calc.calculate(&results).total;
        assert!((after - before * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_red_flag_floor() {
        // Everything but collaborative tone maxed out leaves 10 emotional points;
        // all four red flags then scale 10 down to 1.8, which the floor lifts to 5
        let results: Vec<RuleResult> = RuleType::ALL
            .iter()
            .map(|&t| result(t, t != RuleType::CollaborativeTone, 0.0))
            .collect();
        let score = calculator().calculate(&results);
        assert_eq!(score.total, RED_FLAG_FLOOR);
    }

    #[test]
    fn test_red_flag_never_raises_total() {
        let calc = calculator();
        let mut results = clean_results();
        for idx in [0, 1, 2, 4, 8, 9] {
            results[idx].detected = true;
            results[idx].score = 0.0;
        }
        assert_eq!(calc.calculate(&results).total, 0.0);

        for flag in [
            RuleType::CitationAnomaly,
            RuleType::KnowledgeCutoff,
            RuleType::MarkdownResidue,
            RuleType::EmojiAnomaly,
        ] {
            let mut flagged = results.clone();
            let idx = flagged.iter().position(|r| r.rule_type == flag).unwrap();
            flagged[idx] = result(flag, true, 0.0);
            assert_eq!(calc.calculate(&flagged).total, 0.0, "{} raised the total", flag);
        }

        // Stacking flags one at a time is monotone from any starting total
        let mut stacked = clean_results();
        stacked[9] = result(RuleType::Perfectionism, true, 0.0);
        let mut previous = calc.calculate(&stacked).total;
        for idx in [3, 5, 6, 7] {
            stacked[idx].detected = true;
            stacked[idx].score = 0.0;
            let total = calc.calculate(&stacked).total;
            assert!(total <= previous);
            previous = total;
        }
    }

    #[test]
    fn test_floor_only_with_red_flag() {
        let mut results = clean_results();
        for idx in [0, 1, 2, 4, 8, 9] {
            results[idx].detected = true;
            results[idx].score = 0.0;
        }
        let score = calculator().calculate(&results);
        assert_eq!(score.total, 0.0);
    }

    #[test]
    fn test_markdown_and_emoji_linear_rate() {
        let markdown = RedFlagPenalty::for_rule(RuleType::MarkdownResidue).unwrap();
        assert!((markdown.factor(0.0) - 0.8).abs() < 1e-9);
        assert!((markdown.factor(50.0) - 0.9).abs() < 1e-9);
        let emoji = RedFlagPenalty::for_rule(RuleType::EmojiAnomaly).unwrap();
        assert!((emoji.factor(92.0) - 0.992).abs() < 1e-9);
        assert!(RedFlagPenalty::for_rule(RuleType::FalseRange).is_none());
    }

    #[test]
    fn test_dimension_routing() {
        let mut results = clean_results();
        results[0] = result(RuleType::HighFrequencyWords, true, 30.0);
        let dims = calculator().calculate_dimensions(&results);
        // 0.7 * 20 * 0.6 = 8.4
        assert!((dims.vocabulary_diversity.score - 11.6).abs() < 1e-9);
        assert_eq!(dims.vocabulary_diversity.issues.len(), 1);
        assert_eq!(dims.sentence_complexity.score, 15.0);
    }

    #[test]
    fn test_undetected_rules_do_not_deduct() {
        let mut results = clean_results();
        results[2] = result(RuleType::FalseRange, false, 85.0);
        let dims = calculator().calculate_dimensions(&results);
        assert_eq!(dims.logical_coherence.score, 20.0);
    }

    #[test]
    fn test_rule_confidence() {
        let clean = clean_results();
        assert_eq!(rule_confidence(100.0, &clean), 1.0);

        let mut flagged = clean_results();
        flagged[3] = result(RuleType::CitationAnomaly, true, 0.0);
        assert!((rule_confidence(50.0, &flagged) - 0.6).abs() < 1e-9);

        let mut many = clean_results();
        for idx in [0, 1, 2] {
            many[idx].detected = true;
        }
        assert!((rule_confidence(40.0, &many) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_totals_stay_in_range() {
        let weights = DimensionWeights {
            vocabulary_diversity: 60.0,
            sentence_complexity: 60.0,
            personalization: 60.0,
            logical_coherence: 60.0,
            emotional_authenticity: 60.0,
        };
        let score = ScoreCalculator::new(weights).calculate(&clean_results());
        assert_eq!(score.total, 100.0);
    }
}
