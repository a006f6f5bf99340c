// Multimodal Fusion
// Tier gates and weighted fusion over the layers that actually produced a signal.

use crate::models::{ConfidenceThresholds, DetectionMode, LayerWeights, MultimodalResult};

/// Score and confidence from one analysis layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSignal {
    pub score: f64,
    pub confidence: f64,
}

impl LayerSignal {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self {
            score: clamp_or(score, 0.0, 100.0, 50.0),
            confidence: clamp_or(confidence, 0.0, 1.0, 0.0),
        }
    }
}

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Statistics run only while the rule layer is not already confident.
pub fn needs_statistics(rule_confidence: f64, thresholds: &ConfidenceThresholds) -> bool {
    rule_confidence < thresholds.high
}

/// Semantic analysis runs when the cheaper layers together stay below the medium gate.
/// A skipped statistics layer contributes the rule confidence in its place.
pub fn needs_semantic(rule_confidence: f64, statistics_confidence: f64, thresholds: &ConfidenceThresholds) -> bool {
    (rule_confidence + statistics_confidence) / 2.0 < thresholds.medium
}

/// Mode and weight triple for the layers that ran; the weights always sum to 1.
pub fn active_weights(configured: &LayerWeights, has_statistics: bool, has_semantic: bool) -> (DetectionMode, LayerWeights) {
    match (has_statistics, has_semantic) {
        (false, false) => (DetectionMode::RuleOnly, LayerWeights::rule_only()),
        (true, false) => (DetectionMode::RuleStatistics, LayerWeights::rule_statistics()),
        (true, true) => (DetectionMode::Multimodal, configured.normalized()),
        (false, true) => {
            let without_statistics = LayerWeights {
                statistics: 0.0,
                ..*configured
            };
            (DetectionMode::Multimodal, without_statistics.normalized())
        }
    }
}

/// Weighted average of present layers. Absent layers carry no weight; a zero
/// total weight falls back to the rule layer.
fn weighted(
    rule: f64,
    statistics: Option<f64>,
    semantic: Option<f64>,
    weights: &LayerWeights,
    max: f64,
) -> f64 {
    let mut total_weight = weights.rule;
    let mut acc = rule * weights.rule;
    if let Some(s) = statistics {
        acc += s * weights.statistics;
        total_weight += weights.statistics;
    }
    if let Some(s) = semantic {
        acc += s * weights.semantic;
        total_weight += weights.semantic;
    }
    if total_weight <= 0.0 {
        return rule.clamp(0.0, max);
    }
    (acc / total_weight).clamp(0.0, max)
}

pub fn fuse_scores(
    rule: LayerSignal,
    statistics: Option<LayerSignal>,
    semantic: Option<LayerSignal>,
    weights: &LayerWeights,
) -> f64 {
    weighted(rule.score, statistics.map(|s| s.score), semantic.map(|s| s.score), weights, 100.0)
}

pub fn fuse_confidence(
    rule: LayerSignal,
    statistics: Option<LayerSignal>,
    semantic: Option<LayerSignal>,
    weights: &LayerWeights,
) -> f64 {
    weighted(
        rule.confidence,
        statistics.map(|s| s.confidence),
        semantic.map(|s| s.confidence),
        weights,
        1.0,
    )
}

pub fn fusion_explanation(result: &MultimodalResult) -> String {
    let mut parts = vec![format!(
        "rule {:.1} (w {:.2})",
        result.rule_layer_score, result.layer_weights.rule
    )];
    if let Some(score) = result.statistics_layer_score {
        parts.push(format!("statistics {:.1} (w {:.2})", score, result.layer_weights.statistics));
    }
    if let Some(score) = result.semantic_layer_score {
        parts.push(format!("semantic {:.1} (w {:.2})", score, result.layer_weights.semantic));
    }

    if parts.len() == 1 {
        format!(
            "Rule detection only: {:.1}, confidence {:.2}",
            result.final_score, result.confidence
        )
    } else {
        format!(
            "{} fused: {} -> {:.1}, confidence {:.2}",
            result.detection_mode.label(),
            parts.join(" + "),
            result.final_score,
            result.confidence
        )
    }
}
