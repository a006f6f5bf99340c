// Multimodal Fusion Models
// Layer weights, confidence gates and per-layer detail records

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerWeights {
    #[serde(default = "default_rule_weight")]
    pub rule: f64,
    #[serde(default = "default_statistics_weight")]
    pub statistics: f64,
    #[serde(default = "default_semantic_weight")]
    pub semantic: f64,
}

fn default_rule_weight() -> f64 { 0.4 }
fn default_statistics_weight() -> f64 { 0.3 }
fn default_semantic_weight() -> f64 { 0.3 }

impl Default for LayerWeights {
    fn default() -> Self {
        Self {
            rule: default_rule_weight(),
            statistics: default_statistics_weight(),
            semantic: default_semantic_weight(),
        }
    }
}

impl LayerWeights {
    pub fn rule_only() -> Self {
        Self { rule: 1.0, statistics: 0.0, semantic: 0.0 }
    }

    pub fn rule_statistics() -> Self {
        Self { rule: 0.55, statistics: 0.45, semantic: 0.0 }
    }

    pub fn total(&self) -> f64 {
        self.rule + self.statistics + self.semantic
    }

    /// Scale so the weights sum to 1.0. An all-zero triple falls back to rule-only.
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total <= 0.0 {
            return Self::rule_only();
        }
        Self {
            rule: self.rule / total,
            statistics: self.statistics / total,
            semantic: self.semantic / total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    RuleOnly,
    RuleStatistics,
    Multimodal,
}

impl DetectionMode {
    pub fn label(&self) -> &'static str {
        match self {
            DetectionMode::RuleOnly => "rule only",
            DetectionMode::RuleStatistics => "rule + statistics",
            DetectionMode::Multimodal => "rule + statistics + semantic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceThresholds {
    #[serde(default = "default_high")]
    pub high: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_low")]
    pub low: f64,
}

fn default_high() -> f64 { 0.85 }
fn default_medium() -> f64 { 0.60 }
fn default_low() -> f64 { 0.40 }

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: default_high(),
            medium: default_medium(),
            low: default_low(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RuleLayerDetails {
    pub detected_count: usize,
    pub total_rules: usize,
    pub red_flag_count: usize,
    pub main_issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsLayerDetails {
    pub ttr: f64,
    pub vocabulary_richness: f64,
    pub sentence_length_std: f64,
    pub sentence_complexity: f64,
    pub perplexity: f64,
    pub ai_probability: f64,
    pub details: Vec<String>,
}

/// One trait reported by the semantic collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SemanticFeature {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub score: f64,
}

/// Output contract of the semantic collaborator. `ai_probability` is 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticAnalysis {
    #[serde(default = "default_ai_probability")]
    pub ai_probability: f64,
    #[serde(default = "default_semantic_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub features: Vec<SemanticFeature>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(skip)]
    pub from_cache: bool,
}

fn default_ai_probability() -> f64 { 50.0 }
fn default_semantic_confidence() -> f64 { 0.3 }

impl SemanticAnalysis {
    /// Neutral verdict used whenever a response cannot be interpreted.
    pub fn neutral(explanation: &str) -> Self {
        Self {
            ai_probability: default_ai_probability(),
            confidence: default_semantic_confidence(),
            features: Vec::new(),
            explanation: explanation.to_string(),
            suggestions: Vec::new(),
            from_cache: false,
        }
    }

    /// Clamp model-provided numbers into their documented ranges.
    pub fn sanitized(mut self) -> Self {
        self.ai_probability = if self.ai_probability.is_finite() {
            self.ai_probability.clamp(0.0, 100.0)
        } else {
            default_ai_probability()
        };
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            default_semantic_confidence()
        };
        self
    }
}

/// A rewrite suggestion written by the semantic collaborator for the detected issues.
/// `priority` runs 1 (most urgent) to 5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelSuggestion {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default = "default_model_priority")]
    pub priority: u8,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub suggested_text: String,
    #[serde(default)]
    pub reason: String,
}

fn default_model_priority() -> u8 { 3 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SemanticLayerDetails {
    pub coherence_score: f64,
    pub personalization_score: f64,
    pub ai_pattern_score: f64,
    pub features: Vec<SemanticFeature>,
    pub explanation: String,
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultimodalResult {
    pub rule_layer_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics_layer_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_layer_score: Option<f64>,
    pub layer_weights: LayerWeights,
    pub detection_mode: DetectionMode,
    pub rule_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_confidence: Option<f64>,
    pub rule_layer_details: RuleLayerDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics_layer_details: Option<StatisticsLayerDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_layer_details: Option<SemanticLayerDetails>,
    pub final_score: f64,
    pub confidence: f64,
    pub fusion_explanation: String,
}
