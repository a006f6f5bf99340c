// HumanScore Data Models
// Request, evidence and score shapes shared across the detection pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod multimodal;

pub use multimodal::*;

// ============ Rule Identity ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    HighFrequencyWords,
    SentenceStarters,
    FalseRange,
    CitationAnomaly,
    EmDashDensity,
    MarkdownResidue,
    EmojiAnomaly,
    KnowledgeCutoff,
    CollaborativeTone,
    Perfectionism,
}

impl RuleType {
    pub const ALL: [RuleType; 10] = [
        RuleType::HighFrequencyWords,
        RuleType::SentenceStarters,
        RuleType::FalseRange,
        RuleType::CitationAnomaly,
        RuleType::EmDashDensity,
        RuleType::MarkdownResidue,
        RuleType::EmojiAnomaly,
        RuleType::KnowledgeCutoff,
        RuleType::CollaborativeTone,
        RuleType::Perfectionism,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::HighFrequencyWords => "high_frequency_words",
            RuleType::SentenceStarters => "sentence_starters",
            RuleType::FalseRange => "false_range",
            RuleType::CitationAnomaly => "citation_anomaly",
            RuleType::EmDashDensity => "em_dash_density",
            RuleType::MarkdownResidue => "markdown_residue",
            RuleType::EmojiAnomaly => "emoji_anomaly",
            RuleType::KnowledgeCutoff => "knowledge_cutoff",
            RuleType::CollaborativeTone => "collaborative_tone",
            RuleType::Perfectionism => "perfectionism",
        }
    }

    /// Rules whose detection signals tooling leakage rather than a stylistic tendency.
    pub fn is_red_flag(&self) -> bool {
        matches!(
            self,
            RuleType::CitationAnomaly
                | RuleType::KnowledgeCutoff
                | RuleType::MarkdownResidue
                | RuleType::EmojiAnomaly
        )
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Info,
}

// ============ Evidence ============

/// Location of one match. `line`/`column` are 1-based (column counts chars),
/// `offset`/`length` are byte based so `offset + length <= text.len()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
}

impl Position {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub text: String,
    pub position: Position,
    pub context: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub rule_type: RuleType,
    pub rule_name: String,
    pub description: String,
    pub detected: bool,
    pub score: f64,
    pub severity: Severity,
    #[serde(default)]
    pub matches: Vec<Match>,
    pub count: usize,
    pub threshold: usize,
    #[serde(default)]
    pub message: String,
}

impl RuleResult {
    /// A clean result: nothing detected, full score.
    pub fn new(
        rule_type: RuleType,
        rule_name: &str,
        description: &str,
        severity: Severity,
        threshold: usize,
    ) -> Self {
        Self {
            rule_type,
            rule_name: rule_name.to_string(),
            description: description.to_string(),
            detected: false,
            score: 100.0,
            severity,
            matches: Vec::new(),
            count: 0,
            threshold,
            message: String::new(),
        }
    }

    pub fn add_match(&mut self, m: Match) {
        self.matches.push(m);
    }
}

// ============ Scores ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScore {
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub level: String,
    pub description: String,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl DimensionScore {
    pub fn new(max_score: f64, description: &str) -> Self {
        let mut dim = Self {
            score: max_score,
            max_score,
            percentage: 0.0,
            level: String::new(),
            description: description.to_string(),
            issues: Vec::new(),
        };
        dim.refresh();
        dim
    }

    /// Subtract `amount` from the score, never going below zero.
    pub fn deduct(&mut self, amount: f64, issue: Option<String>) {
        if amount <= 0.0 {
            return;
        }
        self.score = (self.score - amount).max(0.0);
        if let Some(issue) = issue {
            self.issues.push(issue);
        }
        self.refresh();
    }

    /// Recompute percentage and level from score/max_score.
    pub fn refresh(&mut self) {
        self.percentage = if self.max_score > 0.0 {
            (self.score / self.max_score * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        self.level = score_level(self.percentage).to_string();
    }
}

pub fn score_level(percentage: f64) -> &'static str {
    if percentage >= 90.0 {
        "excellent"
    } else if percentage >= 75.0 {
        "good"
    } else if percentage >= 60.0 {
        "fair"
    } else {
        "poor"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScores {
    pub vocabulary_diversity: DimensionScore,
    pub sentence_complexity: DimensionScore,
    pub personalization: DimensionScore,
    pub logical_coherence: DimensionScore,
    pub emotional_authenticity: DimensionScore,
}

impl DimensionScores {
    pub fn iter(&self) -> impl Iterator<Item = &DimensionScore> {
        [
            &self.vocabulary_diversity,
            &self.sentence_complexity,
            &self.personalization,
            &self.logical_coherence,
            &self.emotional_authenticity,
        ]
        .into_iter()
    }

    pub fn sum(&self) -> f64 {
        self.iter().map(|d| d.score).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub total: f64,
    pub dimensions: DimensionScores,
    #[serde(default)]
    pub breakdown: BTreeMap<RuleType, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score <= 40.0 {
            RiskLevel::VeryHigh
        } else if score <= 60.0 {
            RiskLevel::High
        } else if score <= 75.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::VeryHigh => "Very high risk",
            RiskLevel::High => "High risk",
            RiskLevel::Medium => "Medium risk",
            RiskLevel::Low => "Low risk",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::VeryHigh => "Strong evidence of machine-generated text",
            RiskLevel::High => "Many machine-generated traits present",
            RiskLevel::Medium => "Some machine-generated traits present",
            RiskLevel::Low => "Reads as human-written",
        }
    }
}

// ============ Suggestions ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionCategory {
    Vocabulary,
    Sentence,
    Tone,
    Structure,
    Authenticity,
    Formatting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionExample {
    pub before: String,
    pub after: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub category: SuggestionCategory,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<SuggestionExample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_rule: Option<RuleType>,
}

// ============ Detection Request / Result ============

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRequest {
    pub text: String,
    /// Restrict the run to these rules (still subject to each rule's enabled flag).
    #[serde(default)]
    pub rules: Option<Vec<RuleType>>,
    /// Force tiered multimodal fusion even when the config leaves it off.
    #[serde(default)]
    pub multimodal: bool,
}

impl DetectionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub request_id: String,
    pub text: String,
    pub score: Score,
    pub rule_results: Vec<RuleResult>,
    pub suggestions: Vec<Suggestion>,
    pub risk_level: RiskLevel,
    pub process_time_ms: u64,
    pub detected_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multimodal: Option<MultimodalResult>,
}

impl DetectionResult {
    pub fn detected_rules(&self) -> impl Iterator<Item = &RuleResult> {
        self.rule_results.iter().filter(|r| r.detected)
    }
}
