// Statistics Module
// Closed-form text statistics folded into a single human-likeness estimate:
// - vocabulary: TTR, MATTR, hapax ratio, Yule's K
// - sentence: length spread, complexity, terminator ratios
// - perplexity: smoothed trigram model, entropy measures

pub mod perplexity;
pub mod sentence;
pub mod vocabulary;

pub use perplexity::{analyze_predictability, calculate_perplexity, entropy_rate, PerplexityResult, Predictability};
pub use sentence::{analyze_sentences, count_words, SentenceStats};
pub use vocabulary::{analyze_vocabulary, VocabularyStats, WordFrequency};

use crate::models::StatisticsLayerDetails;
use serde::{Deserialize, Serialize};
use tracing::debug;

const VOCABULARY_WEIGHT: f64 = 0.30;
const RICHNESS_WEIGHT: f64 = 0.15;
const VARIANCE_WEIGHT: f64 = 0.20;
const COMPLEXITY_WEIGHT: f64 = 0.15;
const PERPLEXITY_WEIGHT: f64 = 0.20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResult {
    pub vocabulary: VocabularyStats,
    pub sentence: SentenceStats,
    pub perplexity: PerplexityResult,
    /// 0-100, higher is more human-like.
    pub human_score: f64,
    /// 0-1, `1 - human_score / 100`.
    pub ai_probability: f64,
    pub confidence: f64,
    pub details: Vec<String>,
}

impl StatisticsResult {
    pub fn layer_details(&self) -> StatisticsLayerDetails {
        StatisticsLayerDetails {
            ttr: self.vocabulary.ttr,
            vocabulary_richness: self.vocabulary.richness,
            sentence_length_std: self.sentence.std_dev,
            sentence_complexity: self.sentence.complexity_score,
            perplexity: self.perplexity.score,
            ai_probability: self.ai_probability,
            details: self.details.clone(),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Population standard deviation; 0 for an empty slice.
pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

// Component mappings: each turns a raw statistic into a 0-100 human-likeness score

fn vocabulary_score(ttr: f64) -> f64 {
    if ttr < 0.2 {
        20.0
    } else if ttr < 0.35 {
        20.0 + (ttr - 0.2) / 0.15 * 30.0
    } else if ttr < 0.5 {
        50.0 + (ttr - 0.35) / 0.15 * 30.0
    } else if ttr < 0.7 {
        80.0 + (ttr - 0.5) / 0.2 * 15.0
    } else {
        95.0
    }
}

fn richness_score(richness: f64) -> f64 {
    if richness < 3.0 {
        30.0
    } else if richness < 5.0 {
        30.0 + (richness - 3.0) / 2.0 * 30.0
    } else if richness < 10.0 {
        60.0 + (richness - 5.0) / 5.0 * 25.0
    } else {
        85.0 + ((richness - 10.0) / 10.0 * 10.0).min(10.0)
    }
}

fn variance_score(std_dev: f64) -> f64 {
    if std_dev < 3.0 {
        30.0
    } else if std_dev < 8.0 {
        30.0 + (std_dev - 3.0) / 5.0 * 35.0
    } else if std_dev < 15.0 {
        65.0 + (std_dev - 8.0) / 7.0 * 25.0
    } else {
        90.0
    }
}

/// Penalizes both templated (low) and erratic (very high) perplexity.
fn perplexity_score(ppl: f64) -> f64 {
    if ppl < 20.0 {
        20.0
    } else if ppl < 40.0 {
        20.0 + (ppl - 20.0) / 20.0 * 30.0
    } else if ppl < 100.0 {
        50.0 + (ppl - 40.0) / 60.0 * 40.0
    } else if ppl < 200.0 {
        90.0
    } else {
        80.0
    }
}

fn sample_confidence(total_words: usize) -> f64 {
    let n = total_words as f64;
    if total_words < 100 {
        n / 100.0 * 0.5
    } else if total_words < 500 {
        0.5 + (n - 100.0) / 400.0 * 0.3
    } else {
        0.8 + ((n - 500.0) / 1000.0 * 0.2).min(0.2)
    }
}

fn describe(vocab: &VocabularyStats, sentence: &SentenceStats, ppl: &PerplexityResult) -> Vec<String> {
    let mut details = Vec::new();

    if vocab.ttr < 0.35 {
        details.push(format!("Low lexical diversity (TTR {:.2})", vocab.ttr));
    } else if vocab.ttr > 0.55 {
        details.push(format!("Good lexical diversity (TTR {:.2})", vocab.ttr));
    }
    if vocab.richness < 5.0 {
        details.push(format!("Low vocabulary richness ({:.2})", vocab.richness));
    }
    if sentence.std_dev < 5.0 {
        details.push(format!("Uniform sentence length (std {:.2})", sentence.std_dev));
    } else if sentence.std_dev > 15.0 {
        details.push(format!("Varied sentence length (std {:.2})", sentence.std_dev));
    }
    if ppl.score < 30.0 {
        details.push(format!("Low perplexity ({:.2}), predictable phrasing", ppl.score));
    } else if ppl.score > 100.0 {
        details.push(format!("High perplexity ({:.2}), unpredictable phrasing", ppl.score));
    }

    details
}

/// Runs every sub-analysis over `text` and folds them into one estimate.
pub fn analyze_statistics(text: &str) -> StatisticsResult {
    let vocabulary = analyze_vocabulary(text);
    let sentence = analyze_sentences(text);
    let perplexity = calculate_perplexity(text);

    let components = [
        (vocabulary_score(vocabulary.ttr), VOCABULARY_WEIGHT),
        (richness_score(vocabulary.richness), RICHNESS_WEIGHT),
        (variance_score(sentence.std_dev), VARIANCE_WEIGHT),
        (sentence.complexity_score, COMPLEXITY_WEIGHT),
        (perplexity_score(perplexity.score), PERPLEXITY_WEIGHT),
    ];
    let total_weight: f64 = components.iter().map(|(_, w)| w).sum();
    let human_score = (components.iter().map(|(s, w)| s * w).sum::<f64>() / total_weight).clamp(0.0, 100.0);

    let scores: Vec<f64> = components.iter().map(|(s, _)| *s).collect();
    let consistency = 1.0 - (population_std(&scores) / 50.0).min(0.5);
    let confidence = (sample_confidence(vocabulary.total_words) * 0.6 + consistency * 0.4).clamp(0.0, 1.0);

    let details = describe(&vocabulary, &sentence, &perplexity);
    debug!(
        "[STATS] words={} sentences={} ppl={:.2} human={:.2}",
        vocabulary.total_words, sentence.sentence_count, perplexity.score, human_score
    );

    StatisticsResult {
        vocabulary,
        sentence,
        perplexity,
        human_score: round2(human_score),
        ai_probability: round2(1.0 - human_score / 100.0),
        confidence: round2(confidence),
        details,
    }
}

/// Stateless handle over [`analyze_statistics`], for callers that hold analyzers by value.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticsAnalyzer;

impl StatisticsAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, text: &str) -> StatisticsResult {
        analyze_statistics(text)
    }
}
