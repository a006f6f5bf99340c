// Trigram perplexity with add-one smoothing, plus entropy measures

use super::round2;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

const MIN_TOKENS: usize = 4;
const MIN_PERPLEXITY: f64 = 1.0;
const MAX_PERPLEXITY: f64 = 500.0;
const REPEAT_RATE_LIMIT: f64 = 0.3;

const BOS: &str = "<s>";
const EOS: &str = "</s>";

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerplexityResult {
    pub score: f64,
    pub confidence: f64,
    pub ngram_count: usize,
    pub unique_ngrams: usize,
    pub indicators: Vec<String>,
}

/// Conditional entropies at increasing context lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Predictability {
    pub unigram_count: usize,
    pub bigram_entropy: f64,
    pub trigram_entropy: f64,
    /// Bigram minus trigram entropy: how much extra context narrows the next token.
    pub entropy_reduction: f64,
}

fn is_sentence_end(token: &str) -> bool {
    matches!(token, "." | "!" | "?" | "\u{3002}" | "\u{FF01}" | "\u{FF1F}")
}

/// Lowercased words and punctuation, with sentence boundary markers.
pub fn tokenize_for_ngrams(text: &str) -> Vec<String> {
    let re = TOKEN_RE.get_or_init(|| {
        Regex::new(r"[\p{L}\p{N}]+|[.!?。！？，,;；:：]").unwrap()
    });
    let lower = text.to_lowercase();

    let mut tokens = vec![BOS.to_string()];
    for m in re.find_iter(&lower) {
        let token = m.as_str();
        tokens.push(token.to_string());
        if is_sentence_end(token) {
            tokens.push(EOS.to_string());
            tokens.push(BOS.to_string());
        }
    }
    tokens.push(EOS.to_string());
    tokens
}

fn count_ngrams(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

fn sample_confidence(tokens: usize) -> f64 {
    let n = tokens as f64;
    match tokens {
        0..=49 => n / 50.0 * 0.4,
        50..=199 => 0.4 + (n - 50.0) / 150.0 * 0.3,
        200..=499 => 0.7 + (n - 200.0) / 300.0 * 0.2,
        _ => 0.9,
    }
}

pub fn calculate_perplexity(text: &str) -> PerplexityResult {
    let tokens = tokenize_for_ngrams(text);
    if tokens.len() < MIN_TOKENS {
        return PerplexityResult {
            score: 50.0,
            confidence: 0.3,
            ngram_count: 0,
            unique_ngrams: 0,
            indicators: vec!["text too short to estimate perplexity".to_string()],
        };
    }

    let trigrams = count_ngrams(&tokens, 3);
    let bigrams = count_ngrams(&tokens, 2);
    let vocab = bigrams.len() as f64;

    let mut log_sum = 0.0;
    for gram in tokens.windows(3) {
        let c3 = trigrams.get(gram).copied().unwrap_or(0) as f64;
        let c2 = bigrams.get(&gram[..2]).copied().unwrap_or(0) as f64;
        let p = (c3 + 1.0) / (c2 + vocab);
        log_sum += p.log2();
    }
    let ngram_count = tokens.len() - 2;
    let perplexity = (-log_sum / ngram_count as f64)
        .exp2()
        .clamp(MIN_PERPLEXITY, MAX_PERPLEXITY);

    let unique_ngrams = trigrams.len();
    let mut indicators = Vec::new();
    let repeat_rate = 1.0 - unique_ngrams as f64 / ngram_count as f64;
    if repeat_rate > REPEAT_RATE_LIMIT {
        indicators.push(format!("high trigram repetition ({:.0}%)", repeat_rate * 100.0));
    }
    if perplexity < 30.0 {
        indicators.push("low perplexity: predictable, templated phrasing".to_string());
    } else if perplexity > 150.0 {
        indicators.push("high perplexity: irregular or random phrasing".to_string());
    } else {
        indicators.push("moderate perplexity".to_string());
    }

    let diversity = (unique_ngrams as f64 / tokens.len() as f64 * 2.0).min(1.0);
    let confidence = sample_confidence(tokens.len()) * 0.7 + diversity * 0.3;

    PerplexityResult {
        score: round2(perplexity),
        confidence: round2(confidence),
        ngram_count,
        unique_ngrams,
        indicators,
    }
}

/// Shannon entropy (bits) of the unigram distribution.
pub fn entropy_rate(text: &str) -> f64 {
    let tokens = tokenize_for_ngrams(text);
    if tokens.len() < 2 {
        return 0.0;
    }
    let counts = count_ngrams(&tokens, 1);
    let total = tokens.len() as f64;
    let entropy: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum();
    round2(entropy)
}

/// `H(next | context)` from n-gram counts and their (n-1)-gram prefix counts.
fn conditional_entropy(grams: &HashMap<&[String], usize>, contexts: &HashMap<&[String], usize>) -> f64 {
    let mut total = 0usize;
    let mut acc = 0.0;
    for (gram, &count) in grams {
        if gram.len() < 2 {
            continue;
        }
        let ctx = match contexts.get(&gram[..gram.len() - 1]) {
            Some(&c) if c > 0 => c,
            _ => continue,
        };
        acc -= count as f64 * (count as f64 / ctx as f64).log2();
        total += count;
    }
    if total == 0 {
        0.0
    } else {
        acc / total as f64
    }
}

pub fn analyze_predictability(text: &str) -> Predictability {
    let tokens = tokenize_for_ngrams(text);
    let unigrams = count_ngrams(&tokens, 1);
    let bigrams = count_ngrams(&tokens, 2);
    let trigrams = count_ngrams(&tokens, 3);

    let bigram_entropy = conditional_entropy(&bigrams, &unigrams);
    let trigram_entropy = conditional_entropy(&trigrams, &bigrams);

    Predictability {
        unigram_count: unigrams.len(),
        bigram_entropy: round2(bigram_entropy),
        trigram_entropy: round2(trigram_entropy),
        entropy_reduction: round2(bigram_entropy - trigram_entropy),
    }
}
