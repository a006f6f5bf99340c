// Sentence statistics: length spread, complexity, question/exclamation ratios

use super::{population_std, round2};
use super::vocabulary::word_regex;
use crate::services::text_processor::count_han;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

static TERMINATOR_RE: OnceLock<Regex> = OnceLock::new();

const SUBORDINATORS: &[&str] = &[
    "although", "though", "because", "since", "while", "whereas", "if", "unless",
    "until", "when", "whenever", "where", "wherever", "after", "before", "as",
    "that", "which", "who", "whom", "whose",
];

const CJK_SUBORDINATORS: &[&str] = &[
    "虽然", "尽管", "因为", "由于", "如果", "假如", "除非", "当", "无论", "不管", "只要", "一旦",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SentenceStats {
    pub sentence_count: usize,
    pub avg_length: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub min_length: usize,
    pub max_length: usize,
    /// 0-100, higher reads as more varied and structurally richer.
    pub complexity_score: f64,
    pub complex_sentence_ratio: f64,
    pub simple_sentence_ratio: f64,
    pub question_ratio: f64,
    pub exclamation_ratio: f64,
    pub length_distribution: BTreeMap<String, usize>,
}

struct Clause<'a> {
    text: &'a str,
    terminator: &'a str,
}

fn terminator_regex() -> &'static Regex {
    TERMINATOR_RE.get_or_init(|| Regex::new(r"[.。!！?？]+\s*").unwrap())
}

/// Splits each non-empty line on terminator runs, keeping clauses of two or more words.
fn split_clauses(text: &str) -> Vec<Clause<'_>> {
    let mut clauses = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut last = 0;
        for m in terminator_regex().find_iter(line) {
            clauses.push(Clause {
                text: line[last..m.start()].trim(),
                terminator: m.as_str().trim(),
            });
            last = m.end();
        }
        if last < line.len() {
            clauses.push(Clause {
                text: line[last..].trim(),
                terminator: "",
            });
        }
    }
    clauses.retain(|c| count_words(c.text) > 1);
    clauses
}

/// Word count that treats Han-dominant text as roughly two characters per word.
pub fn count_words(text: &str) -> usize {
    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    let han = count_han(text);
    if letters > 0 && han as f64 / letters as f64 > 0.5 {
        return (han + 1) / 2;
    }
    word_regex().find_iter(text).count()
}

fn is_complex(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    if SUBORDINATORS
        .iter()
        .any(|conj| lower.contains(&format!(" {} ", conj)))
    {
        return true;
    }
    if CJK_SUBORDINATORS.iter().any(|m| sentence.contains(m)) {
        return true;
    }
    comma_count(sentence) >= 2
}

fn comma_count(sentence: &str) -> usize {
    sentence.chars().filter(|&c| c == ',' || c == '\u{FF0C}').count()
}

fn length_bucket(words: usize) -> &'static str {
    match words {
        0..=4 => "very_short",
        5..=10 => "short",
        11..=20 => "medium",
        21..=35 => "long",
        _ => "very_long",
    }
}

fn sentence_complexity(sentence: &str, words: usize) -> f64 {
    let mut score = match words {
        10..=25 => 30.0,
        5..=35 => 20.0,
        _ => 10.0,
    };
    if is_complex(sentence) {
        score += 25.0;
    }
    score += match comma_count(sentence) {
        0 => 0.0,
        1..=3 => 15.0,
        _ => 10.0,
    };

    let lower = sentence.to_lowercase();
    let tokens: Vec<&str> = word_regex().find_iter(&lower).map(|m| m.as_str()).collect();
    if !tokens.is_empty() {
        let unique = tokens.iter().collect::<HashSet<_>>().len();
        score += unique as f64 / tokens.len() as f64 * 30.0;
    }
    score
}

pub fn analyze_sentences(text: &str) -> SentenceStats {
    let clauses = split_clauses(text);
    if clauses.is_empty() {
        return SentenceStats::default();
    }

    let lengths: Vec<usize> = clauses.iter().map(|c| count_words(c.text)).collect();
    let n = lengths.len() as f64;
    let as_f64: Vec<f64> = lengths.iter().map(|&l| l as f64).collect();
    let avg = as_f64.iter().sum::<f64>() / n;
    let std = population_std(&as_f64);

    let mut distribution = BTreeMap::new();
    for bucket in ["very_short", "short", "medium", "long", "very_long"] {
        distribution.insert(bucket.to_string(), 0);
    }
    for &len in &lengths {
        *distribution.entry(length_bucket(len).to_string()).or_insert(0) += 1;
    }

    let complex = clauses.iter().filter(|c| is_complex(c.text)).count();
    let questions = clauses
        .iter()
        .filter(|c| c.terminator.contains(['?', '？']))
        .count();
    let exclamations = clauses
        .iter()
        .filter(|c| c.terminator.contains(['!', '！']))
        .count();

    let mean_complexity = clauses
        .iter()
        .zip(&lengths)
        .map(|(c, &len)| sentence_complexity(c.text, len))
        .sum::<f64>()
        / n;
    let variation_bonus = if avg > 0.0 { (std / avg * 20.0).min(15.0) } else { 0.0 };
    let complexity = (mean_complexity + variation_bonus).clamp(0.0, 100.0);

    SentenceStats {
        sentence_count: clauses.len(),
        avg_length: round2(avg),
        std_dev: round2(std),
        variance: round2(std * std),
        min_length: lengths.iter().copied().min().unwrap_or(0),
        max_length: lengths.iter().copied().max().unwrap_or(0),
        complexity_score: round2(complexity),
        complex_sentence_ratio: round2(complex as f64 / n),
        simple_sentence_ratio: round2((clauses.len() - complex) as f64 / n),
        question_ratio: round2(questions as f64 / n),
        exclamation_ratio: round2(exclamations as f64 / n),
        length_distribution: distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert_eq!(analyze_sentences(""), SentenceStats::default());
        assert_eq!(analyze_sentences("Hi."), SentenceStats::default());
    }

    #[test]
    fn test_uniform_lengths_have_zero_std() {
        let stats = analyze_sentences("The cat sat down. The dog ran off. The bird flew up.");
        assert_eq!(stats.sentence_count, 3);
        assert_eq!(stats.avg_length, 4.0);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.min_length, 4);
        assert_eq!(stats.max_length, 4);
        assert_eq!(stats.length_distribution["very_short"], 3);
    }

    #[test]
    fn test_varied_lengths() {
        let text = "Stop it now. I walked down to the old harbour yesterday evening because the light over the water was strange and beautiful.";
        let stats = analyze_sentences(text);
        assert_eq!(stats.sentence_count, 2);
        assert!(stats.std_dev > 5.0);
        assert_eq!(stats.complex_sentence_ratio, 0.5);
        assert_eq!(stats.simple_sentence_ratio, 0.5);
    }

    #[test]
    fn test_question_and_exclamation_ratios() {
        let text = "Is this really true? It is amazing news! We will check it tomorrow. Who wrote this one?";
        let stats = analyze_sentences(text);
        assert_eq!(stats.sentence_count, 4);
        assert_eq!(stats.question_ratio, 0.5);
        assert_eq!(stats.exclamation_ratio, 0.25);
    }

    #[test]
    fn test_chinese_word_count() {
        assert_eq!(count_words("今天天气很好"), 3);
        assert_eq!(count_words("hello world"), 2);
        let stats = analyze_sentences("今天天气很好。我们去公园散步吧！");
        assert_eq!(stats.sentence_count, 2);
        assert_eq!(stats.exclamation_ratio, 0.5);
    }

    #[test]
    fn test_complexity_bounded() {
        let text = "Although it rained, we went out, walked far, and came back late because we wanted to.";
        let stats = analyze_sentences(text);
        assert!(stats.complexity_score > 0.0 && stats.complexity_score <= 100.0);
        assert_eq!(stats.complex_sentence_ratio, 1.0);
    }
}
