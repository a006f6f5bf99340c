// Vocabulary statistics: TTR, moving-average TTR, hapax legomena, Yule's K

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

/// Window for the moving-average type-token ratio.
pub const MATTR_WINDOW: usize = 50;
/// Minimum occurrences for a word to be listed as high-frequency.
const HIGH_FREQUENCY_MIN: usize = 3;
const HIGH_FREQUENCY_LIMIT: usize = 20;

static WORD_RE: OnceLock<Regex> = OnceLock::new();
static STOP_WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();

pub(crate) fn word_regex() -> &'static Regex {
    WORD_RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").unwrap())
}

const STOP_WORD_LIST: &[&str] = &[
    // English
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "could",
    "should", "may", "might", "must", "shall", "can", "need", "dare",
    "to", "of", "in", "for", "on", "with", "at", "by", "from", "up",
    "about", "into", "through", "during", "before", "after", "above",
    "below", "between", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "each",
    "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "just", "and",
    "but", "if", "or", "because", "as", "until", "while", "although",
    "though", "this", "that", "these", "those",
    "it", "its", "he", "him", "his", "she", "her", "hers", "they",
    "them", "their", "theirs", "we", "us", "our", "ours", "you", "your",
    "yours", "i", "me", "my", "mine", "what", "which", "who", "whom",
    // Chinese
    "的", "了", "是", "在", "我", "有", "和", "就", "不", "人",
    "都", "一", "一个", "上", "也", "很", "到", "说", "要", "去",
    "你", "会", "着", "没有", "看", "好", "自己", "这", "他", "她",
    "它", "们", "那", "还", "被", "把", "让", "给", "从", "向",
    "对", "与", "为", "以", "及", "等", "但", "而", "或", "且",
    "因为", "所以", "如果", "虽然", "但是", "然后", "于是",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS
        .get_or_init(|| STOP_WORD_LIST.iter().copied().collect())
        .contains(word)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordFrequency {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyStats {
    pub total_words: usize,
    pub unique_words: usize,
    pub ttr: f64,
    /// Moving-average TTR over `MATTR_WINDOW` tokens.
    pub standardized_ttr: f64,
    pub hapax_legomena: usize,
    pub hapax_ratio: f64,
    pub yules_k: f64,
    /// `200 / (K + 10)`: larger means more diverse.
    pub richness: f64,
    /// occurrences -> number of distinct words with that many occurrences
    pub frequency_distribution: BTreeMap<usize, usize>,
    pub high_frequency_words: Vec<WordFrequency>,
}

/// Lowercased letter/digit runs, minus stop-words and single-byte tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_regex()
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| t.len() > 1 && !is_stop_word(t))
        .map(str::to_string)
        .collect()
}

pub fn analyze_vocabulary(text: &str) -> VocabularyStats {
    let words = tokenize(text);
    if words.is_empty() {
        return VocabularyStats::default();
    }

    let mut freq: HashMap<&str, usize> = HashMap::new();
    for w in &words {
        *freq.entry(w.as_str()).or_insert(0) += 1;
    }

    let total_words = words.len();
    let unique_words = freq.len();

    let mut frequency_distribution = BTreeMap::new();
    let mut hapax_legomena = 0;
    for &count in freq.values() {
        *frequency_distribution.entry(count).or_insert(0) += 1;
        if count == 1 {
            hapax_legomena += 1;
        }
    }

    let (yules_k, richness) = yules_characteristic(&freq, total_words);

    VocabularyStats {
        total_words,
        unique_words,
        ttr: unique_words as f64 / total_words as f64,
        standardized_ttr: moving_average_ttr(&words, MATTR_WINDOW),
        hapax_legomena,
        hapax_ratio: hapax_legomena as f64 / unique_words as f64,
        yules_k,
        richness,
        frequency_distribution,
        high_frequency_words: high_frequency_words(&freq, HIGH_FREQUENCY_MIN),
    }
}

fn distinct(words: &[String]) -> usize {
    words.iter().collect::<HashSet<_>>().len()
}

/// Mean TTR over every full window; texts no longer than one window use plain TTR.
pub fn moving_average_ttr(words: &[String], window: usize) -> f64 {
    if words.is_empty() || window == 0 {
        return 0.0;
    }
    if words.len() <= window {
        return distinct(words) as f64 / words.len() as f64;
    }

    let ratios: Vec<f64> = words
        .windows(window)
        .map(|w| distinct(w) as f64 / window as f64)
        .collect();
    ratios.iter().sum::<f64>() / ratios.len() as f64
}

/// Returns `(K, richness)`. Both are 0 when the text is degenerate.
fn yules_characteristic(freq: &HashMap<&str, usize>, total: usize) -> (f64, f64) {
    if total == 0 {
        return (0.0, 0.0);
    }
    let m1 = total as f64;
    let m2: f64 = freq.values().map(|&f| (f * f) as f64).sum();
    if m1 * m1 - m2 == 0.0 {
        return (0.0, 0.0);
    }
    let k = 10000.0 * (m2 - m1) / (m1 * m1);
    (k, 200.0 / (k + 10.0))
}

fn high_frequency_words(freq: &HashMap<&str, usize>, min_count: usize) -> Vec<WordFrequency> {
    let mut result: Vec<WordFrequency> = freq
        .iter()
        .filter(|(_, &c)| c >= min_count)
        .map(|(w, &c)| WordFrequency { word: w.to_string(), count: c })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    result.truncate(HIGH_FREQUENCY_LIMIT);
    result
}
