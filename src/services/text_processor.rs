// Text Processing Service
// Normalization, sentence/word segmentation and position bookkeeping

use crate::models::Position;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Characters of context kept on each side of a match.
pub const CONTEXT_RADIUS: usize = 50;

static SPECIAL_SPACE_RE: OnceLock<Regex> = OnceLock::new();

/// Normalize line endings and whitespace (Chinese/English)
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let s = text.replace("\r\n", "\n").replace('\r', "\n");

    // Replace ideographic space and non-breaking space
    let space_re = SPECIAL_SPACE_RE.get_or_init(|| Regex::new(r"[\u{3000}\u{00A0}]").unwrap());
    let s = space_re.replace_all(&s, " ");

    s.lines()
        .map(|ln| ln.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    pub text: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub text: String,
    pub lower: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedText {
    pub normalized: String,
    pub sentences: Vec<Sentence>,
    pub words: Vec<Token>,
    pub line_count: usize,
    pub char_count: usize,
}

/// Segment `text` into sentences and words. Positions refer to the raw input.
pub fn process_text(text: &str) -> ProcessedText {
    ProcessedText {
        normalized: normalize_text(text),
        sentences: split_sentences(text),
        words: extract_words(text),
        line_count: if text.is_empty() { 0 } else { text.lines().count().max(1) },
        char_count: text.chars().count(),
    }
}

fn is_ascii_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_fullwidth_terminal(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

fn is_closing_mark(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}' | '\u{300D}' | '\u{300F}' | '\u{FF09}')
}

/// Split text into sentences.
/// A sentence ends at `.!?` followed by whitespace or end of text, at a
/// full-width terminator, or at a line break. Closing quotes and brackets
/// right after a terminator stay with the sentence they close.
pub fn split_sentences(text: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let boundary = if c == '\n' {
            Some((idx, idx + 1))
        } else if is_fullwidth_terminal(c) || is_ascii_terminal(c) {
            let mut end = idx + c.len_utf8();
            while let Some(&(close_idx, close)) = chars.peek() {
                if !is_closing_mark(close) {
                    break;
                }
                end = close_idx + close.len_utf8();
                chars.next();
            }
            let at_break = is_fullwidth_terminal(c)
                || chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            at_break.then_some((end, end))
        } else {
            None
        };

        if let Some((end, next_start)) = boundary {
            push_sentence(text, start, end, &mut sentences);
            start = next_start;
        }
    }
    push_sentence(text, start, text.len(), &mut sentences);

    sentences
}

fn push_sentence(text: &str, start: usize, end: usize, out: &mut Vec<Sentence>) {
    if start >= end {
        return;
    }
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = slice.len() - slice.trim_start().len();
    out.push(Sentence {
        text: trimmed.to_string(),
        position: position_at(text, start + lead, trimmed.len()),
    });
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '\'' || c == '\u{2019}'
}

/// Extract words: maximal runs of letters, digits, hyphens and apostrophes.
pub fn extract_words(text: &str) -> Vec<Token> {
    let mut words = Vec::new();
    let mut run_start: Option<usize> = None;

    for (idx, c) in text.char_indices() {
        match (is_word_char(c), run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(s)) => {
                words.push(make_token(text, s, idx));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = run_start {
        words.push(make_token(text, s, text.len()));
    }

    words
}

fn make_token(text: &str, start: usize, end: usize) -> Token {
    let word = &text[start..end];
    Token {
        text: word.to_string(),
        lower: word.to_lowercase(),
        position: position_at(text, start, end - start),
    }
}

/// 1-based line and column (in chars) of a byte offset.
pub fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let offset = floor_char_boundary(text, offset.min(text.len()));
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

pub fn position_at(text: &str, offset: usize, length: usize) -> Position {
    let (line, column) = line_column(text, offset);
    let offset = offset.min(text.len());
    Position {
        line,
        column,
        offset,
        length: length.min(text.len() - offset),
    }
}

/// Case-insensitive literal search. Returns one position per non-overlapping hit.
pub fn find_pattern(text: &str, pattern: &str) -> Vec<Position> {
    if pattern.is_empty() || text.is_empty() {
        return Vec::new();
    }
    let re = match RegexBuilder::new(&regex::escape(pattern))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };
    re.find_iter(text)
        .map(|m| position_at(text, m.start(), m.len()))
        .collect()
}

/// Like `find_pattern`, but a term that starts or ends with an ASCII letter or
/// digit must sit on a word boundary there ("vital" does not hit "vitality").
pub fn find_word(text: &str, term: &str) -> Vec<Position> {
    let (first, last) = match (term.chars().next(), term.chars().last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Vec::new(),
    };
    let mut pattern = String::new();
    if first.is_ascii_alphanumeric() {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(term));
    if last.is_ascii_alphanumeric() {
        pattern.push_str(r"\b");
    }
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re
            .find_iter(text)
            .map(|m| position_at(text, m.start(), m.len()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Up to `CONTEXT_RADIUS` chars on each side of the span, on one line, trimmed.
pub fn context_snippet(text: &str, offset: usize, length: usize) -> String {
    let start = floor_char_boundary(text, offset.min(text.len()));
    let end = floor_char_boundary(text, (offset + length).min(text.len())).max(start);

    let from = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_RADIUS - 1)
        .map_or(0, |(i, _)| i);
    let to = text[end..]
        .char_indices()
        .nth(CONTEXT_RADIUS)
        .map_or(text.len(), |(i, _)| end + i);

    text[from..to].replace(['\n', '\r'], " ").trim().to_string()
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

pub fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4e00}'..='\u{9fff}'
        | '\u{3400}'..='\u{4dbf}'
        | '\u{f900}'..='\u{faff}'
        | '\u{20000}'..='\u{2a6df}')
}

pub fn count_han(text: &str) -> usize {
    text.chars().filter(|c| is_han(*c)).count()
}
