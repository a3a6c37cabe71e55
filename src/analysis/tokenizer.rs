use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub position: u32,
    pub word: String,
}

// English stop words removed by the standard analyzer.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

static STOP_WORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOP_WORDS.iter().copied().collect());

// letters and digits, with inner apostrophes kept ("don't")
static WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+(?:['’][\p{L}\p{N}]+)*").expect("valid word regex"));

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORD_SET.contains(word)
}

/// Splits text into words, lower-cases them and optionally drops stop words.
/// Dropped words still consume a position so phrase distances are preserved.
#[derive(Debug, Clone)]
pub struct SearchTokenizer {
    remove_stop_words: bool,
}

impl SearchTokenizer {
    pub fn new(remove_stop_words: bool) -> Self {
        Self { remove_stop_words }
    }

    pub fn tokenize(&self, sentences: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        for (position, word) in WORD_REGEX.find_iter(sentences).enumerate() {
            let cleaned_word = word.as_str().to_lowercase();
            if self.remove_stop_words && is_stop_word(&cleaned_word) {
                continue;
            }
            tokens.push(Token {
                position: position as u32,
                word: cleaned_word,
            });
        }
        tokens
    }
}

/// Splits on whitespace only, keeping case and punctuation.
pub fn tokenize_whitespace(sentences: &str) -> Vec<Token> {
    sentences
        .split_whitespace()
        .enumerate()
        .map(|(position, word)| Token {
            position: position as u32,
            word: word.to_string(),
        })
        .collect()
}

/// The whole value as a single token.
pub fn tokenize_keyword(value: &str) -> Vec<Token> {
    if value.is_empty() {
        return Vec::new();
    }
    vec![Token {
        position: 0,
        word: value.to_string(),
    }]
}
