//! Text analysis. An analyzer turns a field value into positioned tokens; the
//! same analyzer is used for a field at index time and at query time so that
//! any input producing token `x` when indexed is also queried as `x`.

pub mod tokenizer;

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::analysis::tokenizer::{SearchTokenizer, Token, tokenize_keyword, tokenize_whitespace};

pub trait Analyzer: Send + Sync + fmt::Debug {
    fn analyze(&self, text: &str) -> Vec<Token>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    /// Word split, lower-case, English stop words removed.
    #[default]
    Standard,
    /// Word split and lower-case.
    Simple,
    /// Whitespace split, case preserved.
    Whitespace,
    /// The whole value is one token.
    Keyword,
}

#[derive(Debug)]
struct StandardAnalyzer(SearchTokenizer);

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        self.0.tokenize(text)
    }
}

#[derive(Debug)]
struct WhitespaceAnalyzer;

impl Analyzer for WhitespaceAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        tokenize_whitespace(text)
    }
}

#[derive(Debug)]
struct KeywordAnalyzer;

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<Token> {
        tokenize_keyword(text)
    }
}

impl AnalyzerKind {
    pub fn build(self) -> Arc<dyn Analyzer> {
        match self {
            AnalyzerKind::Standard => Arc::new(StandardAnalyzer(SearchTokenizer::new(true))),
            AnalyzerKind::Simple => Arc::new(StandardAnalyzer(SearchTokenizer::new(false))),
            AnalyzerKind::Whitespace => Arc::new(WhitespaceAnalyzer),
            AnalyzerKind::Keyword => Arc::new(KeywordAnalyzer),
        }
    }
}

/// Which analyzer each field uses. Persisted in the manifest so every reader
/// analyzes queries exactly like the writer analyzed documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub default: AnalyzerKind,
    pub fields: BTreeMap<String, AnalyzerKind>,
}

impl AnalyzerConfig {
    pub fn with_field(mut self, field: impl Into<String>, kind: AnalyzerKind) -> Self {
        self.fields.insert(field.into(), kind);
        self
    }

    pub fn kind_for(&self, field: &str) -> AnalyzerKind {
        self.fields.get(field).copied().unwrap_or(self.default)
    }
}

/// How an indexed field was written: analyzed text or a single verbatim token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexedAs {
    Text,
    Token,
}

impl fmt::Display for IndexedAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexedAs::Text => write!(f, "text"),
            IndexedAs::Token => write!(f, "token"),
        }
    }
}

/// Resolves the analyzer for a field name.
#[derive(Debug, Clone)]
pub struct AnalyzerRegistry {
    config: AnalyzerConfig,
    default: Arc<dyn Analyzer>,
    fields: BTreeMap<String, Arc<dyn Analyzer>>,
    keyword: Arc<dyn Analyzer>,
}

impl AnalyzerRegistry {
    pub fn new(config: AnalyzerConfig) -> Self {
        let fields = config
            .fields
            .iter()
            .map(|(field, kind)| (field.clone(), kind.build()))
            .collect();
        Self {
            default: config.default.build(),
            fields,
            keyword: AnalyzerKind::Keyword.build(),
            config,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyzer_for(&self, field: &str) -> &dyn Analyzer {
        self.fields
            .get(field)
            .map(|analyzer| analyzer.as_ref())
            .unwrap_or(self.default.as_ref())
    }

    /// Tokens for a value indexed the given way. `Token` values bypass the
    /// field's analyzer.
    pub fn analyze(&self, field: &str, indexed_as: IndexedAs, text: &str) -> Vec<Token> {
        match indexed_as {
            IndexedAs::Text => self.analyzer_for(field).analyze(text),
            IndexedAs::Token => self.keyword.analyze(text),
        }
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_per_field_analyzer() {
        let registry = AnalyzerRegistry::new(
            AnalyzerConfig::default().with_field("url", AnalyzerKind::Keyword),
        );
        let url = registry.analyze("url", IndexedAs::Text, "http://A");
        assert_eq!(url.len(), 1);
        assert_eq!(url[0].word, "http://A");

        let text = registry.analyze("passage_text", IndexedAs::Text, "The Quick fox");
        let words: Vec<_> = text.iter().map(|t| t.word.as_str()).collect();
        assert_eq!(words, vec!["quick", "fox"]);
    }

    #[test]
    fn test_token_values_bypass_analyzer() {
        let registry = AnalyzerRegistry::default();
        let tokens = registry.analyze("passage_text", IndexedAs::Token, "ID-42 X");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].word, "ID-42 X");
    }

    #[test]
    fn test_config_json_defaults() {
        let config: AnalyzerConfig = serde_json::from_str(r#"{"fields":{"url":"simple"}}"#).unwrap();
        assert_eq!(config.default, AnalyzerKind::Standard);
        assert_eq!(config.kind_for("url"), AnalyzerKind::Simple);
        assert_eq!(config.kind_for("other"), AnalyzerKind::Standard);
    }

    proptest! {
        // analyzing an emitted token again yields exactly that token
        #[test]
        fn standard_analyzer_is_idempotent_on_its_tokens(text in "[a-zA-Z0-9 ,.!?-]{0,64}") {
            let registry = AnalyzerRegistry::default();
            for token in registry.analyze("f", IndexedAs::Text, &text) {
                let again = registry.analyze("f", IndexedAs::Text, &token.word);
                prop_assert_eq!(again.len(), 1);
                prop_assert_eq!(&again[0].word, &token.word);
            }
        }
    }
}
