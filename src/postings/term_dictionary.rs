use std::fmt;

use crate::{
    error::{Result, SearchError},
    utils::bytes::{ByteReader, write_string},
};

/// A searchable unit: a token inside a named field. Ordered by field, then text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}

/// Where a term's postings live inside the segment's postings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermInfo {
    pub doc_freq: u32,
    pub postings_offset: u64,
    pub postings_len: u32,
}

/*
 Term Dictionary Layout->
   no_of_terms     u32
   per term, sorted by (field, text):
     field          u32 length + utf-8
     text           u32 length + utf-8
     doc_freq       u32
     postings_offset u64
     postings_len   u32
*/
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    entries: Vec<(Term, TermInfo)>,
}

impl TermDictionary {
    /// `entries` must already be sorted by term.
    pub fn from_sorted(entries: Vec<(Term, TermInfo)>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, field: &str, text: &str) -> Option<&TermInfo> {
        self.entries
            .binary_search_by(|(term, _)| (term.field.as_str(), term.text.as_str()).cmp(&(field, text)))
            .ok()
            .map(|index| &self.entries[index].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Term, TermInfo)> {
        self.entries.iter()
    }

    /// Terms of `field` starting with `prefix`, in dictionary order.
    pub fn terms_with_prefix<'a>(
        &'a self,
        field: &'a str,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a (Term, TermInfo)> + 'a {
        let start = self
            .entries
            .partition_point(|(term, _)| (term.field.as_str(), term.text.as_str()) < (field, prefix));
        self.entries[start..]
            .iter()
            .take_while(move |(term, _)| term.field == field && term.text.starts_with(prefix))
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.terms_with_prefix(field, "").next().is_some()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for (term, info) in &self.entries {
            write_string(&mut out, &term.field);
            out.extend_from_slice(&(term.text.len() as u32).to_le_bytes());
            out.extend_from_slice(term.text.as_bytes());
            out.extend_from_slice(&info.doc_freq.to_le_bytes());
            out.extend_from_slice(&info.postings_offset.to_le_bytes());
            out.extend_from_slice(&info.postings_len.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8], file_name: &str) -> Result<Self> {
        let corrupted = || SearchError::corrupted(file_name, "truncated term dictionary");
        let mut reader = ByteReader::new(bytes);
        let no_of_terms = reader.read_u32().ok_or_else(corrupted)? as usize;
        let mut entries = Vec::with_capacity(no_of_terms.min(bytes.len()));
        for _ in 0..no_of_terms {
            let field = reader.read_string().ok_or_else(corrupted)?;
            let text_len = reader.read_u32().ok_or_else(corrupted)? as usize;
            let text = reader.read_str(text_len).ok_or_else(corrupted)?.to_string();
            let info = TermInfo {
                doc_freq: reader.read_u32().ok_or_else(corrupted)?,
                postings_offset: reader.read_u64().ok_or_else(corrupted)?,
                postings_len: reader.read_u32().ok_or_else(corrupted)?,
            };
            let term = Term { field, text };
            if entries.last().is_some_and(|(last, _): &(Term, TermInfo)| *last >= term) {
                return Err(SearchError::corrupted(file_name, "terms out of order"));
            }
            entries.push((term, info));
        }
        if !reader.is_empty() {
            return Err(SearchError::corrupted(file_name, "trailing bytes after term dictionary"));
        }
        Ok(Self { entries })
    }
}
