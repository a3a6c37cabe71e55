use std::fmt;

/// How a clause of a boolean query takes part in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

/// A parsed query. Leaves carry raw query text for one field; the text is
/// analyzed at evaluation time with the analyzer that field was indexed with.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTree {
    /// A single query word. Several tokens after analysis make it a phrase.
    Term { field: String, text: String },
    /// Quoted text; its tokens must appear at their relative positions.
    Phrase { field: String, text: String },
    /// Every term of `field` starting with `prefix`.
    Prefix { field: String, prefix: String },
    Boolean(Vec<(Occur, QueryTree)>),
}

impl QueryTree {
    pub fn term(field: impl Into<String>, text: impl Into<String>) -> Self {
        QueryTree::Term {
            field: field.into(),
            text: text.into(),
        }
    }

    pub fn phrase(field: impl Into<String>, text: impl Into<String>) -> Self {
        QueryTree::Phrase {
            field: field.into(),
            text: text.into(),
        }
    }

    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        QueryTree::Prefix {
            field: field.into(),
            prefix: prefix.into(),
        }
    }
}

impl fmt::Display for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryTree::Term { field, text } => write!(f, "{}:{}", field, text),
            QueryTree::Phrase { field, text } => write!(f, "{}:\"{}\"", field, text),
            QueryTree::Prefix { field, prefix } => write!(f, "{}:{}*", field, prefix),
            QueryTree::Boolean(clauses) => {
                write!(f, "(")?;
                for (i, (occur, clause)) in clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match occur {
                        Occur::Must => write!(f, "+")?,
                        Occur::MustNot => write!(f, "-")?,
                        Occur::Should => {}
                    }
                    write!(f, "{}", clause)?;
                }
                write!(f, ")")
            }
        }
    }
}
