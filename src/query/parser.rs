use crate::{
    error::{Result, SearchError},
    query::query_tree::{Occur, QueryTree},
};

/*
 Query syntax, loosely following the classic Lucene query parser:

   how long                   words, OR'd, each searched in every default field
   "how long"                 phrase
   passage_text:long          word in one field
   url:"a b"  query:(a b)     phrase or group in one field
   +must -must_not NOT x      modifiers
   a AND b, a OR b            operators (upper case)
   (a OR b) AND c             groups
   passage_text:lon*          prefix
*/

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Must,
    MustNot,
    // `name:` ; the position of the token is the position of the colon
    Field(String),
    Word(String),
    Phrase(String),
}

#[derive(Debug, Clone, PartialEq)]
struct LexToken {
    kind: TokenKind,
    position: usize,
}

fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

fn is_word_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"')
}

fn lex(text: &str) -> Result<Vec<LexToken>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    // +/- only act as modifiers at the start of a clause
    let mut at_clause_start = true;

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            at_clause_start = true;
            continue;
        }
        match c {
            '(' | ')' => {
                chars.next();
                let kind = if c == '(' { TokenKind::LParen } else { TokenKind::RParen };
                tokens.push(LexToken { kind, position });
                at_clause_start = true;
            }
            '"' => {
                chars.next();
                let start = position + 1;
                let mut end = None;
                for (i, c) in chars.by_ref() {
                    if c == '"' {
                        end = Some(i);
                        break;
                    }
                }
                let Some(end) = end else {
                    return Err(SearchError::query_syntax(position, "unbalanced quote"));
                };
                tokens.push(LexToken {
                    kind: TokenKind::Phrase(text[start..end].to_string()),
                    position,
                });
                at_clause_start = false;
            }
            '+' | '-' if at_clause_start => {
                chars.next();
                match chars.peek() {
                    Some(&(_, next)) if !next.is_whitespace() && next != ')' => {}
                    _ => return Err(SearchError::query_syntax(position, "modifier without a clause")),
                }
                let kind = if c == '+' { TokenKind::Must } else { TokenKind::MustNot };
                tokens.push(LexToken { kind, position });
            }
            _ => {
                let mut end = text.len();
                while let Some(&(i, c)) = chars.peek() {
                    if is_word_boundary(c) {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                let word = &text[position..end];
                at_clause_start = false;
                match word {
                    "AND" => tokens.push(LexToken { kind: TokenKind::And, position }),
                    "OR" => tokens.push(LexToken { kind: TokenKind::Or, position }),
                    "NOT" => tokens.push(LexToken { kind: TokenKind::Not, position }),
                    _ => {
                        let next = chars.peek().map(|&(_, c)| c);
                        lex_word(word, position, next, &mut tokens)?;
                    }
                }
            }
        }
    }
    Ok(tokens)
}

// Splits `name:value` into a field token and a word token. A bare `name:`
// must be directly followed by a phrase or a group.
fn lex_word(word: &str, position: usize, next: Option<char>, tokens: &mut Vec<LexToken>) -> Result<()> {
    match word.find(':') {
        Some(colon) if is_field_name(&word[..colon]) => {
            let colon_position = position + colon;
            tokens.push(LexToken {
                kind: TokenKind::Field(word[..colon].to_string()),
                position: colon_position,
            });
            let value = &word[colon + 1..];
            if value.is_empty() && !matches!(next, Some('"' | '(')) {
                return Err(SearchError::query_syntax(colon_position, "field without a value"));
            }
            if !value.is_empty() {
                tokens.push(LexToken {
                    kind: TokenKind::Word(value.to_string()),
                    position: colon_position + 1,
                });
            }
        }
        _ => tokens.push(LexToken {
            kind: TokenKind::Word(word.to_string()),
            position,
        }),
    }
    Ok(())
}

// Deeper groups are rejected before recursion can exhaust the stack.
const MAX_GROUP_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<LexToken>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&LexToken> {
        self.tokens.get(self.cursor)
    }

    fn bump(&mut self) -> Option<LexToken> {
        let token = self.tokens.get(self.cursor).cloned();
        self.cursor += 1;
        token
    }

    fn parse_group(&mut self, fields: &[String], open_position: usize) -> Result<QueryTree> {
        if self.depth >= MAX_GROUP_DEPTH {
            return Err(SearchError::query_syntax(open_position, "parentheses nested too deeply"));
        }
        self.depth += 1;
        let group = self.parse_query(fields, Some(open_position));
        self.depth -= 1;
        group
    }

    // Parses clauses until the end of input or, inside a group, until the
    // closing parenthesis. `group_start` is the position of the opening one.
    fn parse_query(&mut self, fields: &[String], group_start: Option<usize>) -> Result<QueryTree> {
        let mut clauses: Vec<(Occur, QueryTree)> = Vec::new();
        let mut conjunction: Option<LexToken> = None;

        loop {
            let Some(token) = self.peek().cloned() else {
                if let Some(start) = group_start {
                    return Err(SearchError::query_syntax(start, "unbalanced parenthesis"));
                }
                break;
            };
            match token.kind {
                TokenKind::RParen => {
                    if group_start.is_none() {
                        return Err(SearchError::query_syntax(token.position, "unbalanced parenthesis"));
                    }
                    self.bump();
                    break;
                }
                TokenKind::And | TokenKind::Or => {
                    if clauses.is_empty() || conjunction.is_some() {
                        return Err(SearchError::query_syntax(token.position, "operator without a left operand"));
                    }
                    self.bump();
                    conjunction = Some(token);
                }
                _ => {
                    let modifier = match token.kind {
                        TokenKind::Must | TokenKind::MustNot | TokenKind::Not => {
                            self.bump();
                            Some(token.kind.clone())
                        }
                        _ => None,
                    };
                    let clause = self.parse_clause(fields, token.position)?;
                    let conjunction_kind = conjunction.take().map(|token| token.kind);
                    add_clause(&mut clauses, conjunction_kind, modifier, clause);
                }
            }
        }

        if let Some(token) = conjunction {
            return Err(SearchError::query_syntax(token.position, "operator without a right operand"));
        }
        if clauses.is_empty() {
            return Err(match group_start {
                Some(start) => SearchError::query_syntax(start, "empty group"),
                None => SearchError::query_syntax(0, "empty query"),
            });
        }
        if clauses.len() == 1 && clauses[0].0 != Occur::MustNot {
            return Ok(clauses.remove(0).1);
        }
        Ok(QueryTree::Boolean(clauses))
    }

    // `anchor` is reported when the clause is missing altogether.
    fn parse_clause(&mut self, fields: &[String], anchor: usize) -> Result<QueryTree> {
        let Some(token) = self.bump() else {
            return Err(SearchError::query_syntax(anchor, "operator without a clause"));
        };
        match token.kind {
            TokenKind::Word(word) => Ok(word_query(fields, &word)),
            TokenKind::Phrase(text) => Ok(across_fields(fields, |field| QueryTree::phrase(field, text.as_str()))),
            TokenKind::LParen => self.parse_group(fields, token.position),
            TokenKind::Field(name) => {
                let field = vec![name];
                match self.bump() {
                    Some(LexToken {
                        kind: TokenKind::Word(word),
                        ..
                    }) => Ok(word_query(&field, &word)),
                    Some(LexToken {
                        kind: TokenKind::Phrase(text),
                        ..
                    }) => Ok(QueryTree::phrase(field[0].as_str(), text)),
                    Some(LexToken {
                        kind: TokenKind::LParen,
                        position,
                    }) => self.parse_group(&field, position),
                    _ => Err(SearchError::query_syntax(token.position, "field without a value")),
                }
            }
            TokenKind::RParen => Err(SearchError::query_syntax(anchor, "operator without a clause")),
            TokenKind::And | TokenKind::Or | TokenKind::Not | TokenKind::Must | TokenKind::MustNot => {
                Err(SearchError::query_syntax(token.position, "unexpected operator"))
            }
        }
    }
}

fn word_query(fields: &[String], word: &str) -> QueryTree {
    match word.strip_suffix('*') {
        Some(prefix) if !prefix.is_empty() && !prefix.ends_with('*') => {
            across_fields(fields, |field| QueryTree::prefix(field, prefix))
        }
        _ => across_fields(fields, |field| QueryTree::term(field, word)),
    }
}

fn across_fields(fields: &[String], build: impl Fn(&str) -> QueryTree) -> QueryTree {
    if let [field] = fields {
        return build(field);
    }
    QueryTree::Boolean(
        fields
            .iter()
            .map(|field| (Occur::Should, build(field)))
            .collect(),
    )
}

// AND turns the previous optional clause into a required one; the default
// operator between clauses is OR.
fn add_clause(
    clauses: &mut Vec<(Occur, QueryTree)>,
    conjunction: Option<TokenKind>,
    modifier: Option<TokenKind>,
    clause: QueryTree,
) {
    let is_and = conjunction == Some(TokenKind::And);
    if is_and {
        if let Some(last) = clauses.last_mut() {
            if last.0 == Occur::Should {
                last.0 = Occur::Must;
            }
        }
    }
    let occur = match modifier {
        Some(TokenKind::MustNot | TokenKind::Not) => Occur::MustNot,
        Some(TokenKind::Must) => Occur::Must,
        _ if is_and => Occur::Must,
        _ => Occur::Should,
    };
    clauses.push((occur, clause));
}

/// Parses `query_text`. Clauses without an explicit field are searched in
/// every field of `default_fields`.
pub fn parse(query_text: &str, default_fields: &[&str]) -> Result<QueryTree> {
    if query_text.trim().is_empty() {
        return Err(SearchError::query_syntax(0, "empty query"));
    }
    if default_fields.is_empty() {
        return Err(SearchError::query_syntax(0, "no default fields to search"));
    }
    let fields: Vec<String> = default_fields.iter().map(|field| field.to_string()).collect();
    let mut parser = Parser {
        tokens: lex(query_text)?,
        cursor: 0,
        depth: 0,
    };
    parser.parse_query(&fields, None)
}
