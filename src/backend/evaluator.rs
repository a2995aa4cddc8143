//! Query evaluation for the embedded backends
//!
//! Understands the syntax produced by the query builder: `*`, or a
//! whitespace-separated intersection of `@field:{tag}`, `@field:(terms)`
//! and `@field:term` clauses. A text term ending in `*` matches by prefix.

use super::{Document, IndexDefinition};
use crate::error::{ClientError, Result};
use crate::query::{SearchQuery, SortOrder};
use crate::schema::ALL_QUERY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub text: String,
    pub prefix: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Tag { field: String, value: String },
    Text { field: String, terms: Vec<Term> },
}

impl Clause {
    pub fn field(&self) -> &str {
        match self {
            Clause::Tag { field, .. } | Clause::Text { field, .. } => field,
        }
    }

    fn matches(&self, document: &Document) -> bool {
        match self {
            Clause::Tag { field, value } => document
                .fields
                .get(field)
                .map(|stored| {
                    stored
                        .split(',')
                        .any(|tag| tag.trim().eq_ignore_ascii_case(value))
                })
                .unwrap_or(false),
            Clause::Text { field, terms } => {
                if terms.is_empty() {
                    return false;
                }
                let Some(stored) = document.fields.get(field) else {
                    return false;
                };
                let tokens = tokenize(stored);
                terms.iter().all(|term| {
                    tokens.iter().any(|token| {
                        if term.prefix {
                            token.starts_with(&term.text)
                        } else {
                            *token == term.text
                        }
                    })
                })
            }
        }
    }
}

/// Parsed query; no clauses means match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub clauses: Vec<Clause>,
}

impl ParsedQuery {
    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|c| c.matches(document))
    }

    /// Reject clauses on fields the index does not define
    pub fn validate(&self, definition: &IndexDefinition) -> Result<()> {
        for clause in &self.clauses {
            if definition.field(clause.field()).is_none() {
                return Err(ClientError::Backend(format!(
                    "Unknown field '{}' in index {}",
                    clause.field(),
                    definition.name
                )));
            }
        }
        Ok(())
    }
}

/// Lower-cased alphanumeric tokens of a text value
pub fn tokenize(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

pub fn parse(query: &str) -> Result<ParsedQuery> {
    let trimmed = query.trim();
    if trimmed.is_empty() || trimmed == ALL_QUERY {
        return Ok(ParsedQuery::default());
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let mut clauses = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        if chars[pos].is_whitespace() {
            pos += 1;
            continue;
        }
        if chars[pos] != '@' {
            return Err(syntax_error(trimmed, pos, "expected '@'"));
        }
        pos += 1;

        let start = pos;
        while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
            pos += 1;
        }
        if pos == start {
            return Err(syntax_error(trimmed, pos, "expected field name"));
        }
        let field: String = chars[start..pos].iter().collect();

        if chars.get(pos) != Some(&':') {
            return Err(syntax_error(trimmed, pos, "expected ':'"));
        }
        pos += 1;

        match chars.get(pos) {
            Some('{') => {
                let (value, next, closed) = scan(&chars, pos + 1, |c| c == '}');
                if !closed {
                    return Err(syntax_error(trimmed, pos, "unterminated tag"));
                }
                clauses.push(Clause::Tag { field, value });
                pos = next + 1;
            }
            Some('(') => {
                let (raw, next, closed) = scan(&chars, pos + 1, |c| c == ')');
                if !closed {
                    return Err(syntax_error(trimmed, pos, "unterminated group"));
                }
                clauses.push(Clause::Text {
                    field,
                    terms: terms(&raw),
                });
                pos = next + 1;
            }
            Some(c) if !c.is_whitespace() => {
                let (raw, next, _) = scan(&chars, pos, char::is_whitespace);
                clauses.push(Clause::Text {
                    field,
                    terms: terms(&raw),
                });
                pos = next;
            }
            _ => return Err(syntax_error(trimmed, pos, "expected value")),
        }
    }

    Ok(ParsedQuery { clauses })
}

/// Read up to the first unescaped character matching `stop`.
///
/// Returns the unescaped text, the position reached and whether a stop
/// character was found before the end of input.
fn scan(chars: &[char], mut pos: usize, stop: impl Fn(char) -> bool) -> (String, usize, bool) {
    let mut out = String::new();
    while pos < chars.len() {
        let c = chars[pos];
        if c == '\\' && pos + 1 < chars.len() {
            out.push(chars[pos + 1]);
            pos += 2;
        } else if stop(c) {
            return (out, pos, true);
        } else {
            out.push(c);
            pos += 1;
        }
    }
    (out, pos, false)
}

fn terms(raw: &str) -> Vec<Term> {
    let mut out = Vec::new();
    for word in raw.split_whitespace() {
        let prefix = word.ends_with('*');
        let tokens = tokenize(word.trim_end_matches('*'));
        let last = tokens.len().saturating_sub(1);
        for (i, text) in tokens.into_iter().enumerate() {
            out.push(Term {
                text,
                prefix: prefix && i == last,
            });
        }
    }
    out
}

fn syntax_error(query: &str, pos: usize, message: &str) -> ClientError {
    ClientError::Backend(format!(
        "Syntax error at offset {} in query '{}': {}",
        pos, query, message
    ))
}

/// Evaluate a query over candidate documents.
///
/// Returns the total match count and the requested window. Without a sort
/// field documents come back in key order; sorted results break ties by key.
pub fn execute<I>(
    definition: &IndexDefinition,
    candidates: I,
    query: &SearchQuery,
) -> Result<(u64, Vec<Document>)>
where
    I: IntoIterator<Item = Document>,
{
    let parsed = parse(&query.query)?;
    parsed.validate(definition)?;

    if let Some(sort) = &query.sort {
        if definition.field(&sort.field).is_none() {
            return Err(ClientError::Backend(format!(
                "Property '{}' not loaded nor in schema of index {}",
                sort.field, definition.name
            )));
        }
    }

    let mut matched: Vec<Document> = candidates
        .into_iter()
        .filter(|d| d.key.starts_with(&definition.prefix) && parsed.matches(d))
        .collect();

    match &query.sort {
        Some(sort) => matched.sort_by(|a, b| {
            let primary = a.fields.get(&sort.field).cmp(&b.fields.get(&sort.field));
            let primary = match sort.order {
                SortOrder::Ascending => primary,
                SortOrder::Descending => primary.reverse(),
            };
            primary.then_with(|| a.key.cmp(&b.key))
        }),
        None => matched.sort_by(|a, b| a.key.cmp(&b.key)),
    }

    let total = matched.len() as u64;
    let window = matched
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .map(|mut d| {
            if !query.include_content {
                d.fields.clear();
                d.payload = None;
            }
            d
        })
        .collect();

    Ok((total, window))
}
