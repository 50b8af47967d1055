//! Tokenizer and structural parser for the save-file clause grammar.
//!
//! The grammar has no native list syntax: `a = { 1 2 3 }` holds positional
//! elements, while a key repeated at one nesting level (`trait = x trait = y`)
//! is coerced into a list. Both forms surface as [`ClauseValue::List`].

use crate::error::ParseError;

/// Synthetic key positional elements are filed under while an object is open.
pub const LIST_MARKER: &str = "$items";

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseValue {
    Scalar(Scalar),
    Object(Clauses),
    List(Vec<ClauseValue>),
}

/// A scalar token with its source lexeme preserved, so round-tripping a
/// well-formed save re-emits the value byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    raw: String,
    quoted: bool,
}

impl Scalar {
    pub fn new(raw: impl Into<String>, quoted: bool) -> Self {
        Self {
            raw: raw.into(),
            quoted,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.raw.parse().ok()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.raw.parse().ok()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.raw.as_str() {
            "yes" => Some(true),
            "no" => Some(false),
            _ => None,
        }
    }
}

/// An ordered set of key/value entries. Insertion order is preserved;
/// repeated keys have already been coerced into a single list entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clauses {
    entries: Vec<(String, ClauseValue)>,
}

impl Clauses {
    pub fn get(&self, key: &str) -> Option<&ClauseValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// All values under `key`, flattening a coerced repeated-key list into
    /// its elements. A single occurrence yields a one-element vec.
    pub fn values_of<'a>(&'a self, key: &str) -> Vec<&'a ClauseValue> {
        match self.get(key) {
            Some(ClauseValue::List(items)) => items.iter().collect(),
            Some(value) => vec![value],
            None => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClauseValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positional elements of a mixed object (`{ 1 2 key = v }`).
    pub fn positional(&self) -> Vec<&ClauseValue> {
        self.values_of(LIST_MARKER)
    }

    /// Repeated keys at one level coerce into a single list. Once coerced,
    /// an accumulated list is indistinguishable from a list-valued first
    /// occurrence, so repeated list values flatten: `a={1 2} a={3}` reads
    /// back as `[1 2 3]`. Saves only repeat list-valued keys for id
    /// rosters, where the merged view is the one consumers want; object
    /// values stay distinct (`a={k=1} a={k=2}` yields two objects).
    fn insert(&mut self, key: String, value: ClauseValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => match existing {
                ClauseValue::List(items) => match value {
                    ClauseValue::List(more) => items.extend(more),
                    single => items.push(single),
                },
                _ => {
                    let first =
                        std::mem::replace(existing, ClauseValue::List(Vec::with_capacity(2)));
                    if let ClauseValue::List(items) = existing {
                        items.push(first);
                        match value {
                            ClauseValue::List(more) => items.extend(more),
                            single => items.push(single),
                        }
                    }
                }
            },
            None => self.entries.push((key, value)),
        }
    }

    /// Close an open object: if its only property is the synthetic list
    /// marker, unwrap into a plain list.
    fn finish(mut self) -> ClauseValue {
        if self.entries.len() == 1 && self.entries[0].0 == LIST_MARKER {
            if let Some((_, value)) = self.entries.pop() {
                return match value {
                    ClauseValue::List(items) => ClauseValue::List(items),
                    single => ClauseValue::List(vec![single]),
                };
            }
        }
        ClauseValue::Object(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Open,
    Close,
    Eq,
    Scalar(Scalar),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: u32,
    column: u32,
}

/// Parse raw save text into the top-level clause table.
pub fn parse(raw: &str) -> Result<Clauses, ParseError> {
    let tokens = tokenize(raw)?;
    let mut cursor = 0usize;
    let root = parse_object(&tokens, &mut cursor, 0)?;
    match root.finish() {
        ClauseValue::Object(clauses) => Ok(clauses),
        // A top level made of nothing but positional values still has to
        // come back as a table for the schema layer.
        ClauseValue::List(items) => {
            let mut clauses = Clauses::default();
            for item in items {
                clauses.insert(LIST_MARKER.to_string(), item);
            }
            Ok(clauses)
        }
        ClauseValue::Scalar(_) => unreachable!("finish never yields a scalar"),
    }
}

fn tokenize(raw: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = raw.char_indices().peekable();
    let mut line = 1u32;
    let mut column = 1u32;

    while let Some((start, ch)) = chars.next() {
        let (tok_line, tok_column) = (line, column);
        match ch {
            '\n' => {
                line += 1;
                column = 1;
            }
            c if c.is_whitespace() => {
                column += 1;
            }
            '#' => {
                // Line comment: swallow to end of line.
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        column = 1;
                        break;
                    }
                }
            }
            '{' => {
                tokens.push(Token {
                    kind: TokenKind::Open,
                    line: tok_line,
                    column: tok_column,
                });
                column += 1;
            }
            '}' => {
                tokens.push(Token {
                    kind: TokenKind::Close,
                    line: tok_line,
                    column: tok_column,
                });
                column += 1;
            }
            '=' => {
                tokens.push(Token {
                    kind: TokenKind::Eq,
                    line: tok_line,
                    column: tok_column,
                });
                column += 1;
            }
            '"' => {
                column += 1;
                let mut end = None;
                for (idx, c) in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        column = 1;
                    } else {
                        column += 1;
                    }
                    if c == '"' {
                        end = Some(idx);
                        break;
                    }
                }
                let Some(end) = end else {
                    return Err(ParseError::UnterminatedString {
                        line: tok_line,
                        column: tok_column,
                    });
                };
                tokens.push(Token {
                    kind: TokenKind::Scalar(Scalar::new(&raw[start + 1..end], true)),
                    line: tok_line,
                    column: tok_column,
                });
            }
            _ => {
                // Bare symbol: runs to the next structural char or whitespace.
                let mut end = start + ch.len_utf8();
                column += 1;
                while let Some(&(idx, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '{' | '}' | '=' | '"' | '#') {
                        break;
                    }
                    chars.next();
                    column += 1;
                    end = idx + c.len_utf8();
                }
                tokens.push(Token {
                    kind: TokenKind::Scalar(Scalar::new(&raw[start..end], false)),
                    line: tok_line,
                    column: tok_column,
                });
            }
        }
    }
    Ok(tokens)
}

fn parse_object(tokens: &[Token], cursor: &mut usize, depth: u32) -> Result<Clauses, ParseError> {
    let mut clauses = Clauses::default();

    while *cursor < tokens.len() {
        let token = &tokens[*cursor];
        match &token.kind {
            TokenKind::Close => {
                if depth == 0 {
                    return Err(ParseError::UnbalancedClose {
                        line: token.line,
                        column: token.column,
                    });
                }
                *cursor += 1;
                return Ok(clauses);
            }
            TokenKind::Open => {
                // Bare `{...}`: a positional list/object element.
                *cursor += 1;
                let inner = parse_object(tokens, cursor, depth + 1)?;
                clauses.insert(LIST_MARKER.to_string(), inner.finish());
            }
            TokenKind::Eq => {
                return Err(ParseError::StrayOperator {
                    line: token.line,
                    column: token.column,
                });
            }
            TokenKind::Scalar(scalar) => {
                let is_assignment = matches!(
                    tokens.get(*cursor + 1).map(|t| &t.kind),
                    Some(TokenKind::Eq)
                );
                if !is_assignment {
                    // Positional scalar element.
                    clauses.insert(LIST_MARKER.to_string(), ClauseValue::Scalar(scalar.clone()));
                    *cursor += 1;
                    continue;
                }
                let key = scalar.as_str().to_string();
                *cursor += 2; // key and '='
                let Some(value_token) = tokens.get(*cursor) else {
                    return Err(ParseError::MissingValue {
                        key,
                        line: token.line,
                        column: token.column,
                    });
                };
                let value = match &value_token.kind {
                    TokenKind::Scalar(s) => {
                        *cursor += 1;
                        ClauseValue::Scalar(s.clone())
                    }
                    TokenKind::Open => {
                        *cursor += 1;
                        parse_object(tokens, cursor, depth + 1)?.finish()
                    }
                    TokenKind::Close | TokenKind::Eq => {
                        return Err(ParseError::MissingValue {
                            key,
                            line: value_token.line,
                            column: value_token.column,
                        });
                    }
                };
                clauses.insert(key, value);
            }
        }
    }

    if depth > 0 {
        return Err(ParseError::UnexpectedEof {
            depth: depth as usize,
        });
    }
    Ok(clauses)
}

/// Re-serialize a parsed table. Scalars come back with their exact source
/// lexeme (quotes included); structure is re-indented.
pub fn write_clauses(clauses: &Clauses) -> String {
    let mut out = String::new();
    write_entries(clauses, 0, &mut out);
    out
}

fn write_entries(clauses: &Clauses, indent: usize, out: &mut String) {
    for (key, value) in clauses.iter() {
        if key == LIST_MARKER {
            match value {
                ClauseValue::List(items) => {
                    for item in items {
                        write_positional(item, indent, out);
                    }
                }
                other => write_positional(other, indent, out),
            }
            continue;
        }
        match value {
            // A coerced repeated key re-emits as repeated assignments.
            ClauseValue::List(items) => {
                for item in items {
                    push_indent(indent, out);
                    out.push_str(key);
                    out.push('=');
                    write_value(item, indent, out);
                    out.push('\n');
                }
            }
            other => {
                push_indent(indent, out);
                out.push_str(key);
                out.push('=');
                write_value(other, indent, out);
                out.push('\n');
            }
        }
    }
}

fn write_positional(value: &ClauseValue, indent: usize, out: &mut String) {
    push_indent(indent, out);
    write_value(value, indent, out);
    out.push('\n');
}

fn write_value(value: &ClauseValue, indent: usize, out: &mut String) {
    match value {
        ClauseValue::Scalar(s) => {
            if s.is_quoted() {
                out.push('"');
                out.push_str(s.as_str());
                out.push('"');
            } else {
                out.push_str(s.as_str());
            }
        }
        ClauseValue::Object(obj) => {
            out.push_str("{\n");
            write_entries(obj, indent + 1, out);
            push_indent(indent, out);
            out.push('}');
        }
        ClauseValue::List(items) => {
            out.push_str("{\n");
            for item in items {
                write_positional(item, indent + 1, out);
            }
            push_indent(indent, out);
            out.push('}');
        }
    }
}

fn push_indent(indent: usize, out: &mut String) {
    for _ in 0..indent {
        out.push('\t');
    }
}
