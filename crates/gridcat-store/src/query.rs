//! Bind-parameter compilation.
//!
//! Query text names its parameters as `:name`. [`CompiledQuery::compile`]
//! scans the text once, records each distinct name in order of first
//! appearance and rewrites every occurrence into a positional `$n`
//! placeholder, which both PostgreSQL and SQLite (through sqlx) accept.
//! Values never touch the SQL text.
//!
//! A `:` only opens a parameter when it is not preceded by `:`, `\` or an
//! identifier character and the name is not followed by another `:`. That
//! keeps `::int` casts and literals like `10:30` intact. Quoted strings,
//! quoted identifiers, dollar-quoted bodies and comments are never scanned
//! for parameters. `\:name` writes a literal `:name`; the backslash is
//! dropped wherever it appears.

use std::collections::HashMap;
use std::fmt::Write;

use crate::error::ExecutionError;

/// A typed, nullable value bound to one placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(Option<String>),
    Int(Option<i64>),
    Float(Option<f64>),
    Bool(Option<bool>),
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        BindValue::Text(Some(value.to_string()))
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        BindValue::Text(Some(value))
    }
}

impl From<Option<String>> for BindValue {
    fn from(value: Option<String>) -> Self {
        BindValue::Text(value)
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        BindValue::Int(Some(value))
    }
}

impl From<Option<i64>> for BindValue {
    fn from(value: Option<i64>) -> Self {
        BindValue::Int(value)
    }
}

impl From<f64> for BindValue {
    fn from(value: f64) -> Self {
        BindValue::Float(Some(value))
    }
}

impl From<Option<f64>> for BindValue {
    fn from(value: Option<f64>) -> Self {
        BindValue::Float(value)
    }
}

impl From<bool> for BindValue {
    fn from(value: bool) -> Self {
        BindValue::Bool(Some(value))
    }
}

/// Named values supplied for one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindParams {
    values: HashMap<String, BindValue>,
}

impl BindParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add (or replace) one named value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<BindValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<BindValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&BindValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every query-string value binds as text.
    pub fn from_text_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.insert(key, BindValue::Text(Some(value.into())));
        }
        params
    }
}

/// Query text with its `:name` parameters resolved to positional slots.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    text: String,
    sql: String,
    parameters: Vec<String>,
}

impl CompiledQuery {
    pub fn compile(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut sql = String::with_capacity(text.len() + 8);
        let mut parameters: Vec<String> = Vec::new();
        let mut copied = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                quote @ (b'\'' | b'"') => i = skip_quoted(bytes, i, quote),
                b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_line_comment(bytes, i),
                b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
                b'$' if i == 0 || !is_word(bytes[i - 1]) => {
                    i = match dollar_delimiter_len(bytes, i) {
                        Some(len) => skip_dollar_quoted(bytes, i, len),
                        None => i + 1,
                    };
                }
                b':' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && is_word(bytes[end]) {
                        end += 1;
                    }
                    if end == start {
                        i += 1;
                        continue;
                    }
                    let blocked_before =
                        i > 0 && (is_word(bytes[i - 1]) || matches!(bytes[i - 1], b':' | b'\\'));
                    let blocked_after = bytes.get(end) == Some(&b':');
                    if !blocked_before && !blocked_after {
                        let name = &text[start..end];
                        let slot = match parameters.iter().position(|p| p == name) {
                            Some(existing) => existing,
                            None => {
                                parameters.push(name.to_string());
                                parameters.len() - 1
                            }
                        };
                        push_unescaped(&mut sql, &text[copied..i]);
                        let _ = write!(sql, "${}", slot + 1);
                        copied = end;
                    }
                    i = end;
                }
                _ => i += 1,
            }
        }
        push_unescaped(&mut sql, &text[copied..]);

        Self {
            text: text.to_string(),
            sql,
            parameters,
        }
    }

    /// The query text as registered.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Store-native SQL with `$n` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Distinct parameter names; position `k` binds to `$k+1`.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Order the supplied values by placeholder position. Values the query
    /// does not reference are ignored.
    pub fn resolve(&self, params: &BindParams) -> Result<Vec<BindValue>, ExecutionError> {
        self.parameters
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ExecutionError::MissingParameter(name.clone()))
            })
            .collect()
    }
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Returns the index just past the closing quote. A doubled quote is an
/// escaped quote. Unterminated literals run to the end of the text.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Length of the `$tag$` delimiter opening at `start`, if one does. The tag
/// is empty or an identifier, so `$1` never opens a dollar-quoted body.
fn dollar_delimiter_len(bytes: &[u8], start: usize) -> Option<usize> {
    let mut end = start + 1;
    if bytes.get(end).is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') {
        while end < bytes.len() && is_word(bytes[end]) {
            end += 1;
        }
    }
    (bytes.get(end) == Some(&b'$')).then_some(end + 1 - start)
}

/// Returns the index just past the closing delimiter, or the end of the
/// text when the body is unterminated.
fn skip_dollar_quoted(bytes: &[u8], start: usize, len: usize) -> usize {
    let delimiter = &bytes[start..start + len];
    bytes[start + len..]
        .windows(len)
        .position(|w| w == delimiter)
        .map_or(bytes.len(), |offset| start + len + offset + len)
}

/// Copy `segment`, turning each escaped `\:name` into a literal `:name`.
/// An escape followed by a further `:` is left as written.
fn push_unescaped(sql: &mut String, segment: &str) {
    let bytes = segment.as_bytes();
    let mut copied = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] != b'\\' || bytes[i + 1] != b':' {
            i += 1;
            continue;
        }
        let mut end = i + 2;
        while end < bytes.len() && (is_word(bytes[end]) || bytes[end] == b'$') {
            end += 1;
        }
        if bytes.get(end) != Some(&b':') {
            sql.push_str(&segment[copied..i]);
            copied = i + 1;
        }
        i = end;
    }
    sql.push_str(&segment[copied..]);
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset + 1)
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| start + 2 + offset + 2)
}
