//! Parameter style translation.
//!
//! Applications write placeholders in one of five dialects; the transport
//! accepts exactly one canonical form: numbered positional placeholders
//! `$1..$N` assigned in textual occurrence order. Each occurrence gets a
//! fresh number, so the ordered value sequence matches placeholders 1:1 and
//! a name or index used twice in the source yields its value twice.
//!
//! The scan is quoting-aware: placeholder-like tokens inside single-quoted
//! strings, double-quoted identifiers, dollar-quoted bodies, line comments
//! and block comments are copied through untouched, and `::` casts are never
//! read as a numeric or named placeholder.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use crate::error::TranslationError;
use crate::value::SqlValue;

/// One of the five supported placeholder dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    /// `?`, matched positionally.
    Qmark,
    /// `:1`, 1-based indexes into an ordered sequence; indexes may repeat.
    Numeric,
    /// `:name`, looked up in a mapping.
    Named,
    /// `%s`, matched positionally (`%%` escapes a literal `%`).
    Format,
    /// `%(name)s`, looked up in a mapping (`%%` escapes a literal `%`).
    Pyformat,
}

impl fmt::Display for ParamStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamStyle::Qmark => "qmark",
            ParamStyle::Numeric => "numeric",
            ParamStyle::Named => "named",
            ParamStyle::Format => "format",
            ParamStyle::Pyformat => "pyformat",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ParamStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qmark" => Ok(ParamStyle::Qmark),
            "numeric" => Ok(ParamStyle::Numeric),
            "named" => Ok(ParamStyle::Named),
            "format" => Ok(ParamStyle::Format),
            "pyformat" => Ok(ParamStyle::Pyformat),
            other => Err(format!("unknown paramstyle `{other}`")),
        }
    }
}

/// Process-wide default style, read by `execute` at call time.
static DEFAULT_PARAMSTYLE: RwLock<ParamStyle> = RwLock::new(ParamStyle::Format);

/// The current process-wide default parameter style.
pub fn default_paramstyle() -> ParamStyle {
    *DEFAULT_PARAMSTYLE.read()
}

/// Switch the process-wide default parameter style.
///
/// Takes effect for statements executed after the switch; a cursor already
/// holding buffered results is unaffected.
pub fn set_default_paramstyle(style: ParamStyle) {
    *DEFAULT_PARAMSTYLE.write() = style;
}

// ============================================================================
// Parameter sets
// ============================================================================

/// Parameters for one execution: an ordered sequence for the positional
/// styles, a mapping for the named ones.
#[derive(Debug, Clone, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<SqlValue>),
    Named(HashMap<String, SqlValue>),
}

impl Params {
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn sequence(&self, style: ParamStyle) -> Result<&[SqlValue], TranslationError> {
        match self {
            Params::None => Ok(&[]),
            Params::Positional(seq) => Ok(seq),
            Params::Named(_) => Err(TranslationError::ExpectedSequence(style)),
        }
    }

    fn lookup(&self, name: &str, style: ParamStyle) -> Result<&SqlValue, TranslationError> {
        match self {
            Params::Named(map) => map
                .get(name)
                .ok_or_else(|| TranslationError::MissingParameter(name.to_string())),
            Params::None => Err(TranslationError::MissingParameter(name.to_string())),
            Params::Positional(_) => Err(TranslationError::ExpectedMapping(style)),
        }
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

impl From<Vec<SqlValue>> for Params {
    fn from(values: Vec<SqlValue>) -> Self {
        Params::Positional(values)
    }
}

impl From<&[SqlValue]> for Params {
    fn from(values: &[SqlValue]) -> Self {
        Params::Positional(values.to_vec())
    }
}

impl<const N: usize> From<[SqlValue; N]> for Params {
    fn from(values: [SqlValue; N]) -> Self {
        Params::Positional(values.into())
    }
}

impl From<HashMap<String, SqlValue>> for Params {
    fn from(map: HashMap<String, SqlValue>) -> Self {
        Params::Named(map)
    }
}

// ============================================================================
// Translator
// ============================================================================

/// Rewrite `sql` from the given style into canonical form, returning the
/// rewritten text and the value sequence matched 1:1 with its placeholders.
///
/// Pure function: reads nothing but its arguments, touches no driver state.
pub fn translate(
    sql: &str,
    params: &Params,
    style: ParamStyle,
) -> Result<(String, Vec<SqlValue>), TranslationError> {
    let b = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut values: Vec<SqlValue> = Vec::new();
    // Next unconsumed value for the purely positional styles.
    let mut taken = 0usize;
    // Start of the pending literal run; flushed before each placeholder.
    let mut lit = 0usize;
    let mut i = 0usize;

    while i < b.len() {
        match b[i] {
            b'\'' => i = skip_single_quoted(b, i),
            b'"' => i = skip_double_quoted(b, i),
            b'-' if b.get(i + 1) == Some(&b'-') => i = skip_line_comment(b, i),
            b'/' if b.get(i + 1) == Some(&b'*') => i = skip_block_comment(b, i),
            b'$' => i = skip_dollar_quoted(b, i),

            b'?' if style == ParamStyle::Qmark => {
                out.push_str(&sql[lit..i]);
                let seq = params.sequence(style)?;
                let value = seq
                    .get(taken)
                    .cloned()
                    .ok_or(TranslationError::TooFewParameters { supplied: seq.len() })?;
                taken += 1;
                push_placeholder(&mut out, &mut values, value);
                i += 1;
                lit = i;
            }

            b':' if matches!(style, ParamStyle::Numeric | ParamStyle::Named) => {
                // `::` is cast syntax, never a placeholder.
                if b.get(i + 1) == Some(&b':') {
                    i += 2;
                    continue;
                }
                let start = i + 1;
                let end = match style {
                    ParamStyle::Numeric => scan_digits(b, start),
                    _ => scan_identifier(b, start),
                };
                if end == start {
                    // Bare colon (array slice, cast fragment); copy through.
                    i += 1;
                    continue;
                }
                out.push_str(&sql[lit..i]);
                let token = &sql[start..end];
                let value = match style {
                    ParamStyle::Numeric => {
                        let seq = params.sequence(style)?;
                        let index: usize = token
                            .parse()
                            .map_err(|_| TranslationError::Malformed(format!(":{token}")))?;
                        if index == 0 || index > seq.len() {
                            return Err(TranslationError::IndexOutOfRange {
                                index,
                                supplied: seq.len(),
                            });
                        }
                        seq[index - 1].clone()
                    }
                    _ => params.lookup(token, style)?.clone(),
                };
                push_placeholder(&mut out, &mut values, value);
                i = end;
                lit = i;
            }

            b'%' if matches!(style, ParamStyle::Format | ParamStyle::Pyformat) => {
                match b.get(i + 1) {
                    Some(b'%') => {
                        // Escaped literal percent.
                        out.push_str(&sql[lit..i]);
                        out.push('%');
                        i += 2;
                        lit = i;
                    }
                    Some(b's') if style == ParamStyle::Format => {
                        out.push_str(&sql[lit..i]);
                        let seq = params.sequence(style)?;
                        let value = seq.get(taken).cloned().ok_or(
                            TranslationError::TooFewParameters { supplied: seq.len() },
                        )?;
                        taken += 1;
                        push_placeholder(&mut out, &mut values, value);
                        i += 2;
                        lit = i;
                    }
                    Some(b'(') if style == ParamStyle::Pyformat => {
                        let close = find_byte(b, i + 2, b')')
                            .ok_or_else(|| TranslationError::Malformed(snippet(sql, i)))?;
                        if b.get(close + 1) != Some(&b's') {
                            return Err(TranslationError::Malformed(snippet(sql, i)));
                        }
                        out.push_str(&sql[lit..i]);
                        let name = &sql[i + 2..close];
                        let value = params.lookup(name, style)?.clone();
                        push_placeholder(&mut out, &mut values, value);
                        i = close + 2;
                        lit = i;
                    }
                    _ => return Err(TranslationError::Malformed(snippet(sql, i))),
                }
            }

            _ => i += 1,
        }
    }
    out.push_str(&sql[lit..]);

    // Purely positional styles must consume every supplied value.
    if matches!(style, ParamStyle::Qmark | ParamStyle::Format) {
        let supplied = params.sequence(style)?.len();
        if taken != supplied {
            return Err(TranslationError::UnusedParameters {
                used: taken,
                supplied,
            });
        }
    }

    Ok((out, values))
}

fn push_placeholder(out: &mut String, values: &mut Vec<SqlValue>, value: SqlValue) {
    values.push(value);
    out.push('$');
    out.push_str(&values.len().to_string());
}

fn snippet(sql: &str, at: usize) -> String {
    let end = sql
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| i >= at + 12)
        .unwrap_or(sql.len());
    sql[at..end].to_string()
}

// ============================================================================
// Quoting-aware skips
// ============================================================================
//
// Each helper is entered with `i` on the opening byte and returns the index
// of the first byte after the construct. Unterminated constructs swallow
// the rest of the statement, matching how the backend would read it.

fn skip_single_quoted(b: &[u8], i: usize) -> usize {
    skip_quoted(b, i, b'\'')
}

fn skip_double_quoted(b: &[u8], i: usize) -> usize {
    skip_quoted(b, i, b'"')
}

fn skip_quoted(b: &[u8], i: usize, quote: u8) -> usize {
    let mut j = i + 1;
    while j < b.len() {
        if b[j] == quote {
            // Doubled quote is an escape, not a terminator.
            if b.get(j + 1) == Some(&quote) {
                j += 2;
            } else {
                return j + 1;
            }
        } else {
            j += 1;
        }
    }
    b.len()
}

fn skip_line_comment(b: &[u8], i: usize) -> usize {
    let mut j = i + 2;
    while j < b.len() && b[j] != b'\n' {
        j += 1;
    }
    j
}

fn skip_block_comment(b: &[u8], i: usize) -> usize {
    // Block comments nest.
    let mut depth = 1usize;
    let mut j = i + 2;
    while j < b.len() {
        if b[j] == b'/' && b.get(j + 1) == Some(&b'*') {
            depth += 1;
            j += 2;
        } else if b[j] == b'*' && b.get(j + 1) == Some(&b'/') {
            depth -= 1;
            j += 2;
            if depth == 0 {
                return j;
            }
        } else {
            j += 1;
        }
    }
    b.len()
}

fn skip_dollar_quoted(b: &[u8], i: usize) -> usize {
    // A dollar quote opens with `$tag$` where the tag may be empty.
    let mut j = i + 1;
    while j < b.len() && (b[j].is_ascii_alphanumeric() || b[j] == b'_') {
        j += 1;
    }
    if j >= b.len() || b[j] != b'$' {
        // Not a dollar quote; the `$` is an ordinary character.
        return i + 1;
    }
    let tag = &b[i..=j];
    let mut k = j + 1;
    while k + tag.len() <= b.len() {
        if &b[k..k + tag.len()] == tag {
            return k + tag.len();
        }
        k += 1;
    }
    b.len()
}

fn scan_digits(b: &[u8], start: usize) -> usize {
    let mut j = start;
    while j < b.len() && b[j].is_ascii_digit() {
        j += 1;
    }
    j
}

fn scan_identifier(b: &[u8], start: usize) -> usize {
    if start >= b.len() || !(b[start].is_ascii_alphabetic() || b[start] == b'_') {
        return start;
    }
    let mut j = start + 1;
    while j < b.len() && (b[j].is_ascii_alphanumeric() || b[j] == b'_') {
        j += 1;
    }
    j
}

fn find_byte(b: &[u8], start: usize, needle: u8) -> Option<usize> {
    (start..b.len()).find(|&j| b[j] == needle)
}
