//! Bound parameters and filter clauses.
//!
//! Every caller-influenced value in a compiled statement travels as a
//! positional `$n` parameter. [`ParamBinder`] hands out placeholders in
//! order; [`FilterClause`] carries a predicate fragment whose own values are
//! numbered `$1..$n` locally and renumbered into the statement on render.

use std::fmt;

use crate::query::CompileError;

/// A value bound to a positional parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Int(i32),
    BigInt(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Int(v) => write!(f, "{}", v),
            QueryValue::BigInt(v) => write!(f, "{}", v),
            QueryValue::Float(v) => write!(f, "{}", v),
            QueryValue::Text(v) => write!(f, "{:?}", v),
            QueryValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for QueryValue {
    fn from(v: i32) -> Self {
        QueryValue::Int(v)
    }
}

impl From<i64> for QueryValue {
    fn from(v: i64) -> Self {
        QueryValue::BigInt(v)
    }
}

impl From<f64> for QueryValue {
    fn from(v: f64) -> Self {
        QueryValue::Float(v)
    }
}

impl From<bool> for QueryValue {
    fn from(v: bool) -> Self {
        QueryValue::Bool(v)
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::Text(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::Text(v)
    }
}

/// SQL type a placeholder is cast to.
///
/// Parameters in select lists have no inferable type in PostgreSQL, so
/// every placeholder the compiler emits carries an explicit cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Double,
    Text,
}

impl SqlType {
    fn as_sql(self) -> &'static str {
        match self {
            SqlType::Integer => "integer",
            SqlType::Double => "double precision",
            SqlType::Text => "text",
        }
    }
}

/// Reference to a bound parameter, rendered as `$n::type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    index: usize,
    sql_type: SqlType,
}

impl Placeholder {
    /// One-based parameter position.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}::{}", self.index, self.sql_type.as_sql())
    }
}

/// Allocates positional parameters in binding order.
#[derive(Debug, Default)]
pub struct ParamBinder {
    values: Vec<QueryValue>,
}

impl ParamBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return the placeholder referring to it.
    pub fn bind(&mut self, value: impl Into<QueryValue>, sql_type: SqlType) -> Placeholder {
        self.values.push(value.into());
        Placeholder {
            index: self.values.len(),
            sql_type,
        }
    }

    /// Bind a filter clause's values and return its text renumbered into
    /// this statement's parameter space.
    pub fn bind_clause(&mut self, clause: &FilterClause) -> Result<String, CompileError> {
        let offset = self.values.len();
        let rendered = renumber_placeholders(&clause.sql, offset, clause.values.len())
            .map_err(|index| CompileError::FilterParameterOutOfRange {
                clause: clause.sql.clone(),
                index,
                available: clause.values.len(),
            })?;
        self.values.extend(clause.values.iter().cloned());
        Ok(rendered)
    }

    /// Number of values bound so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the binder, yielding values in parameter order.
    pub fn into_values(self) -> Vec<QueryValue> {
        self.values
    }
}

/// One predicate produced by a filters-to-predicates translator.
///
/// The SQL text is opaque to the compiler; injection safety of the text
/// itself is the translator's responsibility. Values referenced as `$1..$n`
/// inside the text are bound as parameters.
///
/// # Example
///
/// ```
/// use clusterbuster::query::FilterClause;
///
/// let plain = FilterClause::new("status = 'free'");
/// let bound = FilterClause::with_values("speed >= $1", vec![50i32.into()]);
/// assert_eq!(plain.sql(), "status = 'free'");
/// assert_eq!(bound.values().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    sql: String,
    values: Vec<QueryValue>,
}

impl FilterClause {
    /// A predicate without bound values.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: Vec::new(),
        }
    }

    /// A predicate whose `$1..$n` placeholders refer to `values`.
    pub fn with_values(sql: impl Into<String>, values: Vec<QueryValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[QueryValue] {
        &self.values
    }

    /// Stable text identifying this clause, used for cache key derivation.
    ///
    /// A clause without values is identified by its SQL text alone.
    pub fn cache_text(&self) -> String {
        if self.values.is_empty() {
            return self.sql.clone();
        }
        let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        format!("{} [{}]", self.sql, values.join(", "))
    }
}

impl From<&str> for FilterClause {
    fn from(sql: &str) -> Self {
        FilterClause::new(sql)
    }
}

impl From<String> for FilterClause {
    fn from(sql: String) -> Self {
        FilterClause::new(sql)
    }
}

/// Lexical context while scanning a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    /// Inside `'...'`; `''` is an escaped quote.
    Literal,
    /// Inside `"..."`; `""` is an escaped quote.
    QuotedIdentifier,
    /// After `--` until end of line.
    LineComment,
    /// Inside `/* ... */`.
    BlockComment,
}

/// Shift every `$n` found in plain SQL code by `offset`.
///
/// Literals, quoted identifiers and comments are copied verbatim, as is a
/// `$` that continues an identifier (`price$1`).
///
/// Returns the offending local index when it exceeds `available`.
fn renumber_placeholders(sql: &str, offset: usize, available: usize) -> Result<String, usize> {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut state = Scan::Code;
    let mut prev: Option<char> = None;

    while let Some(c) = chars.next() {
        match state {
            Scan::Literal | Scan::QuotedIdentifier => {
                // a doubled quote toggles out and straight back in
                let quote = if state == Scan::Literal { '\'' } else { '"' };
                if c == quote {
                    state = Scan::Code;
                }
                out.push(c);
                prev = Some(c);
                continue;
            }
            Scan::LineComment => {
                if c == '\n' {
                    state = Scan::Code;
                }
                out.push(c);
                prev = Some(c);
                continue;
            }
            Scan::BlockComment => {
                out.push(c);
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push('/');
                    state = Scan::Code;
                    prev = Some('/');
                } else {
                    prev = Some(c);
                }
                continue;
            }
            Scan::Code => {}
        }

        match c {
            '\'' => state = Scan::Literal,
            '"' => state = Scan::QuotedIdentifier,
            '-' if chars.peek() == Some(&'-') => state = Scan::LineComment,
            '/' if chars.peek() == Some(&'*') => state = Scan::BlockComment,
            _ => {}
        }

        let continues_identifier = prev.is_some_and(|p| p.is_alphanumeric() || p == '_' || p == '$');
        if c != '$' || continues_identifier {
            out.push(c);
            prev = Some(c);
            continue;
        }

        let mut digits = String::new();
        while let Some(&d) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }

        if digits.is_empty() {
            out.push(c);
            prev = Some(c);
            continue;
        }

        let local: usize = digits.parse().map_err(|_| usize::MAX)?;
        if local == 0 || local > available {
            return Err(local);
        }
        out.push('$');
        out.push_str(&(local + offset).to_string());
        prev = Some('0');
    }

    Ok(out)
}
