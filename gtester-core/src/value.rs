//! Generated values passed to candidate and reference functions.

use crate::error::{GTesterError, Result};
use std::fmt;

/// A generated value.
///
/// Equality is structural: composite values compare element by element, so
/// two independently built sequences with the same contents are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    Int(i64),
    Text(String),
    Seq(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    /// Name of the variant, used in type mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Text(_) => "text",
            Value::Seq(_) => "sequence",
            Value::Tuple(_) => "tuple",
        }
    }

    /// The integer, or `TypeMismatch`.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(other.mismatch("int")),
        }
    }

    /// The string, or `TypeMismatch`.
    pub fn as_text(&self) -> Result<&str> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(other.mismatch("text")),
        }
    }

    /// Elements of a sequence, or `TypeMismatch`.
    pub fn as_seq(&self) -> Result<&[Value]> {
        match self {
            Value::Seq(items) => Ok(items),
            other => Err(other.mismatch("sequence")),
        }
    }

    /// Elements of a tuple, or `TypeMismatch`.
    pub fn as_tuple(&self) -> Result<&[Value]> {
        match self {
            Value::Tuple(items) => Ok(items),
            other => Err(other.mismatch("tuple")),
        }
    }

    /// Extract a sequence of integers.
    pub fn as_ints(&self) -> Result<Vec<i64>> {
        self.as_seq()?.iter().map(Value::as_int).collect()
    }

    /// Extract a tuple of exactly two values.
    pub fn as_pair(&self) -> Result<(&Value, &Value)> {
        match self.as_tuple()? {
            [a, b] => Ok((a, b)),
            _ => Err(self.mismatch("pair")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> GTesterError {
        GTesterError::TypeMismatch {
            expected,
            found: self.to_string(),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Seq(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Render a list of values the way reports show argument lists.
pub fn render_list(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Seq(values)
    }
}

impl From<Vec<i64>> for Value {
    fn from(values: Vec<i64>) -> Self {
        Value::Seq(values.into_iter().map(Value::Int).collect())
    }
}
