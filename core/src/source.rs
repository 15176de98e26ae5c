//! The query engine seam.
//!
//! Drivers never talk to a database directly. They hand SQL to a
//! [`QuerySource`] and read each result row through the [`Row`] accessor,
//! column by position.

use std::borrow::Cow;

use crate::decode::{leading_float, leading_int};
use crate::error::ImportError;

/// One cell of a result row. Text that is not valid UTF-8 arrives
/// lossily converted.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Integer(i64),
    Real(f64),
    Text(Cow<'a, str>),
    Blob(&'a [u8]),
}

impl<'a> Value<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer reading of the cell. Text is read like `atoi`: its leading
    /// integer, or 0 when there is none.
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Null | Value::Blob(_) => 0,
            Value::Integer(v) => *v,
            Value::Real(v) => *v as i64,
            Value::Text(text) => leading_int(text),
        }
    }

    /// Floating point reading of the cell, `strtod` style for text.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Null | Value::Blob(_) => 0.0,
            Value::Integer(v) => *v as f64,
            Value::Real(v) => *v,
            Value::Text(text) => leading_float(text),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text.as_ref()),
            _ => None,
        }
    }

    /// Raw bytes of a blob cell, or of a text cell read without conversion.
    pub fn into_bytes(self) -> Option<&'a [u8]> {
        match self {
            Value::Blob(bytes) => Some(bytes),
            Value::Text(Cow::Borrowed(text)) => Some(text.as_bytes()),
            _ => None,
        }
    }
}

/// Positional access to the current row of a query.
pub trait Row {
    fn column_count(&self) -> usize;

    /// Cell at `index`; out-of-range columns read as NULL.
    fn value(&self, index: usize) -> Value<'_>;

    fn is_null(&self, index: usize) -> bool {
        self.value(index).is_null()
    }

    fn int(&self, index: usize) -> i64 {
        self.value(index).as_i64()
    }

    fn real(&self, index: usize) -> f64 {
        self.value(index).as_f64()
    }

    /// Cell as owned text. Numbers are rendered, NULL and blobs are `None`.
    fn text(&self, index: usize) -> Option<String> {
        match self.value(index) {
            Value::Text(text) => Some(text.into_owned()),
            Value::Integer(v) => Some(v.to_string()),
            Value::Real(v) => Some(v.to_string()),
            Value::Null | Value::Blob(_) => None,
        }
    }

    /// Cell as trimmed text, `None` when empty.
    fn non_empty_text(&self, index: usize) -> Option<String> {
        self.text(index)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }

    fn blob(&self, index: usize) -> Option<&[u8]> {
        self.value(index).into_bytes()
    }
}

/// Something that can run a query and feed every result row to a
/// callback. The first error, from the engine or the callback, stops the
/// iteration and is returned.
pub trait QuerySource {
    fn for_each_row(
        &self,
        sql: &str,
        on_row: &mut dyn FnMut(&dyn Row) -> Result<(), ImportError>,
    ) -> Result<(), ImportError>;
}

impl<T: QuerySource + ?Sized> QuerySource for &T {
    fn for_each_row(
        &self,
        sql: &str,
        on_row: &mut dyn FnMut(&dyn Row) -> Result<(), ImportError>,
    ) -> Result<(), ImportError> {
        (**self).for_each_row(sql, on_row)
    }
}
