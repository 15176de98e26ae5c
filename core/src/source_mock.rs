use std::borrow::Cow;
use std::cell::RefCell;

use crate::error::ImportError;
use crate::source::{QuerySource, Row, Value};

#[derive(Clone, Debug, PartialEq)]
pub enum MockValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl MockValue {
    fn as_value(&self) -> Value<'_> {
        match self {
            MockValue::Null => Value::Null,
            MockValue::Integer(v) => Value::Integer(*v),
            MockValue::Real(v) => Value::Real(*v),
            MockValue::Text(text) => Value::Text(Cow::Borrowed(text)),
            MockValue::Blob(bytes) => Value::Blob(bytes),
        }
    }
}

impl From<i64> for MockValue {
    fn from(v: i64) -> Self {
        MockValue::Integer(v)
    }
}

impl From<i32> for MockValue {
    fn from(v: i32) -> Self {
        MockValue::Integer(v as i64)
    }
}

impl From<f64> for MockValue {
    fn from(v: f64) -> Self {
        MockValue::Real(v)
    }
}

impl From<&str> for MockValue {
    fn from(v: &str) -> Self {
        MockValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for MockValue {
    fn from(v: Vec<u8>) -> Self {
        MockValue::Blob(v)
    }
}

impl<T: Into<MockValue>> From<Option<T>> for MockValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(MockValue::Null)
    }
}

#[derive(Clone, Debug)]
pub enum MockReply {
    Rows(Vec<Vec<MockValue>>),
    Fail(String),
}

#[derive(Clone, Debug)]
struct MockRow<'a>(&'a [MockValue]);

impl Row for MockRow<'_> {
    fn column_count(&self) -> usize {
        self.0.len()
    }

    fn value(&self, index: usize) -> Value<'_> {
        self.0
            .get(index)
            .map(MockValue::as_value)
            .unwrap_or(Value::Null)
    }
}

/// Scripted query source. Replies are keyed by a SQL fragment; the first
/// fragment contained in an executed query answers it. Unscripted queries
/// fail like a missing table would.
#[derive(Debug, Default)]
pub struct MockSource {
    replies: Vec<(String, MockReply)>,
    executed: RefCell<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, fragment: &str, rows: Vec<Vec<MockValue>>) -> Self {
        self.replies
            .push((fragment.to_string(), MockReply::Rows(rows)));
        self
    }

    pub fn failing(mut self, fragment: &str, message: &str) -> Self {
        self.replies
            .push((fragment.to_string(), MockReply::Fail(message.to_string())));
        self
    }

    /// Every query run so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    fn reply_for(&self, sql: &str) -> Option<&MockReply> {
        self.replies
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, reply)| reply)
    }
}

impl QuerySource for MockSource {
    fn for_each_row(
        &self,
        sql: &str,
        on_row: &mut dyn FnMut(&dyn Row) -> Result<(), ImportError>,
    ) -> Result<(), ImportError> {
        self.executed.borrow_mut().push(sql.to_string());
        match self.reply_for(sql) {
            Some(MockReply::Rows(rows)) => {
                for row in rows {
                    on_row(&MockRow(row))?;
                }
                Ok(())
            }
            Some(MockReply::Fail(message)) => Err(ImportError::Engine(message.clone())),
            None => Err(ImportError::Engine(format!("no scripted reply for: {sql}"))),
        }
    }
}

/// Build a mock row from heterogeneous cells.
#[macro_export]
macro_rules! mock_row {
    ($($cell:expr),* $(,)?) => {
        vec![$($crate::source_mock::MockValue::from($cell)),*]
    };
}
