use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::Result;

/// A numeric field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Integer(v) => write!(f, "{v}i"),
        }
    }
}

/// One tagged measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: SystemTime,
}

/// Points written together in one call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    /// Target database; the writer's default applies when unset.
    pub database: Option<String>,
    pub points: Vec<Point>,
}

impl Batch {
    pub fn new(database: Option<String>) -> Self {
        Self {
            database,
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Appends batches of points to a time-series store.
#[async_trait]
pub trait TimeSeriesWriter: Send + Sync {
    async fn write(&self, batch: Batch) -> Result<()>;

    /// Database used for batches that name none.
    fn default_database(&self) -> Option<&str> {
        None
    }
}

/// Writer used when the time-series store is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWriter;

#[async_trait]
impl TimeSeriesWriter for NoopWriter {
    async fn write(&self, _batch: Batch) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::from(21.5f32).to_string(), "21.5");
        assert_eq!(FieldValue::from(3.0f64).to_string(), "3");
        assert_eq!(FieldValue::from(42u32).to_string(), "42i");
        assert_eq!(FieldValue::from(true).to_string(), "1i");
        assert_eq!(FieldValue::from(-7i32).to_string(), "-7i");
    }

    #[tokio::test]
    async fn test_noop_writer_accepts_anything() {
        let writer = NoopWriter;
        writer.write(Batch::new(None)).await.unwrap();
        assert!(writer.default_database().is_none());
    }
}
