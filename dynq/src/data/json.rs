//! JSON records
//!
//! Runtime-schema records read from a JSON array of objects. Field types are inferred
//! from the data and may be overridden by name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::traits::{AsyncDataSource, DataSource, Include};
use crate::query::{FieldRegistry, FieldType, FieldValue};

/// Record name used in error messages for JSON data
pub const JSON_RECORD_NAME: &str = "record";

/// One JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonRecord(Map<String, Value>);

impl JsonRecord {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Read `key` as a value of `field_type`. Missing keys and unconvertible values read as null.
    pub fn read(&self, key: &str, field_type: FieldType) -> FieldValue {
        match (self.0.get(key), field_type) {
            (None | Some(Value::Null), _) => FieldValue::Null,
            (Some(Value::String(s)), _) => FieldValue::parse(s, field_type).unwrap_or(FieldValue::Null),
            (Some(Value::Bool(b)), FieldType::Bool) => FieldValue::Bool(*b),
            (Some(Value::Number(n)), FieldType::Int) => {
                n.as_i64().map_or(FieldValue::Null, FieldValue::Int)
            }
            (Some(Value::Number(n)), FieldType::Float) => {
                n.as_f64().map_or(FieldValue::Null, FieldValue::Float)
            }
            (Some(other), FieldType::Text) => FieldValue::Text(other.to_string()),
            _ => FieldValue::Null,
        }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for JsonRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ============================================================================
// Schema inference
// ============================================================================

fn infer_value_type(value: &Value) -> Option<FieldType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(FieldType::Bool),
        Value::Number(n) if n.is_i64() => Some(FieldType::Int),
        Value::Number(_) => Some(FieldType::Float),
        Value::String(s) => Some(infer_string_type(s)),
        Value::Array(_) | Value::Object(_) => Some(FieldType::Text),
    }
}

fn infer_string_type(s: &str) -> FieldType {
    if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
        FieldType::Date
    } else if DateTime::parse_from_rfc3339(s).is_ok() {
        FieldType::DateTime
    } else if Uuid::parse_str(s).is_ok() {
        FieldType::Uuid
    } else {
        FieldType::Text
    }
}

/// Smallest type able to hold values of both `a` and `b`
fn widen(a: FieldType, b: FieldType) -> FieldType {
    match (a, b) {
        (a, b) if a == b => a,
        (FieldType::Int, FieldType::Float) | (FieldType::Float, FieldType::Int) => FieldType::Float,
        (FieldType::Date, FieldType::DateTime) | (FieldType::DateTime, FieldType::Date) => {
            FieldType::DateTime
        }
        _ => FieldType::Text,
    }
}

/// Inferred field list in first-seen key order
pub fn infer_schema(records: &[JsonRecord]) -> Vec<(String, FieldType)> {
    let mut fields: Vec<(String, Option<FieldType>)> = Vec::new();

    for record in records {
        for (key, value) in &record.0 {
            let observed = infer_value_type(value);
            match fields.iter_mut().find(|(k, _)| k == key) {
                Some((_, current)) => {
                    *current = match (*current, observed) {
                        (Some(a), Some(b)) => Some(widen(a, b)),
                        (a, b) => a.or(b),
                    };
                }
                None => fields.push((key.clone(), observed)),
            }
        }
    }

    fields
        .into_iter()
        .map(|(key, ty)| (key, ty.unwrap_or(FieldType::Text)))
        .collect()
}

/// Build a registry from inferred types, applying case-insensitive name overrides
pub fn infer_registry(
    records: &[JsonRecord],
    overrides: &HashMap<String, FieldType>,
) -> FieldRegistry<JsonRecord> {
    let mut schema = infer_schema(records);

    for (name, ty) in overrides {
        match schema.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((key, current)) => {
                tracing::debug!(field = %key, inferred = %current, configured = %ty, "Schema override");
                *current = *ty;
            }
            None => {
                tracing::warn!(field = %name, "Schema override for a field not present in the data");
            }
        }
    }

    schema
        .into_iter()
        .fold(
            FieldRegistry::builder().record_name(JSON_RECORD_NAME),
            |builder, (key, ty)| {
                let name = key.clone();
                builder.field(name, ty, move |r: &JsonRecord| r.read(&key, ty))
            },
        )
        .build()
}

// ============================================================================
// File source
// ============================================================================

#[derive(Error, Debug)]
pub enum JsonSourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Data source reading a JSON array of objects from a file on every fetch
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, content: &[u8]) -> Result<Vec<JsonRecord>, JsonSourceError> {
        serde_json::from_slice(content).map_err(|source| JsonSourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn io_error(&self, source: std::io::Error) -> JsonSourceError {
        JsonSourceError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn read_all(&self) -> Result<Vec<JsonRecord>, JsonSourceError> {
        let content = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        self.parse(&content)
    }
}

impl DataSource<JsonRecord> for JsonFileSource {
    type Error = JsonSourceError;

    fn load(&self, _include: &Include) -> Result<Vec<JsonRecord>, Self::Error> {
        tracing::debug!(path = %self.path.display(), "Loading JSON records");
        let content = std::fs::read(&self.path).map_err(|e| self.io_error(e))?;
        self.parse(&content)
    }
}

impl AsyncDataSource<JsonRecord> for JsonFileSource {
    type Error = JsonSourceError;

    fn rows<'a>(
        &'a self,
        _include: &'a Include,
    ) -> BoxStream<'a, Result<JsonRecord, Self::Error>> {
        tracing::debug!(path = %self.path.display(), "Streaming JSON records");
        stream::once(self.read_all())
            .flat_map(|result| match result {
                Ok(records) => stream::iter(records.into_iter().map(Ok)).left_stream(),
                Err(e) => stream::iter(std::iter::once(Err(e))).right_stream(),
            })
            .boxed()
    }
}
