//! Field descriptor tables
//!
//! A record type participates in dynamic queries by exposing a `FieldRegistry`:
//! a table of named, typed accessors built once at startup. Lookups are
//! case-insensitive and are the single place where unknown fields are rejected.
//!
//! ```
//! use std::sync::LazyLock;
//! use dynq::query::{FieldAccessible, FieldRegistry, FieldType};
//!
//! struct Person {
//!     name: String,
//!     age: i64,
//! }
//!
//! impl FieldAccessible for Person {
//!     fn fields() -> &'static FieldRegistry<Self> {
//!         static FIELDS: LazyLock<FieldRegistry<Person>> = LazyLock::new(|| {
//!             FieldRegistry::builder()
//!                 .field("name", FieldType::Text, |p: &Person| p.name.clone().into())
//!                 .field("age", FieldType::Int, |p: &Person| p.age.into())
//!                 .build()
//!         });
//!         &FIELDS
//!     }
//! }
//!
//! assert!(Person::fields().resolve("NAME").is_ok());
//! ```

use std::fmt;
use std::sync::Arc;

use super::error::QueryError;
use super::value::{FieldType, FieldValue};

/// Shared accessor reading one attribute from a record
pub type Accessor<T> = Arc<dyn Fn(&T) -> FieldValue + Send + Sync>;

/// Capability implemented by record types that can be queried by field name
pub trait FieldAccessible: Sized + 'static {
    fn fields() -> &'static FieldRegistry<Self>;
}

/// One named, typed attribute of a record type
pub struct FieldDescriptor<T> {
    name: String,
    field_type: FieldType,
    accessor: Accessor<T>,
}

impl<T> FieldDescriptor<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn read(&self, record: &T) -> FieldValue {
        (self.accessor)(record)
    }

    pub(crate) fn accessor(&self) -> Accessor<T> {
        Arc::clone(&self.accessor)
    }
}

impl<T> Clone for FieldDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            field_type: self.field_type,
            accessor: Arc::clone(&self.accessor),
        }
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .finish_non_exhaustive()
    }
}

/// Descriptor table for one record type
pub struct FieldRegistry<T> {
    record: String,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> FieldRegistry<T> {
    /// Start a registry named after the record type
    pub fn builder() -> FieldRegistryBuilder<T> {
        FieldRegistryBuilder {
            record: short_type_name::<T>().to_string(),
            fields: Vec::new(),
        }
    }

    pub fn record_name(&self) -> &str {
        &self.record
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Case-insensitive lookup failing with `FieldNotFound`
    pub fn resolve(&self, name: &str) -> Result<&FieldDescriptor<T>, QueryError> {
        self.get(name)
            .ok_or_else(|| QueryError::field_not_found(name, &self.record))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor<T>> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T> Clone for FieldRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            record: self.record.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl<T> fmt::Debug for FieldRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("record", &self.record)
            .field("fields", &self.fields)
            .finish()
    }
}

pub struct FieldRegistryBuilder<T> {
    record: String,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> FieldRegistryBuilder<T> {
    /// Override the record name used in error messages
    pub fn record_name(mut self, name: impl Into<String>) -> Self {
        self.record = name.into();
        self
    }

    /// Register a field. A name equal (ignoring case) to an earlier one replaces it.
    pub fn field<F>(mut self, name: impl Into<String>, field_type: FieldType, accessor: F) -> Self
    where
        F: Fn(&T) -> FieldValue + Send + Sync + 'static,
    {
        let descriptor = FieldDescriptor {
            name: name.into(),
            field_type,
            accessor: Arc::new(accessor),
        };
        if let Some(existing) = self
            .fields
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(&descriptor.name))
        {
            tracing::warn!(
                record = %self.record,
                field = %descriptor.name,
                "Field registered twice, keeping the last definition"
            );
            *existing = descriptor;
        } else {
            self.fields.push(descriptor);
        }
        self
    }

    pub fn build(self) -> FieldRegistry<T> {
        tracing::trace!(record = %self.record, fields = self.fields.len(), "Field registry built");
        FieldRegistry {
            record: self.record,
            fields: self.fields,
        }
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
