//! Query compilation errors
//!
//! Every variant is a caller-input fault raised once per compile, never per record.
//! Messages name the offending field, operator or value so the request can be fixed.

use thiserror::Error;

use super::value::FieldType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Field name does not resolve on the record type
    #[error("Field '{field}' not found on type {record}")]
    FieldNotFound { field: String, record: String },

    /// Operator outside the supported vocabulary
    #[error("Operator '{0}' is not supported")]
    UnsupportedOperator(String),

    /// Operator known but not applicable to the field's type
    #[error("Operator '{operator}' cannot be applied to {field_type} field '{field}'")]
    IncompatibleOperator {
        field: String,
        operator: String,
        field_type: FieldType,
    },

    /// Sort direction outside asc/desc
    #[error("Invalid sort direction '{direction}' for field '{field}'. Must be 'asc' or 'desc'")]
    InvalidDirection { field: String, direction: String },

    /// Operand cannot be converted to the field's type
    #[error("Value '{value}' for field '{field}' cannot be converted to {expected}")]
    ValueCoercion {
        field: String,
        value: String,
        expected: FieldType,
    },

    /// Operand has the wrong shape for the operator
    #[error("Operator '{operator}' on field '{field}' {reason}, got '{value}'")]
    MalformedOperand {
        field: String,
        operator: String,
        value: String,
        reason: &'static str,
    },

    /// Operator requires a value and none was given
    #[error("Operator '{operator}' on field '{field}' requires a value")]
    MissingValue { field: String, operator: String },

    /// Group logic outside and/or
    #[error("Invalid logic '{0}'. Must be 'and' or 'or'")]
    InvalidLogic(String),

    /// Filter tree nesting exceeds the configured maximum
    #[error("Filter nesting exceeds maximum depth of {max}")]
    FilterTooDeep { max: usize },

    /// More sort keys than the configured maximum
    #[error("Maximum {max} sort keys allowed, got {count}")]
    TooManySortKeys { max: usize, count: usize },

    /// Serialized query exceeds the configured size
    #[error("Query JSON exceeds maximum size of {max} bytes")]
    QueryTooLarge { max: usize },

    /// Serialized query is not valid JSON for a dynamic query
    #[error("Invalid query JSON: {0}")]
    InvalidJson(String),

    /// Page index or size out of range
    #[error("Invalid page request: {0}")]
    InvalidPage(String),
}

impl QueryError {
    pub fn field_not_found(field: impl Into<String>, record: impl Into<String>) -> Self {
        Self::FieldNotFound {
            field: field.into(),
            record: record.into(),
        }
    }

    pub fn value_coercion(field: &str, value: &str, expected: FieldType) -> Self {
        Self::ValueCoercion {
            field: field.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    /// Stable machine-readable code for boundary layers
    pub fn code(&self) -> &'static str {
        match self {
            Self::FieldNotFound { .. } => "FIELD_NOT_FOUND",
            Self::UnsupportedOperator(_) => "UNSUPPORTED_OPERATOR",
            Self::IncompatibleOperator { .. } => "INCOMPATIBLE_OPERATOR",
            Self::InvalidDirection { .. } => "INVALID_DIRECTION",
            Self::ValueCoercion { .. } => "INVALID_VALUE",
            Self::MalformedOperand { .. } => "MALFORMED_OPERAND",
            Self::MissingValue { .. } => "MISSING_VALUE",
            Self::InvalidLogic(_) => "INVALID_LOGIC",
            Self::FilterTooDeep { .. } => "FILTER_TOO_DEEP",
            Self::TooManySortKeys { .. } => "TOO_MANY_SORT_KEYS",
            Self::QueryTooLarge { .. } => "QUERY_JSON_TOO_LARGE",
            Self::InvalidJson(_) => "INVALID_QUERY_JSON",
            Self::InvalidPage(_) => "INVALID_PAGE",
        }
    }

    /// All compile errors are caller-input faults
    pub fn is_bad_request(&self) -> bool {
        true
    }
}
