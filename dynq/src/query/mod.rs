//! Dynamic query compiler
//!
//! Turns a serializable filter/sort description into an executable predicate and
//! ordering over any record type that exposes a field registry.
//!
//! ## Usage
//!
//! ```no_run
//! use dynq::query::{QueryEngine, QueryLimits, parse_dynamic_query};
//! # use dynq::query::{FieldAccessible, FieldRegistry};
//! # struct Order;
//! # impl FieldAccessible for Order {
//! #     fn fields() -> &'static FieldRegistry<Self> { unimplemented!() }
//! # }
//! # let orders: Vec<Order> = Vec::new();
//!
//! let json = r#"{"filter": {"field": "status", "operator": "eq", "value": "paid"}}"#;
//! let query = parse_dynamic_query(json, &QueryLimits::default()).unwrap();
//! let compiled = QueryEngine::<Order>::for_type().compile(&query).unwrap();
//! let paid: Vec<Order> = compiled.sort(orders.into_iter().filter(|o| compiled.matches(o)).collect());
//! ```

mod cache;
mod engine;
mod error;
mod fields;
mod ordering;
mod parser;
mod predicate;
mod types;
mod value;

pub use cache::CompiledQueryCache;
pub use engine::{CompiledQuery, QueryEngine};
pub use error::QueryError;
pub use fields::{Accessor, FieldAccessible, FieldDescriptor, FieldRegistry, FieldRegistryBuilder};
pub use ordering::{RecordOrdering, compile_ordering};
pub use parser::{
    DEFAULT_MAX_FILTER_DEPTH, DEFAULT_MAX_QUERY_BYTES, DEFAULT_MAX_SORT_KEYS, QueryLimits,
    parse_dynamic_query, parse_filter_node,
};
pub use predicate::{Predicate, compile_filter};
pub use types::{
    Condition, Direction, DynamicQuery, FilterNode, FilterTree, Logic, MAX_FILTER_DEPTH, Operator,
    SortKey,
};
pub use value::{FieldType, FieldValue, parse_datetime};
