//! Dynamic query parsing
//!
//! Parses JSON query payloads into a `DynamicQuery`, enforcing size and shape limits
//! before anything is compiled.

use serde::{Deserialize, Serialize};

use super::error::QueryError;
use super::types::{DynamicQuery, FilterNode, MAX_FILTER_DEPTH};

/// Default maximum size of query JSON in bytes (64KB)
pub const DEFAULT_MAX_QUERY_BYTES: usize = 64 * 1024;

/// Default maximum filter nesting
pub const DEFAULT_MAX_FILTER_DEPTH: usize = 16;

/// Default maximum number of sort keys
pub const DEFAULT_MAX_SORT_KEYS: usize = 8;

/// Shape limits applied to submitted queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    pub max_query_bytes: usize,
    pub max_filter_depth: usize,
    pub max_sort_keys: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_query_bytes: DEFAULT_MAX_QUERY_BYTES,
            max_filter_depth: DEFAULT_MAX_FILTER_DEPTH,
            max_sort_keys: DEFAULT_MAX_SORT_KEYS,
        }
    }
}

impl QueryLimits {
    /// Check an already deserialized query against the depth and sort-key limits
    pub fn check(&self, query: &DynamicQuery) -> Result<(), QueryError> {
        let max_depth = self.max_filter_depth.min(MAX_FILTER_DEPTH);
        let depth = query.filter.as_ref().map_or(0, |f| f.depth());
        if depth > max_depth {
            return Err(QueryError::FilterTooDeep { max: max_depth });
        }

        if query.sort.len() > self.max_sort_keys {
            return Err(QueryError::TooManySortKeys {
                max: self.max_sort_keys,
                count: query.sort.len(),
            });
        }

        Ok(())
    }
}

/// Parse a dynamic query from JSON
///
/// Validates JSON size, parses into a `DynamicQuery` and checks depth and sort limits.
pub fn parse_dynamic_query(json_str: &str, limits: &QueryLimits) -> Result<DynamicQuery, QueryError> {
    check_size(json_str, limits)?;

    let query: DynamicQuery =
        serde_json::from_str(json_str).map_err(|e| QueryError::InvalidJson(e.to_string()))?;

    limits.check(&query)?;

    tracing::trace!(
        has_filter = query.filter.is_some(),
        sort_keys = query.sort.len(),
        "Dynamic query parsed"
    );

    Ok(query)
}

/// Parse a single filter node from JSON, under the same size and depth limits
pub fn parse_filter_node(json_str: &str, limits: &QueryLimits) -> Result<FilterNode, QueryError> {
    check_size(json_str, limits)?;

    let node: FilterNode =
        serde_json::from_str(json_str).map_err(|e| QueryError::InvalidJson(e.to_string()))?;

    let max_depth = limits.max_filter_depth.min(MAX_FILTER_DEPTH);
    if node.depth() > max_depth {
        return Err(QueryError::FilterTooDeep { max: max_depth });
    }

    Ok(node)
}

fn check_size(json_str: &str, limits: &QueryLimits) -> Result<(), QueryError> {
    if json_str.len() > limits.max_query_bytes {
        return Err(QueryError::QueryTooLarge {
            max: limits.max_query_bytes,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::SortKey;

    #[test]
    fn parse_valid_query() {
        let json = r#"{
            "filter": {"field": "age", "operator": "gte", "value": "18"},
            "sort": [{"field": "name", "dir": "asc"}]
        }"#;
        let query = parse_dynamic_query(json, &QueryLimits::default()).unwrap();
        assert_eq!(query.filter.unwrap().field, "age");
        assert_eq!(query.sort, vec![SortKey::asc("name")]);
    }

    #[test]
    fn parse_empty_object() {
        let query = parse_dynamic_query("{}", &QueryLimits::default()).unwrap();
        assert_eq!(query, DynamicQuery::default());
    }

    #[test]
    fn parse_invalid_json() {
        let err = parse_dynamic_query("not valid json", &QueryLimits::default()).unwrap_err();
        assert_eq!(err.code(), "INVALID_QUERY_JSON");
    }

    #[test]
    fn parse_rejects_oversized_payload() {
        let limits = QueryLimits {
            max_query_bytes: 16,
            ..Default::default()
        };
        let err = parse_dynamic_query(r#"{"sort": [], "filter": null}"#, &limits).unwrap_err();
        assert_eq!(err, QueryError::QueryTooLarge { max: 16 });
    }

    #[test]
    fn parse_rejects_too_many_sort_keys() {
        let limits = QueryLimits {
            max_sort_keys: 1,
            ..Default::default()
        };
        let json = r#"{"sort": [{"field": "a", "dir": "asc"}, {"field": "b", "dir": "asc"}]}"#;
        let err = parse_dynamic_query(json, &limits).unwrap_err();
        assert_eq!(err, QueryError::TooManySortKeys { max: 1, count: 2 });
    }

    #[test]
    fn check_rejects_deep_filters() {
        let limits = QueryLimits {
            max_filter_depth: 2,
            ..Default::default()
        };
        let shallow = DynamicQuery::new().with_filter(FilterNode::group(
            "and",
            vec![FilterNode::new("a", "eq").with_value("1")],
        ));
        assert!(limits.check(&shallow).is_ok());

        let deep = DynamicQuery::new().with_filter(FilterNode::group(
            "and",
            vec![FilterNode::group(
                "or",
                vec![FilterNode::new("a", "eq").with_value("1")],
            )],
        ));
        assert_eq!(
            limits.check(&deep).unwrap_err(),
            QueryError::FilterTooDeep { max: 2 }
        );
    }

    #[test]
    fn parse_filter_node_rejects_trailing_keys() {
        let limits = QueryLimits::default();
        let node = parse_filter_node(r#"{"field": "age", "operator": "gt", "value": "18"}"#, &limits)
            .unwrap();
        assert_eq!(node, FilterNode::new("age", "gt").with_value("18"));

        let injected = r#"{"field": "age", "operator": "gt", "value": "18"}, "sort": [{"field": "id"}]"#;
        assert_eq!(
            parse_filter_node(injected, &limits).unwrap_err().code(),
            "INVALID_QUERY_JSON"
        );
    }

    #[test]
    fn parse_filter_node_applies_limits() {
        let limits = QueryLimits {
            max_query_bytes: 8,
            max_filter_depth: 1,
            ..Default::default()
        };
        assert_eq!(
            parse_filter_node(r#"{"field": "a"}"#, &limits).unwrap_err(),
            QueryError::QueryTooLarge { max: 8 }
        );

        let limits = QueryLimits {
            max_filter_depth: 1,
            ..Default::default()
        };
        let nested = r#"{"logic": "and", "filters": [{"field": "a", "operator": "eq", "value": "1"}]}"#;
        assert_eq!(
            parse_filter_node(nested, &limits).unwrap_err(),
            QueryError::FilterTooDeep { max: 1 }
        );
    }
}
