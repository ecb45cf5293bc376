//! Dynamic query data model
//!
//! Wire types (`FilterNode`, `SortKey`, `DynamicQuery`) are what callers submit.
//! Keys are matched case-insensitively on the way in and written in camelCase on the
//! way out. `FilterTree` is the validated, typed form the predicate compiler walks.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::QueryError;

/// Hard cap on filter nesting, independent of configured limits
pub const MAX_FILTER_DEPTH: usize = 64;

// ============================================================================
// Wire types
// ============================================================================

/// One node of a filter tree as submitted by a caller
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterNode {
    pub field: String,
    pub operator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    pub case_sensitive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterNode>,
}

impl FilterNode {
    pub fn new(field: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            ..Default::default()
        }
    }

    /// Node with no own comparison, combining `filters` with `logic`
    pub fn group(logic: impl Into<String>, filters: Vec<FilterNode>) -> Self {
        Self {
            logic: Some(logic.into()),
            filters,
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_logic(mut self, logic: impl Into<String>) -> Self {
        self.logic = Some(logic.into());
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_filters(mut self, filters: Vec<FilterNode>) -> Self {
        self.filters = filters;
        self
    }

    /// Whether the node carries its own comparison (field and operator both set)
    pub fn has_comparison(&self) -> bool {
        !self.field.trim().is_empty() && !self.operator.trim().is_empty()
    }

    /// Nesting depth, counting this node as 1
    pub fn depth(&self) -> usize {
        1 + self.filters.iter().map(FilterNode::depth).max().unwrap_or(0)
    }
}

/// One sort key as submitted by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub dir: String,
}

impl SortKey {
    pub fn new(field: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: dir.into(),
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, "asc")
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, "desc")
    }
}

/// Filter plus ordering request; carries no reference to any record type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DynamicQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
}

impl DynamicQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    /// Canonical serialization, used as a cache key
    pub fn canonical_key(&self) -> String {
        let mut normalized = self.clone();
        if let Some(filter) = normalized.filter.as_mut() {
            normalize_node(filter);
        }
        for key in &mut normalized.sort {
            key.field = key.field.to_ascii_lowercase();
            key.dir = key.dir.trim().to_ascii_lowercase();
        }
        serde_json::to_string(&normalized).unwrap_or_default()
    }
}

fn normalize_node(node: &mut FilterNode) {
    node.field = node.field.to_ascii_lowercase();
    node.operator = node.operator.trim().to_ascii_lowercase();
    node.logic = node.logic.as_ref().map(|l| l.trim().to_ascii_lowercase());
    for child in &mut node.filters {
        normalize_node(child);
    }
}

// ============================================================================
// Case-insensitive deserialization
// ============================================================================

/// Operands are strings on the wire; numbers and booleans are accepted and stringified
#[derive(Deserialize)]
#[serde(untagged)]
enum WireScalar {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl WireScalar {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for FilterNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = FilterNode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a filter object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FilterNode, A::Error> {
                let mut node = FilterNode::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.to_ascii_lowercase().as_str() {
                        "field" => {
                            node.field = map.next_value::<Option<String>>()?.unwrap_or_default()
                        }
                        "operator" | "op" => {
                            node.operator = map.next_value::<Option<String>>()?.unwrap_or_default()
                        }
                        "value" => {
                            node.value = map
                                .next_value::<Option<WireScalar>>()?
                                .map(WireScalar::into_string)
                        }
                        "logic" => node.logic = map.next_value()?,
                        "casesensitive" => {
                            node.case_sensitive = map.next_value::<Option<bool>>()?.unwrap_or(false)
                        }
                        "filters" | "children" => {
                            node.filters = map
                                .next_value::<Option<Vec<FilterNode>>>()?
                                .unwrap_or_default()
                        }
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(node)
            }
        }

        deserializer.deserialize_map(NodeVisitor)
    }
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SortVisitor;

        impl<'de> Visitor<'de> for SortVisitor {
            type Value = SortKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a sort object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SortKey, A::Error> {
                let mut field = None;
                let mut dir = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.to_ascii_lowercase().as_str() {
                        "field" => field = Some(map.next_value::<String>()?),
                        "dir" | "direction" => dir = map.next_value::<Option<String>>()?,
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                let field = field.ok_or_else(|| de::Error::missing_field("field"))?;
                Ok(SortKey {
                    field,
                    dir: dir.unwrap_or_default(),
                })
            }
        }

        deserializer.deserialize_map(SortVisitor)
    }
}

impl<'de> Deserialize<'de> for DynamicQuery {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QueryVisitor;

        impl<'de> Visitor<'de> for QueryVisitor {
            type Value = DynamicQuery;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a dynamic query object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<DynamicQuery, A::Error> {
                let mut query = DynamicQuery::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.to_ascii_lowercase().as_str() {
                        "filter" => query.filter = map.next_value()?,
                        "sort" => {
                            query.sort = map.next_value::<Option<Vec<SortKey>>>()?.unwrap_or_default()
                        }
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(query)
            }
        }

        deserializer.deserialize_map(QueryVisitor)
    }
}

// ============================================================================
// Typed vocabulary
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    In,
    Between,
}

impl Operator {
    pub const ALL: [Operator; 13] = [
        Self::Eq,
        Self::Neq,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::IsNull,
        Self::IsNotNull,
        Self::In,
        Self::Between,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::IsNull => "isnull",
            Self::IsNotNull => "isnotnull",
            Self::In => "in",
            Self::Between => "between",
        }
    }

    /// Null checks ignore the operand; everything else needs one
    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }

    /// Substring operators apply to text fields only
    pub fn is_text_only(&self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| QueryError::UnsupportedOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How sibling filters are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    /// Parse an optional logic name, defaulting to `And`
    pub fn parse(logic: Option<&str>) -> Result<Self, QueryError> {
        match logic.map(str::trim) {
            None | Some("") => Ok(Self::And),
            Some(l) if l.eq_ignore_ascii_case("and") => Ok(Self::And),
            Some(l) if l.eq_ignore_ascii_case("or") => Ok(Self::Or),
            Some(l) => Err(QueryError::InvalidLogic(l.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(key: &SortKey) -> Result<Self, QueryError> {
        let dir = key.dir.trim();
        if dir.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(QueryError::InvalidDirection {
                field: key.field.clone(),
                direction: key.dir.clone(),
            })
        }
    }
}

// ============================================================================
// Typed filter tree
// ============================================================================

/// A single validated comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Option<String>,
    pub case_sensitive: bool,
}

/// Validated filter tree. Neutral nodes never appear in it.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterTree {
    Leaf(Condition),
    Group {
        logic: Logic,
        children: Vec<FilterTree>,
    },
    /// Own comparison AND-ed with the children combined by `logic`
    LeafWithChildren {
        condition: Condition,
        logic: Logic,
        children: Vec<FilterTree>,
    },
}

impl FilterTree {
    /// Validate a wire node. `Ok(None)` means the node is neutral (matches everything).
    pub fn from_node(node: &FilterNode) -> Result<Option<Self>, QueryError> {
        Self::from_node_at(node, 1)
    }

    fn from_node_at(node: &FilterNode, depth: usize) -> Result<Option<Self>, QueryError> {
        if depth > MAX_FILTER_DEPTH {
            return Err(QueryError::FilterTooDeep {
                max: MAX_FILTER_DEPTH,
            });
        }

        let condition = if node.has_comparison() {
            let operator: Operator = node.operator.parse()?;
            if operator.requires_value() && node.value.is_none() {
                return Err(QueryError::MissingValue {
                    field: node.field.clone(),
                    operator: node.operator.clone(),
                });
            }
            Some(Condition {
                field: node.field.trim().to_string(),
                operator,
                value: node.value.clone(),
                case_sensitive: node.case_sensitive,
            })
        } else {
            None
        };

        if node.filters.is_empty() {
            return Ok(condition.map(Self::Leaf));
        }

        let mut children = Vec::with_capacity(node.filters.len());
        for child in &node.filters {
            if let Some(tree) = Self::from_node_at(child, depth + 1)? {
                children.push(tree);
            }
        }

        // Logic is only meaningful once at least one child survives
        Ok(match (condition, children.is_empty()) {
            (None, true) => None,
            (Some(condition), true) => Some(Self::Leaf(condition)),
            (None, false) => Some(Self::Group {
                logic: Logic::parse(node.logic.as_deref())?,
                children,
            }),
            (Some(condition), false) => Some(Self::LeafWithChildren {
                condition,
                logic: Logic::parse(node.logic.as_deref())?,
                children,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(field: &str, op: Operator, value: &str) -> FilterTree {
        FilterTree::Leaf(Condition {
            field: field.to_string(),
            operator: op,
            value: Some(value.to_string()),
            case_sensitive: false,
        })
    }

    #[test]
    fn deserialize_wire_example() {
        let json = r#"{
            "filter": {
                "field": "status", "operator": "eq", "value": "active",
                "logic": "and", "caseSensitive": false,
                "filters": [ { "field": "age", "operator": "gte", "value": "18" } ]
            },
            "sort": [ { "field": "createdAt", "dir": "desc" } ]
        }"#;
        let query: DynamicQuery = serde_json::from_str(json).unwrap();
        let filter = query.filter.unwrap();
        assert_eq!(filter.field, "status");
        assert_eq!(filter.value.as_deref(), Some("active"));
        assert_eq!(filter.filters.len(), 1);
        assert_eq!(filter.filters[0].field, "age");
        assert_eq!(query.sort, vec![SortKey::desc("createdAt")]);
    }

    #[test]
    fn deserialize_keys_case_insensitively() {
        let json = r#"{
            "Filter": { "FIELD": "age", "Operator": "GTE", "Value": 18, "CaseSensitive": true,
                        "Filters": [] },
            "SORT": [ { "Field": "name", "Dir": "ASC" } ]
        }"#;
        let query: DynamicQuery = serde_json::from_str(json).unwrap();
        let filter = query.filter.unwrap();
        assert_eq!(filter.field, "age");
        assert_eq!(filter.operator, "GTE");
        assert_eq!(filter.value.as_deref(), Some("18"));
        assert!(filter.case_sensitive);
        assert_eq!(query.sort[0].dir, "ASC");
    }

    #[test]
    fn deserialize_omitted_parts() {
        let query: DynamicQuery = serde_json::from_str("{}").unwrap();
        assert!(query.filter.is_none());
        assert!(query.sort.is_empty());

        let query: DynamicQuery = serde_json::from_str(r#"{"filter": null, "sort": null}"#).unwrap();
        assert_eq!(query, DynamicQuery::default());
    }

    #[test]
    fn serialize_uses_camel_case() {
        let node = FilterNode::new("name", "contains")
            .with_value("an")
            .with_case_sensitive(true);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "field": "name", "operator": "contains", "value": "an", "caseSensitive": true
            })
        );
    }

    #[test]
    fn query_round_trips() {
        let query = DynamicQuery::new()
            .with_filter(
                FilterNode::new("age", "gte")
                    .with_value("18")
                    .with_logic("or")
                    .with_filters(vec![FilterNode::new("name", "eq").with_value("Ann")]),
            )
            .with_sort(vec![SortKey::asc("name"), SortKey::desc("age")]);
        let json = serde_json::to_string(&query).unwrap();
        let back: DynamicQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(back, query);
    }

    #[test]
    fn canonical_key_ignores_case() {
        let a = DynamicQuery::new()
            .with_filter(FilterNode::new("Age", "GTE").with_value("18"))
            .with_sort(vec![SortKey::new("Name", "ASC")]);
        let b = DynamicQuery::new()
            .with_filter(FilterNode::new("age", "gte").with_value("18"))
            .with_sort(vec![SortKey::new("name", "asc")]);
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn operator_parse_is_case_insensitive() {
        assert_eq!("StartsWith".parse::<Operator>().unwrap(), Operator::StartsWith);
        assert_eq!("IN".parse::<Operator>().unwrap(), Operator::In);
        assert_eq!(
            "like".parse::<Operator>().unwrap_err(),
            QueryError::UnsupportedOperator("like".to_string())
        );
    }

    #[test]
    fn logic_defaults_to_and() {
        assert_eq!(Logic::parse(None).unwrap(), Logic::And);
        assert_eq!(Logic::parse(Some("OR")).unwrap(), Logic::Or);
        assert_eq!(
            Logic::parse(Some("xor")).unwrap_err(),
            QueryError::InvalidLogic("xor".to_string())
        );
    }

    #[test]
    fn direction_rejects_unknown() {
        assert_eq!(Direction::parse(&SortKey::desc("a")).unwrap(), Direction::Desc);
        let err = Direction::parse(&SortKey::new("age", "up")).unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidDirection {
                field: "age".to_string(),
                direction: "up".to_string(),
            }
        );
    }

    #[test]
    fn tree_empty_root_is_neutral() {
        assert_eq!(FilterTree::from_node(&FilterNode::default()).unwrap(), None);
    }

    #[test]
    fn tree_group_without_own_comparison() {
        let node = FilterNode::group(
            "or",
            vec![
                FilterNode::new("age", "eq").with_value("1"),
                FilterNode::default(),
                FilterNode::new("age", "eq").with_value("2"),
            ],
        );
        assert_eq!(
            FilterTree::from_node(&node).unwrap(),
            Some(FilterTree::Group {
                logic: Logic::Or,
                children: vec![leaf("age", Operator::Eq, "1"), leaf("age", Operator::Eq, "2")],
            })
        );
    }

    #[test]
    fn tree_leaf_with_only_neutral_children_collapses() {
        let node = FilterNode::new("age", "eq")
            .with_value("1")
            .with_filters(vec![FilterNode::default()]);
        assert_eq!(
            FilterTree::from_node(&node).unwrap(),
            Some(leaf("age", Operator::Eq, "1"))
        );
    }

    #[test]
    fn tree_missing_value_is_rejected() {
        let err = FilterTree::from_node(&FilterNode::new("age", "gt")).unwrap_err();
        assert_eq!(
            err,
            QueryError::MissingValue {
                field: "age".to_string(),
                operator: "gt".to_string(),
            }
        );
        assert!(FilterTree::from_node(&FilterNode::new("email", "isnull")).is_ok());
    }

    #[test]
    fn tree_invalid_logic_only_checked_with_children() {
        let node = FilterNode::new("age", "eq").with_value("1").with_logic("xor");
        assert!(FilterTree::from_node(&node).is_ok());

        let node = node.with_filters(vec![FilterNode::new("age", "eq").with_value("2")]);
        assert_eq!(
            FilterTree::from_node(&node).unwrap_err(),
            QueryError::InvalidLogic("xor".to_string())
        );
    }

    #[test]
    fn tree_invalid_logic_ignored_when_children_are_neutral() {
        let node = FilterNode::new("age", "eq")
            .with_value("25")
            .with_logic("xor")
            .with_filters(vec![FilterNode::default(), FilterNode::group("and", vec![])]);
        assert_eq!(
            FilterTree::from_node(&node).unwrap(),
            Some(leaf("age", Operator::Eq, "25"))
        );

        let group = FilterNode::group("xor", vec![FilterNode::default()]);
        assert_eq!(FilterTree::from_node(&group).unwrap(), None);
    }

    #[test]
    fn tree_rejects_excessive_depth() {
        let mut node = FilterNode::new("age", "eq").with_value("1");
        for _ in 0..MAX_FILTER_DEPTH {
            node = FilterNode::group("and", vec![node]);
        }
        assert_eq!(node.depth(), MAX_FILTER_DEPTH + 1);
        assert_eq!(
            FilterTree::from_node(&node).unwrap_err(),
            QueryError::FilterTooDeep {
                max: MAX_FILTER_DEPTH
            }
        );
    }
}
