//! Predicate compiler
//!
//! Turns a `FilterNode` into a `Predicate<T>`. Field resolution and operand coercion
//! happen here, once; evaluating the predicate against a record cannot fail.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::error::QueryError;
use super::fields::{Accessor, FieldAccessible, FieldRegistry};
use super::types::{Condition, FilterNode, FilterTree, Logic, Operator};
use super::value::{FieldType, FieldValue};

/// Compiled boolean condition over one record
pub struct Predicate<T> {
    root: Option<Arc<Node<T>>>,
}

impl<T> Predicate<T> {
    /// Predicate accepting every record
    pub fn always() -> Self {
        Self { root: None }
    }

    /// Whether this predicate filters nothing out
    pub fn is_identity(&self) -> bool {
        self.root.is_none()
    }

    pub fn matches(&self, record: &T) -> bool {
        self.root.as_ref().is_none_or(|node| node.matches(record))
    }
}

impl<T: FieldAccessible> Predicate<T> {
    /// Compile against the record type's own field table; `None` accepts everything
    pub fn compile(node: Option<&FilterNode>) -> Result<Self, QueryError> {
        match node {
            Some(node) => compile_filter(node, T::fields()),
            None => Ok(Self::always()),
        }
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("identity", &self.is_identity())
            .finish()
    }
}

/// Compile a filter tree against a field registry
pub fn compile_filter<T>(
    node: &FilterNode,
    registry: &FieldRegistry<T>,
) -> Result<Predicate<T>, QueryError> {
    let root = match FilterTree::from_node(node)? {
        Some(tree) => Some(Arc::new(compile_tree(&tree, registry)?)),
        None => None,
    };
    tracing::debug!(
        record = %registry.record_name(),
        identity = root.is_none(),
        "Filter compiled"
    );
    Ok(Predicate { root })
}

enum Node<T> {
    Compare(Comparison<T>),
    All(Vec<Node<T>>),
    Any(Vec<Node<T>>),
}

impl<T> Node<T> {
    fn matches(&self, record: &T) -> bool {
        match self {
            Self::Compare(comparison) => comparison.matches(record),
            Self::All(nodes) => nodes.iter().all(|n| n.matches(record)),
            Self::Any(nodes) => nodes.iter().any(|n| n.matches(record)),
        }
    }
}

fn compile_tree<T>(tree: &FilterTree, registry: &FieldRegistry<T>) -> Result<Node<T>, QueryError> {
    match tree {
        FilterTree::Leaf(condition) => compile_condition(condition, registry).map(Node::Compare),
        FilterTree::Group { logic, children } => combine(*logic, children, registry),
        FilterTree::LeafWithChildren {
            condition,
            logic,
            children,
        } => {
            // Own comparison joins the combined children with AND whatever the logic
            let own = Node::Compare(compile_condition(condition, registry)?);
            let rest = combine(*logic, children, registry)?;
            Ok(Node::All(vec![own, rest]))
        }
    }
}

fn combine<T>(
    logic: Logic,
    children: &[FilterTree],
    registry: &FieldRegistry<T>,
) -> Result<Node<T>, QueryError> {
    let nodes = children
        .iter()
        .map(|child| compile_tree(child, registry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(match logic {
        Logic::And => Node::All(nodes),
        Logic::Or => Node::Any(nodes),
    })
}

struct Comparison<T> {
    accessor: Accessor<T>,
    fold_case: bool,
    test: Test,
}

enum Test {
    Eq(FieldValue),
    Neq(FieldValue),
    Lt(FieldValue),
    Lte(FieldValue),
    Gt(FieldValue),
    Gte(FieldValue),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    IsNull,
    IsNotNull,
    In(Vec<FieldValue>),
    Between(FieldValue, FieldValue),
}

impl<T> Comparison<T> {
    fn matches(&self, record: &T) -> bool {
        let mut value = (self.accessor)(record);
        if self.fold_case {
            value = value.fold_case();
        }

        match &self.test {
            Test::Eq(operand) => value.compare(operand) == Some(Ordering::Equal),
            Test::Neq(operand) => value.compare(operand) != Some(Ordering::Equal),
            Test::Lt(operand) => value.compare(operand) == Some(Ordering::Less),
            Test::Lte(operand) => matches!(
                value.compare(operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Test::Gt(operand) => value.compare(operand) == Some(Ordering::Greater),
            Test::Gte(operand) => matches!(
                value.compare(operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Test::Contains(needle) => {
                matches!(&value, FieldValue::Text(s) if s.contains(needle.as_str()))
            }
            Test::StartsWith(prefix) => {
                matches!(&value, FieldValue::Text(s) if s.starts_with(prefix.as_str()))
            }
            Test::EndsWith(suffix) => {
                matches!(&value, FieldValue::Text(s) if s.ends_with(suffix.as_str()))
            }
            Test::IsNull => value.is_null(),
            Test::IsNotNull => !value.is_null(),
            Test::In(candidates) => candidates
                .iter()
                .any(|c| value.compare(c) == Some(Ordering::Equal)),
            Test::Between(lower, upper) => {
                matches!(
                    value.compare(lower),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    value.compare(upper),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
        }
    }
}

fn compile_condition<T>(
    condition: &Condition,
    registry: &FieldRegistry<T>,
) -> Result<Comparison<T>, QueryError> {
    let descriptor = registry.resolve(&condition.field)?;
    let field_type = descriptor.field_type();
    let operator = condition.operator;

    if operator.is_text_only() && field_type != FieldType::Text {
        return Err(QueryError::IncompatibleOperator {
            field: condition.field.clone(),
            operator: operator.to_string(),
            field_type,
        });
    }

    let fold_case = field_type == FieldType::Text && !condition.case_sensitive;
    let coerce = |raw: &str| -> Result<FieldValue, QueryError> {
        FieldValue::parse(raw, field_type)
            .map(|v| if fold_case { v.fold_case() } else { v })
            .ok_or_else(|| QueryError::value_coercion(&condition.field, raw, field_type))
    };
    let text = |raw: &str| -> String {
        if fold_case {
            raw.to_lowercase()
        } else {
            raw.to_string()
        }
    };

    // Missing operands were rejected when the tree was built
    let raw = condition.value.as_deref().unwrap_or_default();

    let test = match operator {
        Operator::Eq => Test::Eq(coerce(raw)?),
        Operator::Neq => Test::Neq(coerce(raw)?),
        Operator::Lt => Test::Lt(coerce(raw)?),
        Operator::Lte => Test::Lte(coerce(raw)?),
        Operator::Gt => Test::Gt(coerce(raw)?),
        Operator::Gte => Test::Gte(coerce(raw)?),
        Operator::Contains => Test::Contains(text(raw)),
        Operator::StartsWith => Test::StartsWith(text(raw)),
        Operator::EndsWith => Test::EndsWith(text(raw)),
        Operator::IsNull => Test::IsNull,
        Operator::IsNotNull => Test::IsNotNull,
        Operator::In => Test::In(
            raw.split(',')
                .map(|segment| coerce(segment.trim()))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Operator::Between => {
            let parts: Vec<&str> = raw.split(',').collect();
            let [lower, upper] = parts.as_slice() else {
                return Err(QueryError::MalformedOperand {
                    field: condition.field.clone(),
                    operator: operator.to_string(),
                    value: raw.to_string(),
                    reason: "requires exactly 2 comma-separated values",
                });
            };
            Test::Between(coerce(lower.trim())?, coerce(upper.trim())?)
        }
    };

    tracing::trace!(
        field = %descriptor.name(),
        operator = %operator,
        field_type = %field_type,
        "Condition compiled"
    );

    Ok(Comparison {
        accessor: descriptor.accessor(),
        fold_case,
        test,
    })
}
