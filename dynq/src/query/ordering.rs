//! Ordering compiler
//!
//! Sort keys are resolved and validated up front; the resulting comparator walks the
//! keys in priority order and never fails.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::error::QueryError;
use super::fields::{Accessor, FieldAccessible, FieldRegistry};
use super::types::{Direction, SortKey};
use super::value::FieldValue;

struct OrderKey<T> {
    accessor: Accessor<T>,
    direction: Direction,
}

/// Compiled multi-key comparator
pub struct RecordOrdering<T> {
    keys: Arc<[OrderKey<T>]>,
}

impl<T> RecordOrdering<T> {
    /// Ordering that leaves records where they are
    pub fn identity() -> Self {
        Self {
            keys: Arc::from(Vec::new()),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.keys.is_empty()
    }

    /// First non-equal key decides; `desc` reverses that key only
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        self.keys
            .iter()
            .map(|key| {
                let ord = (key.accessor)(a).sort_cmp(&(key.accessor)(b));
                match key.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Stable sort. Each record's keys are read once.
    pub fn sort(&self, records: Vec<T>) -> Vec<T> {
        if self.is_identity() || records.len() < 2 {
            return records;
        }

        let mut decorated: Vec<(Vec<FieldValue>, T)> = records
            .into_iter()
            .map(|record| {
                let values = self.keys.iter().map(|k| (k.accessor)(&record)).collect();
                (values, record)
            })
            .collect();

        decorated.sort_by(|(a, _), (b, _)| self.compare_values(a, b));
        decorated.into_iter().map(|(_, record)| record).collect()
    }

    fn compare_values(&self, a: &[FieldValue], b: &[FieldValue]) -> Ordering {
        self.keys
            .iter()
            .zip(a.iter().zip(b))
            .map(|(key, (va, vb))| match key.direction {
                Direction::Asc => va.sort_cmp(vb),
                Direction::Desc => vb.sort_cmp(va),
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl<T: FieldAccessible> RecordOrdering<T> {
    pub fn compile(keys: &[SortKey]) -> Result<Self, QueryError> {
        compile_ordering(keys, T::fields())
    }
}

impl<T> Clone for RecordOrdering<T> {
    fn clone(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
        }
    }
}

impl<T> fmt::Debug for RecordOrdering<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordOrdering")
            .field("keys", &self.keys.len())
            .finish()
    }
}

/// Compile sort keys against a field registry. Every key is validated before returning.
pub fn compile_ordering<T>(
    keys: &[SortKey],
    registry: &FieldRegistry<T>,
) -> Result<RecordOrdering<T>, QueryError> {
    let compiled = keys
        .iter()
        .map(|key| {
            let descriptor = registry.resolve(key.field.trim())?;
            Ok(OrderKey {
                accessor: descriptor.accessor(),
                direction: Direction::parse(key)?,
            })
        })
        .collect::<Result<Vec<_>, QueryError>>()?;

    if !compiled.is_empty() {
        tracing::debug!(
            record = %registry.record_name(),
            keys = compiled.len(),
            "Ordering compiled"
        );
    }

    Ok(RecordOrdering {
        keys: Arc::from(compiled),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Person, people};

    fn sorted_ids(keys: &[SortKey]) -> Vec<i64> {
        let ordering = RecordOrdering::<Person>::compile(keys).unwrap();
        ordering.sort(people()).into_iter().map(|p| p.id).collect()
    }

    #[test]
    fn empty_keys_keep_source_order() {
        let ordering = RecordOrdering::<Person>::compile(&[]).unwrap();
        assert!(ordering.is_identity());
        assert_eq!(sorted_ids(&[]), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn single_key_descending() {
        assert_eq!(
            sorted_ids(&[SortKey::desc("age")]),
            vec![4, 1, 3, 6, 8, 5, 2, 7]
        );
    }

    #[test]
    fn ties_broken_by_next_key() {
        // age 25 is shared by Cara (3) and anna (6)
        assert_eq!(
            sorted_ids(&[SortKey::asc("age"), SortKey::desc("id")]),
            vec![7, 2, 5, 8, 6, 3, 1, 4]
        );
    }

    #[test]
    fn nulls_sort_first_ascending_and_last_descending() {
        let asc = sorted_ids(&[SortKey::asc("score"), SortKey::asc("id")]);
        assert_eq!(&asc[..2], &[2, 6]);
        let desc = sorted_ids(&[SortKey::desc("score"), SortKey::asc("id")]);
        assert_eq!(&desc[6..], &[2, 6]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        // score 88.5 is shared by Ann (1) and Eve (5)
        let ids = sorted_ids(&[SortKey::desc("score")]);
        assert_eq!(&ids[..3], &[3, 1, 5]);
    }

    #[test]
    fn composite_matches_reference_sort() {
        let keys = [
            SortKey::new("active", "DESC"),
            SortKey::asc("AGE"),
            SortKey::asc("name"),
        ];

        // Reference: stable single-key sorts from lowest to highest priority
        let mut reference = people();
        reference.sort_by(|a, b| a.name.cmp(&b.name));
        reference.sort_by(|a, b| a.age.cmp(&b.age));
        reference.sort_by(|a, b| b.active.cmp(&a.active));
        let expected: Vec<i64> = reference.iter().map(|p| p.id).collect();

        assert_eq!(sorted_ids(&keys), expected);

        let ordering = RecordOrdering::<Person>::compile(&keys).unwrap();
        let mut by_compare = people();
        by_compare.sort_by(|a, b| ordering.compare(a, b));
        assert_eq!(by_compare.iter().map(|p| p.id).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn compare_follows_contract() {
        let ordering = RecordOrdering::<Person>::compile(&[SortKey::asc("age")]).unwrap();
        let records = people();
        assert_eq!(ordering.compare(&records[0], &records[1]), Ordering::Greater);
        assert_eq!(ordering.compare(&records[1], &records[0]), Ordering::Less);
        assert_eq!(ordering.compare(&records[2], &records[5]), Ordering::Equal);
    }

    #[test]
    fn invalid_direction_is_rejected() {
        let err = RecordOrdering::<Person>::compile(&[SortKey::new("age", "sideways")])
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidDirection {
                field: "age".to_string(),
                direction: "sideways".to_string(),
            }
        );
    }

    #[test]
    fn every_key_is_validated() {
        let err = RecordOrdering::<Person>::compile(&[
            SortKey::asc("age"),
            SortKey::asc("height"),
        ])
        .unwrap_err();
        assert_eq!(err, QueryError::field_not_found("height", "Person"));
    }
}
