//! Repository and data source traits
//!
//! A data source yields the raw collection for one record type. A view repository
//! composes a source with filtering, ordering and pagination. Every repository
//! operation exists in a blocking and a suspending form with the same semantics.

use std::cmp::Ordering;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use super::error::RepositoryError;
use super::page::{Page, PageRequest};
use crate::query::DynamicQuery;

/// Caller-compiled record predicate
pub type StaticPredicate<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// Caller-compiled record comparator
pub type StaticOrder<'a, T> = &'a (dyn Fn(&T, &T) -> Ordering + Send + Sync);

// ============================================================================
// Include
// ============================================================================

/// Relation-loading hint passed through to the data source untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Include {
    paths: Vec<String>,
}

impl Include {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

// ============================================================================
// Data sources
// ============================================================================

/// Blocking source of raw records
pub trait DataSource<T> {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the full raw collection once
    fn load(&self, include: &Include) -> Result<Vec<T>, Self::Error>;
}

/// Suspending source of raw records
pub trait AsyncDataSource<T>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stream the raw collection once
    fn rows<'a>(&'a self, include: &'a Include) -> BoxStream<'a, Result<T, Self::Error>>;
}

// ============================================================================
// View repositories
// ============================================================================

/// Blocking read-only repository
pub trait ViewRepository<T> {
    type Error: std::error::Error + Send + Sync + 'static;

    /// First record matching `predicate`
    fn get(
        &self,
        predicate: StaticPredicate<'_, T>,
        include: &Include,
    ) -> Result<Option<T>, RepositoryError<Self::Error>>;

    /// One page of records filtered and ordered by caller-compiled functions
    fn get_list(
        &self,
        predicate: Option<StaticPredicate<'_, T>>,
        order_by: Option<StaticOrder<'_, T>>,
        include: &Include,
        page: PageRequest,
    ) -> Result<Page<T>, RepositoryError<Self::Error>>;

    /// One page of records filtered and ordered by a dynamic query.
    /// `predicate` narrows the dynamic filter further.
    fn get_list_by_dynamic(
        &self,
        query: &DynamicQuery,
        predicate: Option<StaticPredicate<'_, T>>,
        include: &Include,
        page: PageRequest,
    ) -> Result<Page<T>, RepositoryError<Self::Error>>;

    /// Number of records matching `predicate`
    fn count(
        &self,
        predicate: Option<StaticPredicate<'_, T>>,
        include: &Include,
    ) -> Result<u64, RepositoryError<Self::Error>>;
}

/// Suspending read-only repository. Cancelled calls never return a partial page.
#[async_trait]
pub trait AsyncViewRepository<T: Send>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn get(
        &self,
        predicate: StaticPredicate<'_, T>,
        include: &Include,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, RepositoryError<Self::Error>>;

    async fn get_list(
        &self,
        predicate: Option<StaticPredicate<'_, T>>,
        order_by: Option<StaticOrder<'_, T>>,
        include: &Include,
        page: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<T>, RepositoryError<Self::Error>>;

    async fn get_list_by_dynamic(
        &self,
        query: &DynamicQuery,
        predicate: Option<StaticPredicate<'_, T>>,
        include: &Include,
        page: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<T>, RepositoryError<Self::Error>>;

    async fn count(
        &self,
        predicate: Option<StaticPredicate<'_, T>>,
        include: &Include,
        cancel: &CancellationToken,
    ) -> Result<u64, RepositoryError<Self::Error>>;
}
