//! Repository facade
//!
//! `Repository` (suspending) and `BlockingRepository` compose a data source with the
//! query engine. Dynamic queries are compiled before the source is touched, so an
//! invalid query never costs a fetch.

use std::ops::ControlFlow;
use std::pin::pin;

use async_trait::async_trait;
use futures::future;
use futures::stream::{Stream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

use super::error::RepositoryError;
use super::page::{Page, PageRequest, paginate, paginate_stream};
use super::traits::{
    AsyncDataSource, AsyncViewRepository, DataSource, Include, StaticOrder, StaticPredicate,
    ViewRepository,
};
use crate::query::{DynamicQuery, FieldAccessible, QueryEngine};

fn accepts<T>(predicate: Option<StaticPredicate<'_, T>>, record: &T) -> bool {
    predicate.is_none_or(|p| p(record))
}

// ============================================================================
// Suspending repository
// ============================================================================

pub struct Repository<T, S> {
    source: S,
    engine: QueryEngine<T>,
}

impl<T: FieldAccessible, S> Repository<T, S> {
    /// Repository over the record type's own field table
    pub fn new(source: S) -> Self {
        Self::with_engine(source, QueryEngine::for_type())
    }
}

impl<T: 'static, S> Repository<T, S> {
    pub fn with_engine(source: S, engine: QueryEngine<T>) -> Self {
        Self { source, engine }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn engine(&self) -> &QueryEngine<T> {
        &self.engine
    }
}

/// Feed every row to `visit` until it breaks, the stream ends, or cancellation
async fn drain<T, E, St, F>(
    rows: St,
    cancel: &CancellationToken,
    mut visit: F,
) -> Result<(), RepositoryError<E>>
where
    St: Stream<Item = Result<T, E>>,
    F: FnMut(T) -> ControlFlow<()>,
{
    let mut rows = pin!(rows);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RepositoryError::Cancelled),
            next = rows.next() => match next {
                Some(Ok(row)) => {
                    if visit(row).is_break() {
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(RepositoryError::Source(e)),
                None => return Ok(()),
            },
        }
    }
}

async fn collect_rows<T, E, St>(
    rows: St,
    cancel: &CancellationToken,
) -> Result<Vec<T>, RepositoryError<E>>
where
    St: Stream<Item = Result<T, E>>,
{
    let mut collected = Vec::new();
    drain(rows, cancel, |row| {
        collected.push(row);
        ControlFlow::Continue(())
    })
    .await?;

    if cancel.is_cancelled() {
        return Err(RepositoryError::Cancelled);
    }
    Ok(collected)
}

fn ensure_active<E>(cancel: &CancellationToken) -> Result<(), RepositoryError<E>> {
    if cancel.is_cancelled() {
        return Err(RepositoryError::Cancelled);
    }
    Ok(())
}

#[async_trait]
impl<T, S> AsyncViewRepository<T> for Repository<T, S>
where
    T: Send + 'static,
    S: AsyncDataSource<T>,
{
    type Error = S::Error;

    async fn get(
        &self,
        predicate: StaticPredicate<'_, T>,
        include: &Include,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, RepositoryError<Self::Error>> {
        ensure_active(cancel)?;

        let mut found = None;
        drain(self.source.rows(include), cancel, |row| {
            if predicate(&row) {
                found = Some(row);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;

        tracing::debug!(
            record = %self.engine.registry().record_name(),
            found = found.is_some(),
            "Repository get"
        );
        Ok(found)
    }

    async fn get_list(
        &self,
        predicate: Option<StaticPredicate<'_, T>>,
        order_by: Option<StaticOrder<'_, T>>,
        include: &Include,
        page: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<T>, RepositoryError<Self::Error>> {
        ensure_active(cancel)?;

        let rows = self
            .source
            .rows(include)
            .try_filter(move |row| future::ready(accepts(predicate, row)));

        let result = match order_by {
            None => paginate_stream(rows, page, cancel).await?,
            Some(order) => {
                let mut records = collect_rows(rows, cancel).await?;
                records.sort_by(|a, b| order(a, b));
                paginate(records, page)
            }
        };

        tracing::debug!(
            record = %self.engine.registry().record_name(),
            index = page.index(),
            size = page.size(),
            count = result.count(),
            "Repository get_list"
        );
        Ok(result)
    }

    async fn get_list_by_dynamic(
        &self,
        query: &DynamicQuery,
        predicate: Option<StaticPredicate<'_, T>>,
        include: &Include,
        page: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<T>, RepositoryError<Self::Error>> {
        let compiled = self.engine.compile(query)?;
        ensure_active(cancel)?;

        let filter = compiled.clone();
        let rows = self.source.rows(include).try_filter(move |row| {
            future::ready(filter.matches(row) && accepts(predicate, row))
        });

        let result = if compiled.ordering().is_identity() {
            paginate_stream(rows, page, cancel).await?
        } else {
            let records = collect_rows(rows, cancel).await?;
            paginate(compiled.sort(records), page)
        };

        tracing::debug!(
            record = %self.engine.registry().record_name(),
            index = page.index(),
            size = page.size(),
            count = result.count(),
            "Repository get_list_by_dynamic"
        );
        Ok(result)
    }

    async fn count(
        &self,
        predicate: Option<StaticPredicate<'_, T>>,
        include: &Include,
        cancel: &CancellationToken,
    ) -> Result<u64, RepositoryError<Self::Error>> {
        ensure_active(cancel)?;

        let mut count = 0u64;
        drain(self.source.rows(include), cancel, |row| {
            if accepts(predicate, &row) {
                count += 1;
            }
            ControlFlow::Continue(())
        })
        .await?;
        ensure_active(cancel)?;

        Ok(count)
    }
}

// ============================================================================
// Blocking repository
// ============================================================================

pub struct BlockingRepository<T, S> {
    source: S,
    engine: QueryEngine<T>,
}

impl<T: FieldAccessible, S> BlockingRepository<T, S> {
    /// Repository over the record type's own field table
    pub fn new(source: S) -> Self {
        Self::with_engine(source, QueryEngine::for_type())
    }
}

impl<T: 'static, S> BlockingRepository<T, S> {
    pub fn with_engine(source: S, engine: QueryEngine<T>) -> Self {
        Self { source, engine }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn engine(&self) -> &QueryEngine<T> {
        &self.engine
    }

    fn load<E>(&self, include: &Include) -> Result<Vec<T>, RepositoryError<E>>
    where
        S: DataSource<T, Error = E>,
    {
        self.source.load(include).map_err(RepositoryError::Source)
    }
}

impl<T, S> ViewRepository<T> for BlockingRepository<T, S>
where
    T: 'static,
    S: DataSource<T>,
{
    type Error = S::Error;

    fn get(
        &self,
        predicate: StaticPredicate<'_, T>,
        include: &Include,
    ) -> Result<Option<T>, RepositoryError<Self::Error>> {
        let found = self.load(include)?.into_iter().find(|row| predicate(row));
        tracing::debug!(
            record = %self.engine.registry().record_name(),
            found = found.is_some(),
            "Repository get"
        );
        Ok(found)
    }

    fn get_list(
        &self,
        predicate: Option<StaticPredicate<'_, T>>,
        order_by: Option<StaticOrder<'_, T>>,
        include: &Include,
        page: PageRequest,
    ) -> Result<Page<T>, RepositoryError<Self::Error>> {
        let rows = self
            .load(include)?
            .into_iter()
            .filter(|row| accepts(predicate, row));

        let result = match order_by {
            None => paginate(rows, page),
            Some(order) => {
                let mut records: Vec<T> = rows.collect();
                records.sort_by(|a, b| order(a, b));
                paginate(records, page)
            }
        };

        tracing::debug!(
            record = %self.engine.registry().record_name(),
            index = page.index(),
            size = page.size(),
            count = result.count(),
            "Repository get_list"
        );
        Ok(result)
    }

    fn get_list_by_dynamic(
        &self,
        query: &DynamicQuery,
        predicate: Option<StaticPredicate<'_, T>>,
        include: &Include,
        page: PageRequest,
    ) -> Result<Page<T>, RepositoryError<Self::Error>> {
        let compiled = self.engine.compile(query)?;

        let rows = self
            .load(include)?
            .into_iter()
            .filter(|row| compiled.matches(row) && accepts(predicate, row));

        let result = if compiled.ordering().is_identity() {
            paginate(rows, page)
        } else {
            paginate(compiled.sort(rows.collect()), page)
        };

        tracing::debug!(
            record = %self.engine.registry().record_name(),
            index = page.index(),
            size = page.size(),
            count = result.count(),
            "Repository get_list_by_dynamic"
        );
        Ok(result)
    }

    fn count(
        &self,
        predicate: Option<StaticPredicate<'_, T>>,
        include: &Include,
    ) -> Result<u64, RepositoryError<Self::Error>> {
        let count = self
            .load(include)?
            .iter()
            .filter(|row| accepts(predicate, row))
            .count();
        Ok(count as u64)
    }
}
