//! In-memory data source

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, BoxStream, StreamExt};

use super::traits::{AsyncDataSource, DataSource, Include};

/// Data source over an owned collection. Never fails; tracks how often it was read.
pub struct MemorySource<T> {
    records: Vec<T>,
    loads: AtomicUsize,
}

impl<T> MemorySource<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of fetches served so far
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    fn record_load(&self, include: &Include) {
        let loads = self.loads.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(
            records = self.records.len(),
            include = ?include.paths(),
            loads,
            "Memory source read"
        );
    }
}

impl<T> FromIterator<T> for MemorySource<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: Clone> DataSource<T> for MemorySource<T> {
    type Error = Infallible;

    fn load(&self, include: &Include) -> Result<Vec<T>, Self::Error> {
        self.record_load(include);
        Ok(self.records.clone())
    }
}

impl<T: Clone + Send + Sync> AsyncDataSource<T> for MemorySource<T> {
    type Error = Infallible;

    fn rows<'a>(&'a self, include: &'a Include) -> BoxStream<'a, Result<T, Self::Error>> {
        self.record_load(include);
        stream::iter(self.records.iter().cloned().map(Ok)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[test]
    fn load_returns_every_record_and_counts() {
        let source: MemorySource<i32> = (1..=3).collect();
        assert_eq!(source.load(&Include::none()).unwrap(), vec![1, 2, 3]);
        assert_eq!(source.loads(), 1);
        assert_eq!(source.len(), 3);
    }

    #[tokio::test]
    async fn rows_streams_in_order() {
        let source = MemorySource::new(vec!["a", "b"]);
        let include = Include::new(["owner"]);
        let rows: Vec<&str> = source.rows(&include).try_collect().await.unwrap();
        assert_eq!(rows, vec!["a", "b"]);
        assert_eq!(source.loads(), 1);
    }
}
