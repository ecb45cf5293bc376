//! Pages and pagination
//!
//! `Page` metadata is derived from `(index, size, count)` and is never set directly,
//! including on deserialization. Both paginators drive the same collector, so a
//! sequence and a stream with the same items produce the same page.

use std::pin::pin;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use validator::{Validate, ValidationError};

use super::error::RepositoryError;
use crate::query::QueryError;

/// Default items per page
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Maximum items per page accepted from callers
pub const MAX_PAGE_SIZE: u32 = 1_000;
/// Maximum page index accepted from callers
pub const MAX_PAGE_INDEX: u32 = 1_000_000;

// ============================================================================
// Page request
// ============================================================================

/// Validated page coordinates: zero-based index, size of at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    index: u32,
    size: u32,
}

impl PageRequest {
    pub fn new(index: u32, size: u32) -> Result<Self, QueryError> {
        if size == 0 {
            return Err(QueryError::InvalidPage(
                "Page size must be at least 1".to_string(),
            ));
        }
        Ok(Self { index, size })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of items before the window
    pub fn offset(&self) -> u64 {
        u64::from(self.index) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            index: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Validator function for page index parameter
pub fn validate_page_index(index: u32) -> Result<(), ValidationError> {
    if index > MAX_PAGE_INDEX {
        return Err(ValidationError::new("index_max").with_message(
            format!("Page index must be <= {}", MAX_PAGE_INDEX).into(),
        ));
    }
    Ok(())
}

/// Validator function for page size parameter
pub fn validate_page_size(size: u32) -> Result<(), ValidationError> {
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(ValidationError::new("size_range")
            .with_message(format!("Page size must be between 1 and {}", MAX_PAGE_SIZE).into()));
    }
    Ok(())
}

pub fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Page parameters as submitted by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
pub struct PageQuery {
    #[serde(default)]
    #[validate(custom(function = "validate_page_index"))]
    pub index: u32,

    #[serde(default = "default_page_size")]
    #[validate(custom(function = "validate_page_size"))]
    pub size: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            index: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageQuery {
    /// Validate and convert, additionally capping size at `max_size`
    pub fn resolve(&self, max_size: u32) -> Result<PageRequest, QueryError> {
        self.validate()
            .map_err(|e| QueryError::InvalidPage(e.to_string()))?;
        if self.size > max_size {
            return Err(QueryError::InvalidPage(format!(
                "Page size must be <= {}",
                max_size
            )));
        }
        PageRequest::new(self.index, self.size)
    }
}

// ============================================================================
// Page
// ============================================================================

/// One window of a result sequence plus metadata about the whole sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPage<T>")]
pub struct Page<T> {
    items: Vec<T>,
    index: u32,
    size: u32,
    count: u64,
    pages: u64,
    has_previous: bool,
    has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, count: u64) -> Self {
        let size = u64::from(request.size);
        let pages = count.div_ceil(size);
        let index = request.index;
        Self {
            items,
            index,
            size: request.size,
            count,
            pages,
            has_previous: index > 0,
            has_next: u64::from(index) + 1 < pages,
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Total number of items across all pages
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }

    pub fn has_previous(&self) -> bool {
        self.has_previous
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn request(&self) -> PageRequest {
        PageRequest {
            index: self.index,
            size: self.size,
        }
    }

    /// Transform items, keeping metadata
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        let request = self.request();
        Page::new(self.items.into_iter().map(f).collect(), request, self.count)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPage<T> {
    items: Vec<T>,
    index: u32,
    size: u32,
    count: u64,
}

impl<T> TryFrom<RawPage<T>> for Page<T> {
    type Error = QueryError;

    fn try_from(raw: RawPage<T>) -> Result<Self, Self::Error> {
        let request = PageRequest::new(raw.index, raw.size)?;
        if raw.items.len() as u64 > u64::from(raw.size) {
            return Err(QueryError::InvalidPage(format!(
                "Page holds {} items but size is {}",
                raw.items.len(),
                raw.size
            )));
        }
        let remaining = raw.count.saturating_sub(request.offset());
        if raw.items.len() as u64 > remaining {
            return Err(QueryError::InvalidPage(format!(
                "Page holds {} items but count {} leaves {} from index {}",
                raw.items.len(),
                raw.count,
                remaining,
                raw.index
            )));
        }
        Ok(Page::new(raw.items, request, raw.count))
    }
}

// ============================================================================
// Paginators
// ============================================================================

/// Counts every item and keeps the ones inside the requested window
struct PageCollector<T> {
    request: PageRequest,
    start: u64,
    end: u64,
    seen: u64,
    items: Vec<T>,
}

impl<T> PageCollector<T> {
    fn new(request: PageRequest) -> Self {
        let start = request.offset();
        Self {
            request,
            start,
            end: start.saturating_add(u64::from(request.size)),
            seen: 0,
            items: Vec::new(),
        }
    }

    fn push(&mut self, item: T) {
        if self.seen >= self.start && self.seen < self.end {
            self.items.push(item);
        }
        self.seen += 1;
    }

    fn finish(self) -> Page<T> {
        Page::new(self.items, self.request, self.seen)
    }
}

/// Slice an ordered sequence into one page
pub fn paginate<I>(items: I, request: PageRequest) -> Page<I::Item>
where
    I: IntoIterator,
{
    let mut collector = PageCollector::new(request);
    for item in items {
        collector.push(item);
    }
    collector.finish()
}

/// Slice an ordered stream into one page, stopping early on cancellation or error
pub async fn paginate_stream<S, T, E>(
    stream: S,
    request: PageRequest,
    cancel: &CancellationToken,
) -> Result<Page<T>, RepositoryError<E>>
where
    S: Stream<Item = Result<T, E>>,
{
    let mut stream = pin!(stream);
    let mut collector = PageCollector::new(request);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RepositoryError::Cancelled),
            next = stream.next() => match next {
                Some(Ok(item)) => collector.push(item),
                Some(Err(e)) => return Err(RepositoryError::Source(e)),
                None => break,
            },
        }
    }

    Ok(collector.finish())
}
