//! Data layer
//!
//! Pages and paginators, data sources, and the repository facade that runs compiled
//! queries against them.

mod error;
mod json;
mod memory;
mod page;
mod repository;
mod traits;

pub use error::RepositoryError;
pub use json::{
    JSON_RECORD_NAME, JsonFileSource, JsonRecord, JsonSourceError, infer_registry, infer_schema,
};
pub use memory::MemorySource;
pub use page::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_INDEX, MAX_PAGE_SIZE, Page, PageQuery, PageRequest,
    default_page_size, paginate, paginate_stream, validate_page_index, validate_page_size,
};
pub use repository::{BlockingRepository, Repository};
pub use traits::{
    AsyncDataSource, AsyncViewRepository, DataSource, Include, StaticOrder, StaticPredicate,
    ViewRepository,
};
