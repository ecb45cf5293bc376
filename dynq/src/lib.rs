//! Dynamic filtering, sorting and paging over typed record collections

pub mod app;
pub mod core;
pub mod data;
pub mod query;

#[cfg(test)]
mod testing;
