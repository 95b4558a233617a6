//! Storage port traits.

mod cache;
mod query;

pub use cache::CacheStore;
pub use query::QueryPort;
