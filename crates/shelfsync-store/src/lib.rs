//! Persistence of the current catalog snapshot.
//!
//! The snapshot lives in one CSV file with a fixed header. [`CatalogStore::replace`]
//! swaps the whole file atomically, so readers see either the previous
//! snapshot or the new one, never a mix.

mod catalog;
mod error;

pub use catalog::CatalogStore;
pub use error::StoreError;
