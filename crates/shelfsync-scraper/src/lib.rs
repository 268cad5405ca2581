//! Catalog extraction engine: strategies, fetch orchestration with retry and
//! fallback, record normalization, and image downloads.

pub mod client;
mod embed;
pub mod error;
pub mod fetcher;
pub mod image;
pub mod normalize;
pub mod render;
pub mod strategy;
pub mod types;

pub use client::SourceClient;
pub use error::{ExtractionError, FetchError, StrategyFailure};
pub use fetcher::{CatalogFetcher, FetchOutcome, RetryPolicy};
pub use image::ImageFetcher;
pub use normalize::{image_file_name, normalize, normalize_all, NormalizeOptions};
pub use render::{DefaultRenderer, PageRenderer, UnavailableRenderer};
pub use strategy::ExtractionStrategy;
pub use types::RawItem;
