//! Source system extractors
//!
//! Each extractor implements [`crate::etl::Extractor`] with `Item = Record`.

mod api;
mod file;
mod models;
mod nightscout;
mod postgres;

pub use api::ApiExtractor;
pub use file::{FileClient, FileExtractor, FileFormat};
pub use models::{GlucoseData, GlucoseReading};
pub use nightscout::{NightscoutCollection, NightscoutExtractor};
pub use postgres::PostgresExtractor;
