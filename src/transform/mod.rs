//! Record transformers for the raw layer
//!
//! Each transformer maps `Record -> Record` so they can be stacked in a
//! [`crate::etl::TransformerChain`].

mod deduplicator;
mod field_dropper;
mod field_normalizer;
mod load_stamp;
mod nightscout;

pub use deduplicator::Deduplicator;
pub use field_dropper::FieldDropper;
pub use field_normalizer::FieldNormalizer;
pub use load_stamp::LoadStamp;
pub use nightscout::NightscoutTransformer;
