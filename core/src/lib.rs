//! Corpus-wide lexical indexing and ranking engine: stable vocabulary ids,
//! per-document term counts, document frequencies, TF-IDF weights, and the
//! two bounded top-K projections (top words per document, top documents per
//! word), maintained incrementally over a sled-backed store.

pub mod config;
pub mod counter;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod registry;
pub mod scorer;
pub mod store;
pub mod tokenizer;
pub mod topk;

/// Stable vocabulary identifier. Assigned once on first sighting, never
/// reused or mutated.
pub type WordId = u64;

/// Stable author identifier, allocated by the author registry.
pub type AuthorId = u64;

pub use config::IndexConfig;
pub use error::{Error, Result};
pub use pipeline::{BatchSummary, PaperInput, Pipeline};
pub use registry::Registry;
pub use scorer::{ScoreSummary, Snapshot};
pub use store::{DocRecord, Store, TermCell};
