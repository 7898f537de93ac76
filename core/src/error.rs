use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for the indexing engine. Batch- and document-level
/// variants wrap the underlying cause so callers can report and retry at
/// the right granularity.
#[derive(Debug, Error)]
pub enum Error {
    #[error("backing store failure: {0}")]
    Store(#[from] sled::Error),

    #[error("value encoding failure: {0}")]
    Encode(#[from] Box<bincode::ErrorKind>),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json encoding failure: {0}")]
    Json(#[from] serde_json::Error),

    /// The document's whole contribution was discarded; it stays
    /// unprocessed and can be retried.
    #[error("document {doc_id} discarded: {source}")]
    Document {
        doc_id: String,
        #[source]
        source: Box<Error>,
    },

    /// A batch failed every allowed attempt. Nothing from the batch was
    /// committed; re-running it is safe.
    #[error("batch {batch_id} failed after {attempts} attempt(s): {source}")]
    Batch {
        batch_id: u64,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// The corpus advanced past the snapshot a scoring pass was using.
    /// Weights computed under different corpus sizes are not comparable,
    /// so the pass is aborted and must be rerun with a fresh snapshot.
    #[error("corpus changed during scoring pass: snapshot generation {snapshot}, store generation {current}")]
    SnapshotMismatch { snapshot: u64, current: u64 },

    #[error("corrupt store entry: {0}")]
    Corrupt(&'static str),
}

impl From<sled::transaction::TransactionError<Error>> for Error {
    fn from(e: sled::transaction::TransactionError<Error>) -> Self {
        match e {
            sled::transaction::TransactionError::Storage(e) => Error::Store(e),
            sled::transaction::TransactionError::Abort(e) => e,
        }
    }
}
