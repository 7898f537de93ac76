/// Tuning knobs for ingestion and scoring.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Entries retained per ranked list.
    pub top_k: usize,
    /// Words present in more documents than this are left out of top-K
    /// candidacy. Weights are still computed and stored for them.
    pub df_ceiling: Option<u64>,
    /// Documents per ingest batch; a batch is the unit of commit and retry.
    pub batch_size: usize,
    /// How many times a failed batch is attempted before it is reported.
    pub max_batch_attempts: u32,
    /// Lock partitions for the corpus-wide per-word accumulator.
    pub shards: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            df_ceiling: Some(100_000),
            batch_size: 1000,
            max_batch_attempts: 3,
            shards: 64,
        }
    }
}
