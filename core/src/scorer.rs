use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::store::{Store, TermCell};
use crate::topk::{rank_document, WordTopAccumulator};

/// A fixed view of the corpus for one scoring pass. Every weight computed
/// under a snapshot uses the same document count, keeping ranks comparable
/// across documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub doc_count: u64,
    pub generation: u64,
}

impl Snapshot {
    pub fn take(store: &Store) -> Result<Self> {
        Ok(Self {
            doc_count: store.doc_count()?,
            generation: store.generation()?,
        })
    }

    /// Fail if the store has moved past this snapshot.
    pub fn verify(&self, store: &Store) -> Result<()> {
        let current = store.generation()?;
        if current != self.generation {
            return Err(Error::SnapshotMismatch {
                snapshot: self.generation,
                current,
            });
        }
        Ok(())
    }
}

/// `term_count × ln(corpus_size / df)`. Raw term count as TF, natural log.
pub fn tf_idf(count: u32, df: u64, corpus_size: u64) -> f64 {
    count as f64 * (corpus_size as f64 / df as f64).ln()
}

#[derive(Debug, Default)]
pub struct ScoreSummary {
    pub docs_scored: u64,
    pub cells_scored: u64,
    pub words_ranked: u64,
}

/// One full scoring pass under `snapshot`: compute and store the TF-IDF
/// weight for every (document, word) cell, rank the top-K words of each
/// document, and accumulate the corpus-wide top-K documents per word in a
/// single pass over the stored counts.
///
/// Documents are scored in parallel; the per-word accumulator serializes
/// per partition only. The snapshot generation is re-checked before the
/// rankings are committed, so a pass that raced an ingest aborts instead
/// of mixing corpus sizes.
pub fn score_corpus(store: &Store, cfg: &IndexConfig, snapshot: &Snapshot) -> Result<ScoreSummary> {
    snapshot.verify(store)?;
    store.clear_rankings()?;

    let doc_ids = store.processed_docs()?;
    let df_table = store.df_table()?;
    let accumulator = WordTopAccumulator::new(cfg.top_k, cfg.shards);
    let cells = AtomicU64::new(0);

    doc_ids.par_iter().try_for_each(|doc_id| -> Result<()> {
        let doc_key: Arc<str> = Arc::from(doc_id.as_str());
        let mut weights = Vec::new();
        for (word_id, cell) in store.doc_terms(doc_id)? {
            // df = 0 is impossible for a committed cell: counts and df
            // land in the same batch transaction.
            let df = df_table
                .get(&word_id)
                .copied()
                .filter(|df| *df > 0)
                .ok_or(Error::Corrupt("document_frequency row missing for stored term"))?;
            let weight = tf_idf(cell.count, df, snapshot.doc_count);
            store.put_doc_word(doc_id, word_id, TermCell { count: cell.count, tf_idf: Some(weight) })?;
            cells.fetch_add(1, Ordering::Relaxed);
            if cfg.df_ceiling.map_or(true, |ceiling| df <= ceiling) {
                weights.push((word_id, weight));
                accumulator.offer(word_id, &doc_key, weight);
            }
        }
        store.put_top_words(doc_id, &rank_document(weights, cfg.top_k))?;
        Ok(())
    })?;

    snapshot.verify(store)?;

    let mut words_ranked = 0u64;
    for (word_id, entries) in accumulator.into_ranked() {
        let ranked: Vec<(String, f64)> = entries
            .into_iter()
            .map(|s| (s.id.as_ref().to_owned(), s.weight))
            .collect();
        store.put_top_docs(word_id, &ranked)?;
        words_ranked += 1;
    }
    store.record_snapshot(snapshot)?;
    store.flush()?;

    let summary = ScoreSummary {
        docs_scored: doc_ids.len() as u64,
        cells_scored: cells.into_inner(),
        words_ranked,
    };
    tracing::info!(
        docs = summary.docs_scored,
        cells = summary.cells_scored,
        words = summary.words_ranked,
        corpus_size = snapshot.doc_count,
        "scoring pass complete"
    );
    Ok(summary)
}
