use rayon::prelude::*;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::config::IndexConfig;
use crate::counter::count_terms;
use crate::error::{Error, Result};
use crate::scorer::{score_corpus, ScoreSummary, Snapshot};
use crate::store::{DocRecord, StagedBatch, Store};
use crate::tokenizer::tokenize;

/// One paper as supplied by the ingest input. Only `id` and `text` feed
/// the indexing core; the rest is metadata carried for the joined export.
#[derive(Debug, Clone, Deserialize)]
pub struct PaperInput {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub batch_id: u64,
    pub ingested: u64,
    pub skipped: u64,
    pub new_words: u64,
}

/// The ingestion pipeline over one store.
///
/// A batch is the unit of commit, checkpoint, and retry: it either lands
/// in full (documents, counts, df increments, generation bump) or not at
/// all, and documents already committed are skipped on re-runs.
pub struct Pipeline {
    store: Store,
    cfg: IndexConfig,
}

impl Pipeline {
    pub fn open<P: AsRef<Path>>(path: P, cfg: IndexConfig) -> Result<Self> {
        Ok(Self {
            store: Store::open(path)?,
            cfg,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &IndexConfig {
        &self.cfg
    }

    /// Ingest one batch of papers. Re-running a batch, or re-submitting a
    /// document id in a later batch, is a no-op for that document.
    pub fn ingest_batch(&self, batch_id: u64, papers: &[PaperInput]) -> Result<BatchSummary> {
        let mut fresh: Vec<&PaperInput> = Vec::with_capacity(papers.len());
        let mut seen: HashSet<&str> = HashSet::with_capacity(papers.len());
        let mut skipped = 0u64;
        for paper in papers {
            if paper.id.contains('\0') {
                return Err(Error::Document {
                    doc_id: paper.id.replace('\0', "\u{fffd}"),
                    source: Box::new(Error::Corrupt("document id contains a NUL byte")),
                });
            }
            if self.store.is_processed(&paper.id)? || !seen.insert(paper.id.as_str()) {
                skipped += 1;
            } else {
                fresh.push(paper);
            }
        }

        let words_before = self.store.words().len();

        // Tokenization is pure per-document work.
        let token_streams: Vec<Vec<String>> =
            fresh.par_iter().map(|paper| tokenize(&paper.text)).collect();

        // Registry resolution and df staging are the serialized section:
        // id assignment follows document order, then token order.
        let mut staged = StagedBatch::default();
        for (paper, tokens) in fresh.iter().zip(token_streams.iter()) {
            let counts = count_terms(self.store.words(), tokens).map_err(|e| Error::Document {
                doc_id: paper.id.clone(),
                source: Box::new(e),
            })?;
            let mut author_ids = Vec::with_capacity(paper.authors.len());
            for name in &paper.authors {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                author_ids.push(self.store.authors().resolve(name).map_err(|e| Error::Document {
                    doc_id: paper.id.clone(),
                    source: Box::new(e),
                })?);
            }
            for (&word_id, &count) in &counts {
                staged.doc_words.push((paper.id.clone(), word_id, count));
                *staged.df_deltas.entry(word_id).or_insert(0) += 1;
            }
            staged.docs.push((
                paper.id.clone(),
                DocRecord {
                    title: paper.title.clone(),
                    year: paper.year,
                    summary: paper.summary.clone(),
                    subcategory: paper.subcategory.clone(),
                    author_ids,
                },
            ));
        }

        self.store.commit_batch(&staged)?;
        let summary = BatchSummary {
            batch_id,
            ingested: staged.docs.len() as u64,
            skipped,
            new_words: self.store.words().len() - words_before,
        };
        tracing::info!(
            batch_id,
            ingested = summary.ingested,
            skipped = summary.skipped,
            new_words = summary.new_words,
            "batch committed"
        );
        Ok(summary)
    }

    /// Ingest with the bounded retry policy: a failed batch is retried as
    /// a whole, then reported with its batch identifier.
    pub fn ingest_batch_with_retry(&self, batch_id: u64, papers: &[PaperInput]) -> Result<BatchSummary> {
        let attempts = self.cfg.max_batch_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.ingest_batch(batch_id, papers) {
                Ok(summary) => return Ok(summary),
                Err(e) if attempt < attempts => {
                    tracing::warn!(batch_id, attempt, error = %e, "batch attempt failed, retrying");
                }
                Err(e) => {
                    return Err(Error::Batch {
                        batch_id,
                        attempts: attempt,
                        source: Box::new(e),
                    })
                }
            }
        }
    }

    /// Take a fresh snapshot and run a full scoring pass under it.
    pub fn score(&self) -> Result<ScoreSummary> {
        let snapshot = Snapshot::take(&self.store)?;
        score_corpus(&self.store, &self.cfg, &snapshot)
    }
}
