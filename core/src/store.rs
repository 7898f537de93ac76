use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};
use sled::Transactional;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::scorer::Snapshot;
use crate::{AuthorId, WordId};

const GENERATION_KEY: &[u8] = b"generation";
const DOC_COUNT_KEY: &[u8] = b"doc_count";
const SNAPSHOT_KEY: &[u8] = b"snapshot";

/// Stored metadata row for one paper. The engine itself only needs the
/// document id; the rest is carried for the joined export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocRecord {
    pub title: String,
    pub year: Option<i32>,
    pub summary: Option<String>,
    pub subcategory: Option<String>,
    pub author_ids: Vec<AuthorId>,
}

/// One (document, word) cell: the raw term count, and the TF-IDF weight
/// once a scoring pass has written it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermCell {
    pub count: u32,
    pub tf_idf: Option<f64>,
}

/// A fully counted batch staged in memory, ready to commit as one unit.
#[derive(Debug, Default)]
pub struct StagedBatch {
    pub docs: Vec<(String, DocRecord)>,
    pub doc_words: Vec<(String, WordId, u32)>,
    pub df_deltas: HashMap<WordId, u64>,
}

/// The logical schema over a sled database, one tree per table, plus the
/// two registries (words, authors) and the pipeline metadata.
///
/// Keys: documents by their external string id, words by big-endian id.
/// `doc_words` frames its composite key as `doc_id ++ 0x00 ++ word_id`, so
/// document ids must not contain a NUL byte (rejected at ingest).
pub struct Store {
    db: sled::Db,
    words: Registry,
    authors: Registry,
    pub(crate) docs: sled::Tree,
    pub(crate) doc_words: sled::Tree,
    pub(crate) doc_freq: sled::Tree,
    pub(crate) processed: sled::Tree,
    pub(crate) top_words: sled::Tree,
    pub(crate) top_docs: sled::Tree,
    pub(crate) meta: sled::Tree,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let words = Registry::open(db.open_tree("words")?, db.open_tree("word_text")?)?;
        let authors = Registry::open(db.open_tree("authors")?, db.open_tree("author_names")?)?;
        Ok(Self {
            words,
            authors,
            docs: db.open_tree("docs")?,
            doc_words: db.open_tree("doc_words")?,
            doc_freq: db.open_tree("doc_freq")?,
            processed: db.open_tree("processed")?,
            top_words: db.open_tree("top_words")?,
            top_docs: db.open_tree("top_docs")?,
            meta: db.open_tree("meta")?,
            db,
        })
    }

    /// The vocabulary registry: sole authority for word id assignment.
    pub fn words(&self) -> &Registry {
        &self.words
    }

    /// The author registry, kept for the joined export.
    pub fn authors(&self) -> &Registry {
        &self.authors
    }

    /// Count of committed ingest batches. Bumped inside the batch
    /// transaction, so it moves if and only if corpus state moved.
    pub fn generation(&self) -> Result<u64> {
        self.meta_u64(GENERATION_KEY)
    }

    /// Number of committed documents.
    pub fn doc_count(&self) -> Result<u64> {
        self.meta_u64(DOC_COUNT_KEY)
    }

    fn meta_u64(&self, key: &[u8]) -> Result<u64> {
        match self.meta.get(key)? {
            Some(raw) => be_u64(&raw),
            None => Ok(0),
        }
    }

    pub fn is_processed(&self, doc_id: &str) -> Result<bool> {
        Ok(self.processed.contains_key(doc_id.as_bytes())?)
    }

    /// All committed document ids, in key order.
    pub fn processed_docs(&self) -> Result<Vec<String>> {
        self.processed
            .iter()
            .map(|entry| {
                let (key, _) = entry?;
                Ok(String::from_utf8_lossy(&key).into_owned())
            })
            .collect()
    }

    /// Commit one fully counted batch as a single multi-tree transaction:
    /// document rows, term counts, df increments, processed markers, and
    /// the generation/doc-count bump all land together or not at all. A
    /// crash mid-batch therefore leaves the previous checkpoint intact and
    /// the whole batch re-runnable.
    pub fn commit_batch(&self, staged: &StagedBatch) -> Result<()> {
        if staged.docs.is_empty() {
            return Ok(());
        }

        // Encode outside the transaction closure; it may run more than once.
        let mut doc_rows: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(staged.docs.len());
        for (doc_id, record) in &staged.docs {
            doc_rows.push((doc_id.as_bytes().to_vec(), bincode::serialize(record)?));
        }
        let mut word_rows: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(staged.doc_words.len());
        for (doc_id, word_id, count) in &staged.doc_words {
            let cell = TermCell { count: *count, tf_idf: None };
            word_rows.push((doc_word_key(doc_id, *word_id), bincode::serialize(&cell)?));
        }
        let df_rows: Vec<(Vec<u8>, u64)> = staged
            .df_deltas
            .iter()
            .map(|(word_id, delta)| (word_id.to_be_bytes().to_vec(), *delta))
            .collect();
        let processed_rows: Vec<Vec<u8>> = staged
            .docs
            .iter()
            .map(|(doc_id, _)| doc_id.as_bytes().to_vec())
            .collect();
        let added = staged.docs.len() as u64;

        (&self.docs, &self.doc_words, &self.doc_freq, &self.processed, &self.meta).transaction(
            |(docs, doc_words, doc_freq, processed, meta)| -> ConflictableTransactionResult<(), Error> {
                for (key, value) in &doc_rows {
                    docs.insert(key.clone(), value.clone())?;
                }
                for (key, value) in &word_rows {
                    doc_words.insert(key.clone(), value.clone())?;
                }
                for (key, delta) in &df_rows {
                    let current = match doc_freq.get(key)? {
                        Some(raw) => be_u64(&raw).map_err(ConflictableTransactionError::Abort)?,
                        None => 0,
                    };
                    doc_freq.insert(key.clone(), (current + delta).to_be_bytes().to_vec())?;
                }
                let generation = 1 + match meta.get(GENERATION_KEY)? {
                    Some(raw) => be_u64(&raw).map_err(ConflictableTransactionError::Abort)?,
                    None => 0,
                };
                for key in &processed_rows {
                    processed.insert(key.clone(), generation.to_be_bytes().to_vec())?;
                }
                let doc_count = added + match meta.get(DOC_COUNT_KEY)? {
                    Some(raw) => be_u64(&raw).map_err(ConflictableTransactionError::Abort)?,
                    None => 0,
                };
                meta.insert(GENERATION_KEY, generation.to_be_bytes().to_vec())?;
                meta.insert(DOC_COUNT_KEY, doc_count.to_be_bytes().to_vec())?;
                Ok(())
            },
        )?;
        self.db.flush()?;
        Ok(())
    }

    pub fn doc(&self, doc_id: &str) -> Result<Option<DocRecord>> {
        match self.docs.get(doc_id.as_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Term cells for one document, word id ascending.
    pub fn doc_terms(&self, doc_id: &str) -> Result<Vec<(WordId, TermCell)>> {
        let prefix = doc_word_prefix(doc_id);
        let mut out = Vec::new();
        for entry in self.doc_words.scan_prefix(&prefix) {
            let (key, value) = entry?;
            let word_id = be_u64(&key[prefix.len()..])?;
            out.push((word_id, bincode::deserialize(&value)?));
        }
        Ok(out)
    }

    pub fn put_doc_word(&self, doc_id: &str, word_id: WordId, cell: TermCell) -> Result<()> {
        self.doc_words
            .insert(doc_word_key(doc_id, word_id), bincode::serialize(&cell)?)?;
        Ok(())
    }

    pub fn df(&self, word_id: WordId) -> Result<u64> {
        match self.doc_freq.get(word_id.to_be_bytes())? {
            Some(raw) => be_u64(&raw),
            None => Ok(0),
        }
    }

    /// The whole document-frequency table, materialized for a scoring pass.
    pub fn df_table(&self) -> Result<HashMap<WordId, u64>> {
        let mut out = HashMap::new();
        for entry in self.doc_freq.iter() {
            let (key, value) = entry?;
            out.insert(be_u64(&key)?, be_u64(&value)?);
        }
        Ok(out)
    }

    /// Drop both materialized rankings. Run at the start of a scoring pass
    /// so nothing from an earlier snapshot survives it.
    pub fn clear_rankings(&self) -> Result<()> {
        self.top_words.clear()?;
        self.top_docs.clear()?;
        Ok(())
    }

    pub fn put_top_words(&self, doc_id: &str, ranked: &[(WordId, f64)]) -> Result<()> {
        self.top_words
            .insert(doc_id.as_bytes(), bincode::serialize(ranked)?)?;
        Ok(())
    }

    pub fn top_words(&self, doc_id: &str) -> Result<Option<Vec<(WordId, f64)>>> {
        match self.top_words.get(doc_id.as_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_top_docs(&self, word_id: WordId, ranked: &[(String, f64)]) -> Result<()> {
        self.top_docs
            .insert(word_id.to_be_bytes(), bincode::serialize(ranked)?)?;
        Ok(())
    }

    pub fn top_docs(&self, word_id: WordId) -> Result<Option<Vec<(String, f64)>>> {
        match self.top_docs.get(word_id.to_be_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Record the snapshot a completed scoring pass ran under.
    pub fn record_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.meta.insert(SNAPSHOT_KEY, bincode::serialize(snapshot)?)?;
        Ok(())
    }

    /// Snapshot of the last completed scoring pass, if any.
    pub fn last_snapshot(&self) -> Result<Option<Snapshot>> {
        match self.meta.get(SNAPSHOT_KEY)? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn docs_iter(&self) -> impl Iterator<Item = Result<(String, DocRecord)>> + '_ {
        self.docs.iter().map(|entry| {
            let (key, value) = entry?;
            Ok((
                String::from_utf8_lossy(&key).into_owned(),
                bincode::deserialize(&value)?,
            ))
        })
    }

    pub fn top_words_iter(&self) -> impl Iterator<Item = Result<(String, Vec<(WordId, f64)>)>> + '_ {
        self.top_words.iter().map(|entry| {
            let (key, value) = entry?;
            Ok((
                String::from_utf8_lossy(&key).into_owned(),
                bincode::deserialize(&value)?,
            ))
        })
    }

    pub fn top_docs_iter(&self) -> impl Iterator<Item = Result<(WordId, Vec<(String, f64)>)>> + '_ {
        self.top_docs.iter().map(|entry| {
            let (key, value) = entry?;
            Ok((be_u64(&key)?, bincode::deserialize(&value)?))
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

pub(crate) fn doc_word_prefix(doc_id: &str) -> Vec<u8> {
    let mut key = doc_id.as_bytes().to_vec();
    key.push(0);
    key
}

pub(crate) fn doc_word_key(doc_id: &str, word_id: WordId) -> Vec<u8> {
    let mut key = doc_word_prefix(doc_id);
    key.extend_from_slice(&word_id.to_be_bytes());
    key
}

pub(crate) fn be_u64(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Corrupt("expected an 8-byte big-endian integer"))?;
    Ok(u64::from_be_bytes(arr))
}
