use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::{Error, Result};
use crate::store::Store;

/// One row of the flat top-words-per-document projection.
#[derive(Debug, Serialize)]
pub struct DocWordRow<'a> {
    pub document_id: &'a str,
    pub word_text: &'a str,
    pub tf_idf: f64,
    pub rank: u32,
}

/// One row of the flat top-documents-per-word projection.
#[derive(Debug, Serialize)]
pub struct WordDocRow<'a> {
    pub word_text: &'a str,
    pub document_id: &'a str,
    pub tf_idf: f64,
    pub rank: u32,
}

/// One row of the joined paper dataset.
#[derive(Debug, Serialize)]
pub struct PaperRow {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub summary: Option<String>,
    pub subcategory: Option<String>,
    pub authors: Vec<String>,
    pub words: Vec<String>,
}

/// Sidecar describing an export run.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportMeta {
    pub num_docs: u64,
    pub num_words: u64,
    pub created_at: String,
    pub version: u32,
}

/// Write the `(document_id, word_text, tf_idf, rank)` projection as JSONL,
/// rank 1..=K per document. Returns the row count.
pub fn export_top_words<W: Write>(store: &Store, out: &mut W) -> Result<u64> {
    let word_text = store.words().id_to_text()?;
    let mut rows = 0u64;
    for entry in store.top_words_iter() {
        let (doc_id, ranked) = entry?;
        for (i, (word_id, weight)) in ranked.iter().enumerate() {
            let row = DocWordRow {
                document_id: &doc_id,
                word_text: word_text
                    .get(word_id)
                    .ok_or(Error::Corrupt("ranked word id missing from registry"))?,
                tf_idf: *weight,
                rank: i as u32 + 1,
            };
            serde_json::to_writer(&mut *out, &row)?;
            out.write_all(b"\n")?;
            rows += 1;
        }
    }
    Ok(rows)
}

/// Write the `(word_text, document_id, tf_idf, rank)` projection as JSONL,
/// rank 1..=K per word. Returns the row count.
pub fn export_top_docs<W: Write>(store: &Store, out: &mut W) -> Result<u64> {
    let word_text = store.words().id_to_text()?;
    let mut rows = 0u64;
    for entry in store.top_docs_iter() {
        let (word_id, ranked) = entry?;
        let text = word_text
            .get(&word_id)
            .ok_or(Error::Corrupt("ranked word id missing from registry"))?;
        for (i, (doc_id, weight)) in ranked.iter().enumerate() {
            let row = WordDocRow {
                word_text: text,
                document_id: doc_id,
                tf_idf: *weight,
                rank: i as u32 + 1,
            };
            serde_json::to_writer(&mut *out, &row)?;
            out.write_all(b"\n")?;
            rows += 1;
        }
    }
    Ok(rows)
}

/// Write the joined paper dataset: metadata, author names, and the
/// document's ranked top words. Returns the row count.
pub fn export_papers<W: Write>(store: &Store, out: &mut W) -> Result<u64> {
    let word_text = store.words().id_to_text()?;
    let author_names = store.authors().id_to_text()?;
    let mut rows = 0u64;
    for entry in store.docs_iter() {
        let (doc_id, record) = entry?;
        let words = match store.top_words(&doc_id)? {
            Some(ranked) => ranked
                .iter()
                .map(|(word_id, _)| {
                    word_text
                        .get(word_id)
                        .cloned()
                        .ok_or(Error::Corrupt("ranked word id missing from registry"))
                })
                .collect::<Result<Vec<String>>>()?,
            None => Vec::new(),
        };
        let authors = record
            .author_ids
            .iter()
            .map(|id| {
                author_names
                    .get(id)
                    .cloned()
                    .ok_or(Error::Corrupt("author id missing from registry"))
            })
            .collect::<Result<Vec<String>>>()?;
        let row = PaperRow {
            id: doc_id,
            title: record.title,
            year: record.year,
            summary: record.summary,
            subcategory: record.subcategory,
            authors,
            words,
        };
        serde_json::to_writer(&mut *out, &row)?;
        out.write_all(b"\n")?;
        rows += 1;
    }
    Ok(rows)
}

/// Build the export sidecar from store state. `created_at` is supplied by
/// the caller so the library stays clock-free.
pub fn export_meta(store: &Store, created_at: String) -> Result<ExportMeta> {
    Ok(ExportMeta {
        num_docs: store.doc_count()?,
        num_words: store.words().len(),
        created_at,
        version: 1,
    })
}

pub fn write_meta<W: Write>(meta: &ExportMeta, out: &mut W) -> Result<()> {
    let json = serde_json::to_string_pretty(meta)?;
    out.write_all(json.as_bytes())?;
    Ok(())
}
