use std::collections::HashMap;

use crate::error::Result;
use crate::registry::Registry;
use crate::WordId;

/// Count one document's term frequencies: each token is resolved through
/// the vocabulary registry in sequence order (so first sightings allocate
/// ids in the order the corpus produced them), then its per-document
/// counter is incremented.
///
/// The whole token sequence is processed as a unit; the first registry
/// failure aborts the document and nothing from it is handed downstream.
pub fn count_terms(words: &Registry, tokens: &[String]) -> Result<HashMap<WordId, u32>> {
    let mut counts: HashMap<WordId, u32> = HashMap::new();
    for token in tokens {
        let id = words.resolve(token)?;
        *counts.entry(id).or_insert(0) += 1;
    }
    Ok(counts)
}
