use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use crate::WordId;

/// A ranked entry: id plus weight. The ordering puts the lowest weight
/// first and, among equal weights, the higher id — so the *minimum* is
/// exactly the entry a bounded top-K structure should evict, and ranked
/// output (greatest first) comes out weight-descending with ties broken by
/// id ascending.
#[derive(Debug, Clone)]
pub struct Scored<I> {
    pub id: I,
    pub weight: f64,
}

impl<I: Ord> Ord for Scored<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl<I: Ord> PartialOrd for Scored<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: Ord> PartialEq for Scored<I> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<I: Ord> Eq for Scored<I> {}

/// Exact bounded top-K: a capacity-K min-oriented heap.
///
/// Feed every candidate through [`offer`](Self::offer); the structure keeps
/// the K greatest under the [`Scored`] ordering and discards the rest, in
/// O(log K) per candidate and O(K) memory.
#[derive(Debug)]
pub struct BoundedTopK<I: Ord> {
    k: usize,
    heap: BinaryHeap<Reverse<Scored<I>>>,
}

impl<I: Ord> BoundedTopK<I> {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    /// Consider one candidate. Below capacity it is always admitted;
    /// at capacity it replaces the current minimum only if it beats it.
    pub fn offer(&mut self, id: I, weight: f64) {
        if self.k == 0 {
            return;
        }
        let entry = Scored { id, weight };
        if self.heap.len() < self.k {
            self.heap.push(Reverse(entry));
        } else if let Some(Reverse(min)) = self.heap.peek() {
            if entry > *min {
                self.heap.pop();
                self.heap.push(Reverse(entry));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into ranked order: weight descending, ties by id ascending.
    pub fn into_ranked(self) -> Vec<Scored<I>> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(entry)| entry)
            .collect()
    }
}

/// Rank one document's term weights: the K highest, weight descending,
/// ties by word id ascending. Purely per-document.
pub fn rank_document(weights: impl IntoIterator<Item = (WordId, f64)>, k: usize) -> Vec<(WordId, f64)> {
    let mut top = BoundedTopK::new(k);
    for (word_id, weight) in weights {
        top.offer(word_id, weight);
    }
    top.into_ranked().into_iter().map(|s| (s.id, s.weight)).collect()
}

/// Corpus-wide per-word top-K accumulator for a single scoring pass.
///
/// State is partitioned by word id so concurrent documents only contend on
/// the partitions they actually touch; within a partition, updates to a
/// word's structure are serialized by the shard lock.
pub struct WordTopAccumulator {
    k: usize,
    shards: Vec<Mutex<HashMap<WordId, BoundedTopK<Arc<str>>>>>,
}

impl WordTopAccumulator {
    pub fn new(k: usize, shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            k,
            shards: (0..shards).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Offer one (word, document, weight) triple.
    pub fn offer(&self, word_id: WordId, doc_id: &Arc<str>, weight: f64) {
        let shard = &self.shards[(word_id % self.shards.len() as u64) as usize];
        let mut words = shard.lock();
        words
            .entry(word_id)
            .or_insert_with(|| BoundedTopK::new(self.k))
            .offer(Arc::clone(doc_id), weight);
    }

    /// Drain every word's structure into its ranked list.
    pub fn into_ranked(self) -> Vec<(WordId, Vec<Scored<Arc<str>>>)> {
        let mut out = Vec::new();
        for shard in self.shards {
            for (word_id, top) in shard.into_inner() {
                out.push((word_id, top.into_ranked()));
            }
        }
        out
    }
}
