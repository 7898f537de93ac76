use papermap_core::scorer::{score_corpus, Snapshot};
use papermap_core::{Error, IndexConfig, PaperInput, Pipeline};
use tempfile::tempdir;

fn paper(id: &str, text: &str) -> PaperInput {
    PaperInput {
        id: id.into(),
        title: format!("Paper {id}"),
        year: Some(2024),
        summary: None,
        subcategory: None,
        authors: Vec::new(),
        text: text.into(),
    }
}

fn test_config() -> IndexConfig {
    IndexConfig {
        df_ceiling: None,
        shards: 4,
        ..IndexConfig::default()
    }
}

#[test]
fn three_paper_corpus_end_to_end() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::open(dir.path(), test_config()).unwrap();
    let papers = vec![
        paper("A", "alpha alpha alpha beta"),
        paper("B", "alpha beta beta gamma"),
        paper("C", "gamma gamma gamma gamma gamma"),
    ];
    let summary = pipeline.ingest_batch(0, &papers).unwrap();
    assert_eq!(summary.ingested, 3);
    assert_eq!(summary.new_words, 3);

    let store = pipeline.store();
    // Ids in first-sighting order across A -> B -> C.
    assert_eq!(store.words().get("alpha").unwrap(), Some(1));
    assert_eq!(store.words().get("beta").unwrap(), Some(2));
    assert_eq!(store.words().get("gamma").unwrap(), Some(3));
    assert_eq!(store.df(1).unwrap(), 2);
    assert_eq!(store.df(2).unwrap(), 2);
    assert_eq!(store.df(3).unwrap(), 2);
    assert_eq!(store.doc_count().unwrap(), 3);

    pipeline.score().unwrap();

    // C's only (and therefore top) word is gamma, weighted 5 * ln(3/2).
    let top_c = store.top_words("C").unwrap().unwrap();
    assert_eq!(top_c.len(), 1);
    assert_eq!(top_c[0].0, 3);
    let expected = 5.0 * (3.0f64 / 2.0).ln();
    assert!((top_c[0].1 - expected).abs() < 1e-12);

    // gamma's best document is C, then B.
    let gamma_docs = store.top_docs(3).unwrap().unwrap();
    assert_eq!(gamma_docs.len(), 2);
    assert_eq!(gamma_docs[0].0, "C");
    assert_eq!(gamma_docs[1].0, "B");
}

#[test]
fn reprocessing_a_document_is_idempotent() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::open(dir.path(), test_config()).unwrap();
    pipeline
        .ingest_batch(0, &[paper("A", "alpha alpha beta"), paper("B", "alpha gamma")])
        .unwrap();

    let store = pipeline.store();
    let terms_before = store.doc_terms("A").unwrap();
    let generation_before = store.generation().unwrap();

    // Same document in a later batch: skipped, nothing moves.
    let summary = pipeline
        .ingest_batch(1, &[paper("A", "alpha alpha beta")])
        .unwrap();
    assert_eq!(summary.ingested, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.doc_terms("A").unwrap(), terms_before);
    assert_eq!(store.df(1).unwrap(), 2);
    assert_eq!(store.doc_count().unwrap(), 2);
    assert_eq!(store.generation().unwrap(), generation_before);

    // Duplicate ids inside one batch count once.
    let summary = pipeline
        .ingest_batch(2, &[paper("C", "gamma delta"), paper("C", "gamma delta")])
        .unwrap();
    assert_eq!(summary.ingested, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.df(store.words().get("gamma").unwrap().unwrap()).unwrap(), 2);
}

#[test]
fn repeated_scoring_passes_are_deterministic() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::open(dir.path(), test_config()).unwrap();
    pipeline
        .ingest_batch(
            0,
            &[
                paper("A", "alpha alpha beta gamma"),
                paper("B", "beta beta gamma"),
                paper("C", "gamma alpha"),
            ],
        )
        .unwrap();

    pipeline.score().unwrap();
    let store = pipeline.store();
    let first_words = store.top_words("A").unwrap();
    let first_docs = store.top_docs(1).unwrap();

    pipeline.score().unwrap();
    assert_eq!(store.top_words("A").unwrap(), first_words);
    assert_eq!(store.top_docs(1).unwrap(), first_docs);
}

#[test]
fn scoring_pass_aborts_when_corpus_moves() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::open(dir.path(), test_config()).unwrap();
    pipeline
        .ingest_batch(0, &[paper("A", "alpha beta"), paper("B", "beta gamma")])
        .unwrap();

    let stale = Snapshot::take(pipeline.store()).unwrap();
    pipeline.ingest_batch(1, &[paper("C", "gamma delta")]).unwrap();

    let err = score_corpus(pipeline.store(), pipeline.config(), &stale).unwrap_err();
    assert!(matches!(err, Error::SnapshotMismatch { .. }));
}

#[test]
fn resumes_across_reopen() {
    let dir = tempdir().unwrap();
    {
        let pipeline = Pipeline::open(dir.path(), test_config()).unwrap();
        pipeline
            .ingest_batch(0, &[paper("A", "alpha beta"), paper("B", "beta gamma")])
            .unwrap();
    }

    let pipeline = Pipeline::open(dir.path(), test_config()).unwrap();
    let summary = pipeline
        .ingest_batch(1, &[paper("B", "beta gamma"), paper("C", "gamma gamma delta")])
        .unwrap();
    assert_eq!(summary.ingested, 1);
    assert_eq!(summary.skipped, 1);

    let store = pipeline.store();
    assert_eq!(store.doc_count().unwrap(), 3);
    // Ids allocated before the reopen still hold.
    assert_eq!(store.words().get("alpha").unwrap(), Some(1));
    assert_eq!(store.words().get("delta").unwrap(), Some(4));

    pipeline.score().unwrap();
    let gamma = store.words().get("gamma").unwrap().unwrap();
    let gamma_docs = store.top_docs(gamma).unwrap().unwrap();
    assert_eq!(gamma_docs[0].0, "C");
}

#[test]
fn df_ceiling_excludes_common_words_from_rankings() {
    let dir = tempdir().unwrap();
    let cfg = IndexConfig {
        df_ceiling: Some(1),
        shards: 4,
        ..IndexConfig::default()
    };
    let pipeline = Pipeline::open(dir.path(), cfg).unwrap();
    pipeline
        .ingest_batch(0, &[paper("A", "alpha beta"), paper("B", "alpha gamma")])
        .unwrap();
    pipeline.score().unwrap();

    let store = pipeline.store();
    let alpha = store.words().get("alpha").unwrap().unwrap();
    let beta = store.words().get("beta").unwrap().unwrap();

    // alpha (df 2) is out of both rankings, but its weight is still stored.
    let top_a = store.top_words("A").unwrap().unwrap();
    assert_eq!(top_a.len(), 1);
    assert_eq!(top_a[0].0, beta);
    assert!(store.top_docs(alpha).unwrap().is_none());
    assert!(store.top_docs(beta).unwrap().is_some());

    let cell = store
        .doc_terms("A")
        .unwrap()
        .into_iter()
        .find(|(word_id, _)| *word_id == alpha)
        .unwrap()
        .1;
    assert!(cell.tf_idf.is_some());
}

#[test]
fn authors_are_registered_for_the_joined_export() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::open(dir.path(), test_config()).unwrap();
    let mut first = paper("A", "alpha beta");
    first.authors = vec!["Ada Lovelace".into(), "Charles Babbage".into()];
    let mut second = paper("B", "beta gamma");
    second.authors = vec!["Ada Lovelace".into()];
    pipeline.ingest_batch(0, &[first, second]).unwrap();

    let store = pipeline.store();
    assert_eq!(store.authors().len(), 2);
    let record = store.doc("B").unwrap().unwrap();
    assert_eq!(record.author_ids, vec![1]);
    assert_eq!(store.authors().text(1).unwrap().as_deref(), Some("Ada Lovelace"));
}
