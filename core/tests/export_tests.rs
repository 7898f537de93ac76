use papermap_core::export::{export_papers, export_top_docs, export_top_words};
use papermap_core::{IndexConfig, PaperInput, Pipeline};
use serde_json::Value;
use tempfile::tempdir;

fn paper(id: &str, text: &str, authors: &[&str]) -> PaperInput {
    PaperInput {
        id: id.into(),
        title: format!("Paper {id}"),
        year: Some(2023),
        summary: Some("summary".into()),
        subcategory: Some("cs.LG".into()),
        authors: authors.iter().map(|a| a.to_string()).collect(),
        text: text.into(),
    }
}

fn jsonl(bytes: &[u8]) -> Vec<Value> {
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn projections_are_flat_ranked_and_bounded() {
    let dir = tempdir().unwrap();
    let cfg = IndexConfig {
        top_k: 2,
        df_ceiling: None,
        shards: 4,
        ..IndexConfig::default()
    };
    let pipeline = Pipeline::open(dir.path(), cfg).unwrap();
    pipeline
        .ingest_batch(
            0,
            &[
                paper("A", "alpha alpha alpha beta delta", &["Ada Lovelace"]),
                paper("B", "beta beta gamma", &["Charles Babbage", "Ada Lovelace"]),
                paper("C", "gamma gamma gamma alpha", &[]),
            ],
        )
        .unwrap();
    pipeline.score().unwrap();
    let store = pipeline.store();

    let mut out = Vec::new();
    let rows = export_top_words(store, &mut out).unwrap();
    let parsed = jsonl(&out);
    assert_eq!(rows as usize, parsed.len());
    for row in &parsed {
        let rank = row["rank"].as_u64().unwrap();
        assert!(rank >= 1 && rank <= 2);
        assert!(row["word_text"].as_str().is_some());
        assert!(row["tf_idf"].as_f64().is_some());
    }
    // Every document is bounded by K even when it has more distinct words.
    let a_rows: Vec<&Value> = parsed.iter().filter(|r| r["document_id"] == "A").collect();
    assert_eq!(a_rows.len(), 2);
    assert_eq!(a_rows[0]["word_text"], "alpha");
    assert_eq!(a_rows[0]["rank"], 1);

    let mut out = Vec::new();
    export_top_docs(store, &mut out).unwrap();
    let parsed = jsonl(&out);
    let gamma_rows: Vec<&Value> = parsed.iter().filter(|r| r["word_text"] == "gamma").collect();
    assert_eq!(gamma_rows.len(), 2);
    assert_eq!(gamma_rows[0]["document_id"], "C");
    assert_eq!(gamma_rows[0]["rank"], 1);

    let mut out = Vec::new();
    let rows = export_papers(store, &mut out).unwrap();
    assert_eq!(rows, 3);
    let parsed = jsonl(&out);
    let b = parsed.iter().find(|r| r["id"] == "B").unwrap();
    assert_eq!(b["authors"][0], "Charles Babbage");
    assert_eq!(b["authors"][1], "Ada Lovelace");
    assert_eq!(b["subcategory"], "cs.LG");
    assert!(b["words"].as_array().unwrap().len() <= 2);
}
