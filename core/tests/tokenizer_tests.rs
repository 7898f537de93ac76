use papermap_core::tokenizer::tokenize;

#[test]
fn it_filters_stopwords_and_short_tokens() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words, vec!["quick", "brown", "fox", "lazy", "dog"]);
}

#[test]
fn it_survives_pdf_extraction_artifacts() {
    let words = tokenize("We evaluate un-\nsupervised meth-\nods on 10,000 samples (cf. Fig. 3).");
    assert!(words.contains(&"unsupervised".to_string()));
    assert!(words.contains(&"methods".to_string()));
    assert!(words
        .iter()
        .all(|w| w.len() > 2 && w.chars().all(|c| c.is_ascii_lowercase())));
}
