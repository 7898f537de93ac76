use anyhow::Result;
use clap::{Parser, Subcommand};
use papermap_core::export::{export_meta, export_papers, export_top_docs, export_top_words, write_meta};
use papermap_core::{IndexConfig, PaperInput, Pipeline};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build corpus-wide TF-IDF rankings over a papers corpus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest papers from JSON/JSONL files or a directory, in resumable batches
    Ingest {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Store directory
        #[arg(long)]
        store: String,
        /// Documents per committed batch
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
    },
    /// Run a scoring pass: TF-IDF weights plus both top-K rankings
    Score {
        #[arg(long)]
        store: String,
        /// Entries per ranked list
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// Leave words present in more than this many documents unranked
        #[arg(long)]
        df_ceiling: Option<u64>,
        /// Rank every word regardless of document frequency
        #[arg(long, default_value_t = false)]
        no_df_ceiling: bool,
    },
    /// Write the materialized projections as JSONL
    Export {
        #[arg(long)]
        store: String,
        /// Output directory
        #[arg(long)]
        output: String,
    },
    /// Print corpus statistics
    Stats {
        #[arg(long)]
        store: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { input, store, batch_size } => ingest(&input, &store, batch_size),
        Commands::Score { store, k, df_ceiling, no_df_ceiling } => {
            score(&store, k, df_ceiling, no_df_ceiling)
        }
        Commands::Export { store, output } => export(&store, &output),
        Commands::Stats { store } => stats(&store),
    }
}

fn collect_input_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn ingest(input: &str, store: &str, batch_size: usize) -> Result<()> {
    let cfg = IndexConfig { batch_size, ..IndexConfig::default() };
    let pipeline = Pipeline::open(store, cfg)?;

    let files = collect_input_files(Path::new(input));
    let mut batch: Vec<PaperInput> = Vec::with_capacity(batch_size);
    let mut batch_id = 0u64;
    let mut ingested = 0u64;
    let mut skipped = 0u64;

    let mut flush_batch = |batch: &mut Vec<PaperInput>, batch_id: &mut u64| -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let summary = pipeline.ingest_batch_with_retry(*batch_id, batch)?;
        ingested += summary.ingested;
        skipped += summary.skipped;
        *batch_id += 1;
        batch.clear();
        Ok(())
    };

    for file in files {
        tracing::info!(file = %file.display(), "reading input");
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            let reader = BufReader::new(File::open(&file)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                batch.push(serde_json::from_str(&line)?);
                if batch.len() == batch_size {
                    flush_batch(&mut batch, &mut batch_id)?;
                }
            }
        } else {
            for paper in read_json_papers(&file)? {
                batch.push(paper);
                if batch.len() == batch_size {
                    flush_batch(&mut batch, &mut batch_id)?;
                }
            }
        }
    }
    flush_batch(&mut batch, &mut batch_id)?;

    tracing::info!(batches = batch_id, ingested, skipped, "ingest complete");
    Ok(())
}

fn read_json_papers(file: &Path) -> Result<Vec<PaperInput>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let papers = match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<PaperInput>, _>>()?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(papers)
}

fn score(store: &str, k: usize, df_ceiling: Option<u64>, no_df_ceiling: bool) -> Result<()> {
    let mut cfg = IndexConfig { top_k: k, ..IndexConfig::default() };
    if no_df_ceiling {
        cfg.df_ceiling = None;
    } else if df_ceiling.is_some() {
        cfg.df_ceiling = df_ceiling;
    }
    let pipeline = Pipeline::open(store, cfg)?;
    let summary = pipeline.score()?;
    tracing::info!(
        docs = summary.docs_scored,
        cells = summary.cells_scored,
        words = summary.words_ranked,
        "scoring complete"
    );
    Ok(())
}

fn export(store: &str, output: &str) -> Result<()> {
    let pipeline = Pipeline::open(store, IndexConfig::default())?;
    let store = pipeline.store();
    let out_dir = Path::new(output);
    fs::create_dir_all(out_dir)?;

    let mut top_words = BufWriter::new(File::create(out_dir.join("top_words.jsonl"))?);
    let rows = export_top_words(store, &mut top_words)?;
    top_words.flush()?;
    tracing::info!(rows, "wrote top_words.jsonl");

    let mut top_docs = BufWriter::new(File::create(out_dir.join("top_docs.jsonl"))?);
    let rows = export_top_docs(store, &mut top_docs)?;
    top_docs.flush()?;
    tracing::info!(rows, "wrote top_docs.jsonl");

    let mut papers = BufWriter::new(File::create(out_dir.join("papers.jsonl"))?);
    let rows = export_papers(store, &mut papers)?;
    papers.flush()?;
    tracing::info!(rows, "wrote papers.jsonl");

    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into());
    let meta = export_meta(store, created_at)?;
    let mut meta_file = File::create(out_dir.join("meta.json"))?;
    write_meta(&meta, &mut meta_file)?;

    tracing::info!(output, "export complete");
    Ok(())
}

fn stats(store: &str) -> Result<()> {
    let pipeline = Pipeline::open(store, IndexConfig::default())?;
    let store = pipeline.store();
    println!("documents:  {}", store.doc_count()?);
    println!("words:      {}", store.words().len());
    println!("authors:    {}", store.authors().len());
    println!("generation: {}", store.generation()?);
    match store.last_snapshot()? {
        Some(snapshot) => println!(
            "last scoring pass: corpus_size={} generation={}",
            snapshot.doc_count, snapshot.generation
        ),
        None => println!("last scoring pass: none"),
    }
    Ok(())
}
