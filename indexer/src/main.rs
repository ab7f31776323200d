use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eldar_core::transform::all_expansions;
use eldar_core::{Analyzer, AnalyzerConfig, InvertedIndex, QueryTree};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    body: String,
}

/// Written next to the index file as `<output>.meta.json`.
#[derive(Debug, Serialize)]
struct Manifest {
    num_docs: u32,
    num_terms: usize,
    created_at: String,
    analyzer: AnalyzerConfig,
    sources: Vec<String>,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build boolean inverted indexes and run queries against them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from .txt, .json or .jsonl files
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index file
        #[arg(long)]
        output: String,
        /// Stem words (English)
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// Drop English stopwords
        #[arg(long, default_value_t = false)]
        stopwords: bool,
    },
    /// Print the ids of documents matching a query
    Search {
        #[arg(long)]
        index: String,
        #[arg(long)]
        query: String,
        /// Match leaf words exactly instead of lower-casing them
        #[arg(long, default_value_t = false)]
        case_sensitive: bool,
        /// Print only the number of matches
        #[arg(long, default_value_t = false)]
        count: bool,
    },
    /// Print the postings list of one term
    Postings {
        #[arg(long)]
        index: String,
        #[arg(long)]
        term: String,
    },
    /// List every single-leaf expansion of a query with its hit count
    Expand {
        #[arg(long)]
        index: String,
        #[arg(long)]
        query: String,
        /// Word to combine with each leaf
        #[arg(long)]
        word: String,
        #[arg(long, default_value_t = false)]
        case_sensitive: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stem, stopwords } => {
            build_index(&input, &output, AnalyzerConfig { stem, remove_stopwords: stopwords })
        }
        Commands::Search { index, query, case_sensitive, count } => {
            let index = InvertedIndex::open(&index).with_context(|| format!("opening {index}"))?;
            let tree = QueryTree::parse(&query, !case_sensitive)?;
            if count {
                println!("{}", index.count(&tree));
            } else {
                let ids = index.search(&tree);
                println!("{}", serde_json::to_string(&ids)?);
            }
            Ok(())
        }
        Commands::Postings { index, term } => {
            let index = InvertedIndex::open(&index).with_context(|| format!("opening {index}"))?;
            println!("{}", serde_json::to_string(&index.get_postings(&term))?);
            Ok(())
        }
        Commands::Expand { index, query, word, case_sensitive } => {
            let index = InvertedIndex::open(&index).with_context(|| format!("opening {index}"))?;
            let tree = QueryTree::parse(&query, !case_sensitive)?;
            println!("{}\t{}", index.count(&tree), tree);
            for e in all_expansions(tree.root(), &word) {
                let expanded = QueryTree::from_root(e.node);
                println!("{}\t{}\t{} {}", index.count(&expanded), expanded, e.path, e.op);
            }
            Ok(())
        }
    }
}

fn build_index(input: &str, output: &str, config: AnalyzerConfig) -> Result<()> {
    let input_path = Path::new(input);
    let analyzer = Analyzer::new(config);
    let mut index = InvertedIndex::new();

    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && input_kind(p).is_some() {
                files.push(p.to_path_buf());
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        anyhow::bail!("input {input} does not exist");
    }

    for file in &files {
        match input_kind(file) {
            Some("jsonl") => index_jsonl(file, &analyzer, &mut index)?,
            Some("json") => index_json(file, &analyzer, &mut index)?,
            _ => {
                let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
                let doc_id = index.add_text(&text, &analyzer);
                tracing::debug!(doc_id, file = %file.display(), "indexed text file");
            }
        }
    }

    tracing::info!(num_docs = index.get_document_count(), num_terms = index.num_terms(), "ingested documents");
    index.save(output)?;

    let manifest = Manifest {
        num_docs: index.get_document_count(),
        num_terms: index.num_terms(),
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_default(),
        analyzer: config,
        sources: files.iter().map(|f| f.display().to_string()).collect(),
    };
    fs::write(format!("{output}.meta.json"), serde_json::to_string_pretty(&manifest)?)?;

    tracing::info!(output, "index build complete");
    Ok(())
}

fn input_kind(p: &Path) -> Option<&'static str> {
    match p.extension().and_then(|s| s.to_str()) {
        Some("txt") => Some("txt"),
        Some("json") => Some("json"),
        Some("jsonl") => Some("jsonl"),
        _ => None,
    }
}

fn index_jsonl(file: &Path, analyzer: &Analyzer, index: &mut InvertedIndex) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)?;
        ingest_doc(doc, analyzer, index);
    }
    Ok(())
}

fn index_json(file: &Path, analyzer: &Analyzer, index: &mut InvertedIndex) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                ingest_doc(doc, analyzer, index);
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            ingest_doc(doc, analyzer, index);
        }
        _ => tracing::warn!(file = %file.display(), "skipping JSON that is neither an object nor an array"),
    }
    Ok(())
}

/// The title, when present, is indexed together with the body.
fn ingest_doc(doc: InputDoc, analyzer: &Analyzer, index: &mut InvertedIndex) {
    let text = match &doc.title {
        Some(title) => format!("{title}\n{}", doc.body),
        None => doc.body,
    };
    let doc_id = index.add_text(&text, analyzer);
    tracing::debug!(doc_id, external_id = doc.id.as_deref().unwrap_or(""), "indexed document");
}
