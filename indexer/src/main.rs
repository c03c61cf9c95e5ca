use anyhow::{Context, Result};
use booksuggest_core::config::{DEFAULT_MAX_FEATURES, DEFAULT_TAGS_PER_BOOK};
use booksuggest_core::persist::{load_index_for, save_index, IndexPaths};
use booksuggest_core::{Catalog, KeywordExtractor, StopWords, TfidfKeywordExtractor, Vectorizer, VectorizerConfig};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and check the TF-IDF suggestion index for a book catalog", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the vectorizer over catalog summaries and write index artifacts
    Build {
        /// Catalog file (.csv, .json or .jsonl)
        #[arg(long, env = "BOOKSUGGEST_CATALOG")]
        input: String,
        /// Output index directory
        #[arg(long, env = "BOOKSUGGEST_INDEX")]
        output: String,
        /// Maximum vocabulary size
        #[arg(long, default_value_t = DEFAULT_MAX_FEATURES)]
        max_features: usize,
        /// Use smoothed IDF = ln((1 + N) / (1 + df)) + 1 instead of ln(N / df) + 1
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        smoothed_idf: bool,
        /// Use 1 + ln(tf) instead of raw term counts
        #[arg(long, default_value_t = false)]
        sublinear_tf: bool,
        /// Keep English stop words in the vocabulary
        #[arg(long, default_value_t = false)]
        keep_stop_words: bool,
    },
    /// Check that an index directory is complete and matches the catalog
    Verify {
        #[arg(long, env = "BOOKSUGGEST_CATALOG")]
        input: String,
        #[arg(long, env = "BOOKSUGGEST_INDEX")]
        index: String,
    },
    /// Write the top keyword tags of every book as JSON (id -> tags)
    Tags {
        #[arg(long, env = "BOOKSUGGEST_CATALOG")]
        input: String,
        #[arg(long, env = "BOOKSUGGEST_INDEX")]
        index: String,
        #[arg(long, default_value = "tags.json")]
        output: String,
        #[arg(long, default_value_t = DEFAULT_TAGS_PER_BOOK)]
        top_n: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, max_features, smoothed_idf, sublinear_tf, keep_stop_words } => {
            let config = VectorizerConfig {
                max_features,
                stop_words: if keep_stop_words { StopWords::None } else { StopWords::English },
                smooth_idf: smoothed_idf,
                sublinear_tf,
            };
            build_index(&input, &output, config)
        }
        Commands::Verify { input, index } => verify_index(&input, &index),
        Commands::Tags { input, index, output, top_n } => write_tags(&input, &index, &output, top_n),
    }
}

fn build_index(input: &str, output: &str, config: VectorizerConfig) -> Result<()> {
    let catalog = Catalog::load(input).with_context(|| format!("loading catalog {input}"))?;
    let index = Vectorizer::fit(&catalog, config);
    let meta = save_index(&IndexPaths::new(output), &index).with_context(|| format!("writing index to {output}"))?;
    tracing::info!(
        output,
        num_docs = meta.num_docs,
        vocab_size = meta.vocab_size,
        catalog = %meta.catalog_fingerprint,
        "index build complete"
    );
    Ok(())
}

fn verify_index(input: &str, index_dir: &str) -> Result<()> {
    let catalog = Catalog::load(input).with_context(|| format!("loading catalog {input}"))?;
    let index = load_index_for(&IndexPaths::new(index_dir), &catalog)
        .with_context(|| format!("index {index_dir} is not usable with {input}"))?;
    tracing::info!(index_dir, num_docs = index.ids.len(), vocab_size = index.vectorizer.dim(), "index is current");
    Ok(())
}

fn write_tags(input: &str, index_dir: &str, output: &str, top_n: usize) -> Result<()> {
    let catalog = Catalog::load(input).with_context(|| format!("loading catalog {input}"))?;
    let index = load_index_for(&IndexPaths::new(index_dir), &catalog)?;
    let tags = tag_catalog(&catalog, &TfidfKeywordExtractor::new(index.vectorizer), top_n)?;

    if let Some(dir) = Path::new(output).parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    let mut out = BufWriter::new(File::create(output).with_context(|| format!("creating {output}"))?);
    serde_json::to_writer_pretty(&mut out, &tags)?;
    out.write_all(b"\n")?;
    out.flush()?;
    tracing::info!(output, books = tags.len(), "tags written");
    Ok(())
}

fn tag_catalog(catalog: &Catalog, extractor: &dyn KeywordExtractor, top_n: usize) -> Result<BTreeMap<i64, Vec<String>>> {
    let mut tags = BTreeMap::new();
    for r in catalog.records() {
        let t = extractor.extract(&r.summary, top_n).with_context(|| format!("extracting tags for book {}", r.id))?;
        tags.insert(r.id, t);
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "index,title,summary\n1,Dune,spice spice desert\n2,Emma,matchmaking in a village\n";

    #[test]
    fn build_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("books.csv");
        fs::write(&csv, CSV).unwrap();
        let out = dir.path().join("index");
        let (csv, out) = (csv.to_str().unwrap(), out.to_str().unwrap());

        assert!(verify_index(csv, out).is_err());
        build_index(csv, out, VectorizerConfig::default()).unwrap();
        verify_index(csv, out).unwrap();
    }

    #[test]
    fn tags_cover_every_book() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("books.csv");
        fs::write(&csv, CSV).unwrap();
        let out = dir.path().join("index");
        let tags_path = dir.path().join("tags.json");
        build_index(csv.to_str().unwrap(), out.to_str().unwrap(), VectorizerConfig::default()).unwrap();
        write_tags(csv.to_str().unwrap(), out.to_str().unwrap(), tags_path.to_str().unwrap(), 1).unwrap();

        let tags: BTreeMap<i64, Vec<String>> = serde_json::from_slice(&fs::read(&tags_path).unwrap()).unwrap();
        assert_eq!(tags[&1], vec!["spice"]);
        assert_eq!(tags[&2].len(), 1);
    }

    #[test]
    fn tags_output_directory_is_created_or_reported() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("books.csv");
        fs::write(&csv, CSV).unwrap();
        let (csv, out) = (csv.to_str().unwrap().to_string(), dir.path().join("index").to_str().unwrap().to_string());
        build_index(&csv, &out, VectorizerConfig::default()).unwrap();

        let nested = dir.path().join("reports").join("tags.json");
        write_tags(&csv, &out, nested.to_str().unwrap(), 1).unwrap();
        assert!(nested.exists());

        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let target = blocker.join("tags.json");
        let err = write_tags(&csv, &out, target.to_str().unwrap(), 1).unwrap_err();
        assert!(err.to_string().contains("creating output directory"), "{err:#}");
        assert!(err.to_string().contains("blocker"), "{err:#}");
    }
}
