use anyhow::{Context, Result};
use axum::Router;
use booksuggest_core::config::DEFAULT_SCAN_BUDGET;
use booksuggest_core::{EngineOptions, GenreClassifier, LinearGenreModel, SuggestionEngine};
use clap::Parser;
use server::{build_app, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Catalog file the index was built from
    #[arg(long, env = "BOOKSUGGEST_CATALOG", default_value = "./data/books.csv")]
    catalog: String,
    /// Index directory path
    #[arg(long, env = "BOOKSUGGEST_INDEX", default_value = "./index")]
    index: String,
    /// Genre model JSON; /predict-genre answers 503 without it
    #[arg(long, env = "BOOKSUGGEST_GENRE_MODEL")]
    genre_model: Option<String>,
    /// Postings visited per query before similarity candidates are truncated
    #[arg(long, default_value_t = DEFAULT_SCAN_BUDGET)]
    scan_budget: usize,
    /// Host to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = 5001)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let engine = SuggestionEngine::load(&args.catalog, &args.index, EngineOptions { scan_budget: args.scan_budget })
        .with_context(|| format!("starting suggestion engine from {} and {}", args.catalog, args.index))?;
    let classifier: Option<Arc<dyn GenreClassifier>> = match &args.genre_model {
        Some(path) => {
            let model = LinearGenreModel::load(path).with_context(|| format!("loading genre model {path}"))?;
            Some(Arc::new(model))
        }
        None => {
            tracing::warn!("no genre model configured, /predict-genre is disabled");
            None
        }
    };
    let app: Router = build_app(AppState::new(engine, classifier));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
