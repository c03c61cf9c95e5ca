use anyhow::{bail, Context, Result};
use clap::Parser;
use fetcher::{AssetFetcher, HttpAssetFetcher};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "fetcher")]
#[command(about = "Download catalog and model assets that are not present locally")]
struct Cli {
    /// JSON manifest mapping local paths to download URLs
    #[arg(long, default_value = "./assets.json")]
    manifest: String,
    /// Request timeout seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
    /// User-Agent string sent with every download
    #[arg(long, default_value = "booksuggest-fetcher/0.1")]
    user_agent: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let text = std::fs::read_to_string(&args.manifest).with_context(|| format!("reading manifest {}", args.manifest))?;
    let assets: BTreeMap<String, String> =
        serde_json::from_str(&text).with_context(|| format!("parsing manifest {}", args.manifest))?;
    let fetcher = HttpAssetFetcher::new(&args.user_agent, Duration::from_secs(args.timeout_secs))?;

    let mut failed = 0usize;
    for (path, url) in &assets {
        if let Err(e) = fetcher.ensure(Path::new(path), url).await {
            tracing::error!(path, error = %e, "download failed");
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} assets could not be fetched", assets.len());
    }
    tracing::info!(assets = assets.len(), "all assets present");
    Ok(())
}
