use reqwest::{Client, Url};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
}

pub trait AssetFetcher {
    /// Make sure `path` exists locally, downloading it from `url` if it
    /// does not. A present file is never re-fetched or checked.
    fn ensure(&self, path: &Path, url: &str) -> impl Future<Output = Result<(), FetchError>> + Send;
}

pub struct HttpAssetFetcher {
    client: Client,
}

impl HttpAssetFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> FetchError + '_ {
    move |source| FetchError::Io { path: path.to_path_buf(), source }
}

// Download target while in flight: `.<name>.part` next to the final file.
fn partial_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!(".{name}.part"))
}

impl AssetFetcher for HttpAssetFetcher {
    async fn ensure(&self, path: &Path, url: &str) -> Result<(), FetchError> {
        if tokio::fs::try_exists(path).await.map_err(io_err(path))? {
            tracing::info!(path = %path.display(), "already exists, skipping");
            return Ok(());
        }
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl { url: url.to_string(), source })?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(io_err(dir))?;
        }

        tracing::info!(path = %path.display(), url, "downloading");
        let resp = self.client.get(parsed).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: resp.status().as_u16() });
        }
        let bytes = resp.bytes().await?;

        let part = partial_path(path);
        tokio::fs::write(&part, &bytes).await.map_err(io_err(&part))?;
        tokio::fs::rename(&part, path).await.map_err(io_err(path))?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpAssetFetcher {
        HttpAssetFetcher::new("booksuggest-fetcher-test", Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn existing_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("books.csv");
        std::fs::write(&p, "local copy").unwrap();
        // the url is never contacted
        fetcher().ensure(&p, "http://127.0.0.1:9/books.csv").await.unwrap();
        fetcher().ensure(&p, "not even a url").await.unwrap();
        assert_eq!(std::fs::read_to_string(&p).unwrap(), "local copy");
    }

    #[tokio::test]
    async fn invalid_url_is_reported_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("model").join("genre.json");
        let err = fetcher().ensure(&p, "::nope::").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert!(!p.exists());
        assert!(!dir.path().join("model").exists());
    }

    #[test]
    fn partial_file_is_a_hidden_sibling() {
        assert_eq!(partial_path(Path::new("data/books.csv")), PathBuf::from("data/.books.csv.part"));
    }
}
