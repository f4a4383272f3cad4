//! HTTP transport: listing-page fetches and streaming file downloads with
//! byte-offset resume.
//!
//! The [`Transport`] trait is the seam between the download pipeline and the
//! network, so tests can substitute a mock and count calls. The real
//! implementation is a thin wrapper over one shared `reqwest::Client`.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::Client;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Observational progress callback: `(total_bytes, transferred_so_far)`.
/// `total_bytes` is `None` when the server sends no content length.
pub type ProgressFn<'a> = &'a (dyn Fn(Option<u64>, u64) + Send + Sync);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error requesting {url}: {source}")]
    Http { source: reqwest::Error, url: String },

    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Disk error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether the failure is transient and worth retrying when the user
    /// opted into retries. Disk errors never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Http { .. } => true,
            FetchError::Io(_) => false,
        }
    }
}

/// The network operations the download pipeline depends on.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// GET `<root>/<path>?<query>` and return the body as text.
    async fn fetch_page(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<String, FetchError>;

    /// Stream `<root>/<path>` to `dest`, returning the bytes written by
    /// this call.
    ///
    /// `resume_offset > 0` opens `dest` for append and asks the server to
    /// resume from that byte via a `Range` header; `0` creates or truncates
    /// the file. On failure, bytes already written stay on disk so a later
    /// run can resume.
    async fn fetch_file(
        &self,
        path: &str,
        dest: &Path,
        resume_offset: u64,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, FetchError>;
}

/// [`Transport`] over HTTP against a fixed root server.
pub struct HttpFetcher {
    client: Client,
    root: String,
}

impl HttpFetcher {
    pub fn new(client: Client, root: impl Into<String>) -> Self {
        Self {
            client,
            root: root.into(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.is_empty() {
            self.root.clone()
        } else {
            format!("{}/{}", self.root, path.trim_start_matches('/'))
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpFetcher {
    async fn fetch_page(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let url = self.url_for(path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                source: e,
                url: url.clone(),
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        response.text().await.map_err(|e| FetchError::Http {
            source: e,
            url,
        })
    }

    async fn fetch_file(
        &self,
        path: &str,
        dest: &Path,
        resume_offset: u64,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, FetchError> {
        let url = self.url_for(path);
        let mut request = self.client.get(&url);
        if resume_offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", resume_offset));
        }

        let response = request.send().await.map_err(|e| FetchError::Http {
            source: e,
            url: url.clone(),
        })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        // Content length covers the remaining bytes on a ranged request;
        // report the full expected size so progress starts at the offset.
        let total = response.content_length().map(|len| len + resume_offset);

        let mut file = if resume_offset > 0 {
            OpenOptions::new().append(true).open(dest).await?
        } else {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(dest)
                .await?
        };

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Http {
                source: e,
                url: url.clone(),
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            on_progress(total, resume_offset + written);
        }
        file.flush().await?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_joins_root_and_path() {
        let f = HttpFetcher::new(Client::new(), "http://example.com");
        assert_eq!(f.url_for(""), "http://example.com");
        assert_eq!(f.url_for("get/build.zip"), "http://example.com/get/build.zip");
        assert_eq!(f.url_for("/get/build.zip"), "http://example.com/get/build.zip");
    }

    #[test]
    fn status_5xx_and_429_retryable() {
        assert!(FetchError::Status {
            status: 500,
            url: "x".into()
        }
        .is_retryable());
        assert!(FetchError::Status {
            status: 429,
            url: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn status_404_not_retryable() {
        assert!(!FetchError::Status {
            status: 404,
            url: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn io_error_not_retryable() {
        assert!(!FetchError::Io(std::io::Error::other("disk full")).is_retryable());
    }
}
