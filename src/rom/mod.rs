//! ROM resolution and the download-and-verify pipeline.
//!
//! Per ROM the steps always run in the same order: resolve the listing page
//! and scrape filename + digest, check any local copy, fetch (fresh or
//! resumed), then re-verify the digest. One ROM at a time; the only shared
//! state across iterations is the HTTP client inside the transport.

pub mod error;

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

pub use error::DownloadError;

use crate::checksum;
use crate::fetch::Transport;
use crate::retry::{self, RetryAction, RetryConfig};
use crate::scrape;
use crate::types::BuildType;

/// Relative path of the build-listing and device-list page on the server.
const LISTING_PATH: &str = "";

/// One build record scraped from a listing page. Filename and checksum are
/// fixed for the duration of an operation once scraped.
#[derive(Debug, Clone)]
pub struct RomEntry {
    pub device: String,
    pub build_type: BuildType,
    pub filename: String,
    /// Digest as advertised by the page. Empty when the page carried no
    /// `md5sum:` label for this file; an empty digest never matches a
    /// computed one, so such a download always ends `Corrupt`, matching the
    /// original tool's string comparison.
    pub checksum: String,
    pub size: Option<String>,
    pub date: Option<String>,
    /// Download path fragment relative to the server root.
    pub remote_path: String,
}

/// Terminal states of a successful pipeline run. Failures are `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomStatus {
    /// Local file already matches the advertised digest; no transfer made.
    Skipped,
    /// Fetched and digest-verified.
    Verified,
    /// Fetched but the digest does not match; the file is kept on disk.
    Corrupt,
}

pub struct Pipeline {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    no_progress_bar: bool,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryConfig, no_progress_bar: bool) -> Self {
        Self {
            transport,
            retry,
            no_progress_bar,
        }
    }

    /// Fetch the device's listing page and scrape its newest build.
    pub async fn resolve_latest(
        &self,
        device: &str,
        build_type: BuildType,
    ) -> Result<RomEntry, DownloadError> {
        let mut entries = self.resolve_latest_many(device, build_type, 1).await?;
        Ok(entries.remove(0))
    }

    /// Fetch the device's listing page and scrape up to `count` builds,
    /// newest first. An unscrapable page is `NoRomFound`.
    pub async fn resolve_latest_many(
        &self,
        device: &str,
        build_type: BuildType,
        count: usize,
    ) -> Result<Vec<RomEntry>, DownloadError> {
        let page = self
            .transport
            .fetch_page(
                LISTING_PATH,
                &[("device", device), ("type", build_type.as_str())],
            )
            .await?;

        let filenames = scrape::latest_rom_filenames(&page, count);
        if filenames.is_empty() {
            return Err(DownloadError::NoRomFound {
                device: device.to_string(),
                build_type,
            });
        }

        let entries = filenames
            .into_iter()
            .map(|filename| {
                let checksum = scrape::checksum_for(&page, &filename).unwrap_or_default();
                if checksum.is_empty() {
                    tracing::warn!(device, %filename, "listing page carries no md5sum");
                } else if !checksum::is_md5_hex(&checksum) {
                    tracing::warn!(device, %filename, checksum, "scraped digest is not 32 hex chars");
                }
                RomEntry {
                    device: device.to_string(),
                    build_type,
                    remote_path: format!("get/{}", filename),
                    checksum,
                    size: scrape::cell_after(&page, &filename, 1),
                    date: scrape::cell_after(&page, &filename, 2),
                    filename,
                }
            })
            .collect();

        Ok(entries)
    }

    /// Download one ROM into `<base_dir>/<device>/` and verify its digest.
    ///
    /// An existing file whose digest already matches is skipped without any
    /// transfer. An existing file with a different digest is resumed from
    /// its current size; the partial bytes are trusted to be a valid prefix
    /// of the remote file (no range-integrity check before resuming — a
    /// known weakness inherited from the original tool). On transport
    /// failure the partial file stays on disk so the next run can resume.
    pub async fn download_and_verify(
        &self,
        entry: &RomEntry,
        base_dir: &Path,
    ) -> Result<RomStatus, DownloadError> {
        let device_dir = base_dir.join(&entry.device);
        tokio::fs::create_dir_all(&device_dir).await?;
        let local = device_dir.join(&entry.filename);

        let mut resume_offset = 0u64;
        match tokio::fs::metadata(&local).await {
            Ok(meta) if meta.is_file() => {
                let digest = checksum::md5_file(&local).await?;
                if digest == entry.checksum {
                    tracing::info!(path = %local.display(), "already downloaded and verified");
                    return Ok(RomStatus::Skipped);
                }
                resume_offset = meta.len();
                tracing::info!(
                    path = %local.display(),
                    offset = resume_offset,
                    "local file incomplete, resuming"
                );
            }
            _ => {}
        }

        self.fetch_with_retry(entry, &local, resume_offset).await?;

        let digest = checksum::md5_file(&local).await?;
        if digest == entry.checksum {
            tracing::info!(path = %local.display(), "download verified");
            Ok(RomStatus::Verified)
        } else {
            // Keep the file for inspection or a manual retry.
            tracing::warn!(
                path = %local.display(),
                expected = entry.checksum,
                actual = digest,
                "checksum mismatch after download, keeping file"
            );
            Ok(RomStatus::Corrupt)
        }
    }

    async fn fetch_with_retry(
        &self,
        entry: &RomEntry,
        local: &Path,
        resume_offset: u64,
    ) -> Result<(), DownloadError> {
        let pb = create_progress_bar(self.no_progress_bar);
        pb.set_message(entry.filename.clone());

        let result = retry::retry_with_backoff(
            &self.retry,
            |e: &crate::fetch::FetchError| {
                if e.is_retryable() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            || async {
                // Re-stat on each attempt: a failed attempt may have
                // appended bytes that the next one should resume past.
                let offset = match tokio::fs::metadata(local).await {
                    Ok(meta) if meta.is_file() => meta.len(),
                    _ => resume_offset,
                };
                self.transport
                    .fetch_file(
                        &entry.remote_path,
                        local,
                        offset,
                        &|total, done| {
                            if let Some(total) = total {
                                pb.set_length(total);
                            }
                            pb.set_position(done);
                        },
                    )
                    .await
            },
        )
        .await;

        pb.finish_and_clear();
        result?;
        Ok(())
    }
}

/// Byte-count progress bar, hidden when disabled or stdout is not a TTY.
fn create_progress_bar(no_progress_bar: bool) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}",
        )
        .expect("valid template")
        .progress_chars("=> "),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, ProgressFn};
    use std::fs;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// In-memory transport serving one canned page and one canned file
    /// body, with call counters and a record of requested resume offsets.
    struct MockTransport {
        page: String,
        body: Vec<u8>,
        fail_file_fetch: bool,
        page_calls: AtomicU32,
        file_calls: AtomicU32,
        offsets: Mutex<Vec<u64>>,
    }

    impl MockTransport {
        fn new(page: &str, body: &[u8]) -> Self {
            Self {
                page: page.to_string(),
                body: body.to_vec(),
                fail_file_fetch: false,
                page_calls: AtomicU32::new(0),
                file_calls: AtomicU32::new(0),
                offsets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn fetch_page(
            &self,
            _path: &str,
            _query: &[(&str, &str)],
        ) -> Result<String, FetchError> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.page.clone())
        }

        async fn fetch_file(
            &self,
            _path: &str,
            dest: &Path,
            resume_offset: u64,
            on_progress: ProgressFn<'_>,
        ) -> Result<u64, FetchError> {
            self.file_calls.fetch_add(1, Ordering::SeqCst);
            self.offsets.lock().unwrap().push(resume_offset);
            if self.fail_file_fetch {
                return Err(FetchError::Status {
                    status: 503,
                    url: "mock".into(),
                });
            }
            let remainder = &self.body[resume_offset as usize..];
            if resume_offset > 0 {
                let mut existing = fs::read(dest)?;
                existing.extend_from_slice(remainder);
                fs::write(dest, existing)?;
            } else {
                fs::write(dest, remainder)?;
            }
            on_progress(Some(self.body.len() as u64), self.body.len() as u64);
            Ok(remainder.len() as u64)
        }
    }

    const BODY: &[u8] = b"rom zip payload bytes";

    fn body_md5() -> String {
        format!("{:x}", md5::compute(BODY))
    }

    fn listing_page() -> String {
        format!(
            r#"<tr>
                 <td><a href="get/cm-11-20140101-NIGHTLY-mako.zip">cm-11-20140101-NIGHTLY-mako.zip</a></td>
                 <td>190.4 MB</td><td>2014-01-01</td>
                 <td>md5sum: {}</td>
               </tr>"#,
            body_md5()
        )
    }

    fn pipeline(transport: Arc<MockTransport>) -> Pipeline {
        Pipeline::new(transport, RetryConfig::default(), true)
    }

    fn entry(checksum: &str) -> RomEntry {
        RomEntry {
            device: "mako".into(),
            build_type: BuildType::Nightly,
            filename: "cm-11-20140101-NIGHTLY-mako.zip".into(),
            checksum: checksum.into(),
            size: None,
            date: None,
            remote_path: "get/cm-11-20140101-NIGHTLY-mako.zip".into(),
        }
    }

    #[tokio::test]
    async fn resolve_latest_scrapes_entry() {
        let transport = Arc::new(MockTransport::new(&listing_page(), BODY));
        let p = pipeline(transport.clone());
        let entry = p.resolve_latest("mako", BuildType::Nightly).await.unwrap();
        assert_eq!(entry.filename, "cm-11-20140101-NIGHTLY-mako.zip");
        assert_eq!(entry.checksum, body_md5());
        assert_eq!(entry.remote_path, "get/cm-11-20140101-NIGHTLY-mako.zip");
        assert_eq!(entry.size.as_deref(), Some("190.4 MB"));
        assert_eq!(entry.date.as_deref(), Some("2014-01-01"));
        assert_eq!(transport.page_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolve_empty_page_is_no_rom_found() {
        let transport = Arc::new(MockTransport::new("<html>nothing</html>", BODY));
        let p = pipeline(transport);
        let err = p
            .resolve_latest("mako", BuildType::Nightly)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::NoRomFound { .. }));
    }

    #[tokio::test]
    async fn fresh_download_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new(&listing_page(), BODY));
        let p = pipeline(transport.clone());

        let status = p
            .download_and_verify(&entry(&body_md5()), dir.path())
            .await
            .unwrap();
        assert_eq!(status, RomStatus::Verified);
        assert_eq!(*transport.offsets.lock().unwrap(), vec![0]);

        let local = dir.path().join("mako").join("cm-11-20140101-NIGHTLY-mako.zip");
        assert_eq!(fs::read(local).unwrap(), BODY);
    }

    #[tokio::test]
    async fn matching_local_file_skips_without_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let device_dir = dir.path().join("mako");
        fs::create_dir_all(&device_dir).unwrap();
        fs::write(device_dir.join("cm-11-20140101-NIGHTLY-mako.zip"), BODY).unwrap();

        let transport = Arc::new(MockTransport::new(&listing_page(), BODY));
        let p = pipeline(transport.clone());
        let status = p
            .download_and_verify(&entry(&body_md5()), dir.path())
            .await
            .unwrap();
        assert_eq!(status, RomStatus::Skipped);
        assert_eq!(transport.file_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partial_local_file_resumes_from_its_size() {
        let dir = tempfile::tempdir().unwrap();
        let device_dir = dir.path().join("mako");
        fs::create_dir_all(&device_dir).unwrap();
        let partial = &BODY[..7];
        fs::write(device_dir.join("cm-11-20140101-NIGHTLY-mako.zip"), partial).unwrap();

        let transport = Arc::new(MockTransport::new(&listing_page(), BODY));
        let p = pipeline(transport.clone());
        let status = p
            .download_and_verify(&entry(&body_md5()), dir.path())
            .await
            .unwrap();
        assert_eq!(status, RomStatus::Verified);
        assert_eq!(*transport.offsets.lock().unwrap(), vec![7]);

        let local = device_dir.join("cm-11-20140101-NIGHTLY-mako.zip");
        assert_eq!(fs::read(local).unwrap(), BODY);
    }

    #[tokio::test]
    async fn wrong_digest_ends_corrupt_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new(&listing_page(), BODY));
        let p = pipeline(transport);

        let status = p
            .download_and_verify(&entry("00000000000000000000000000000000"), dir.path())
            .await
            .unwrap();
        assert_eq!(status, RomStatus::Corrupt);

        let local = dir.path().join("mako").join("cm-11-20140101-NIGHTLY-mako.zip");
        assert!(local.exists(), "corrupt file must be retained");
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = MockTransport::new(&listing_page(), BODY);
        transport.fail_file_fetch = true;
        let p = pipeline(Arc::new(transport));

        let err = p
            .download_and_verify(&entry(&body_md5()), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Transport(_)));
    }

    #[tokio::test]
    async fn missing_page_checksum_resolves_to_empty_digest() {
        // A page with a download link but no md5sum label: the entry keeps
        // an empty digest, which can never match a computed one.
        let page = r#"<a href="get/build.zip">build.zip</a>"#;
        let transport = Arc::new(MockTransport::new(page, BODY));
        let p = pipeline(transport);
        let entry = p.resolve_latest("mako", BuildType::Nightly).await.unwrap();
        assert_eq!(entry.filename, "build.zip");
        assert!(entry.checksum.is_empty());
    }

    #[test]
    fn progress_bar_hidden_when_disabled() {
        let pb = create_progress_bar(true);
        assert!(pb.is_hidden());
    }
}
