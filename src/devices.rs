//! Local device-list cache.
//!
//! The server's front page lists every supported device; scraping it on
//! every invocation is wasteful, so the ids are cached in a plain text
//! file: an optional leading `#` date comment, then one codename per line.

use std::path::Path;

use anyhow::Context;
use chrono::Local;

use crate::fetch::Transport;
use crate::scrape;

/// Relative path of the device-list page on the server.
const DEVICE_LIST_PATH: &str = "";

/// Known device codenames, from the cache when possible.
///
/// `refresh` (or a missing/empty cache) re-fetches the device-list page,
/// scrapes it, and rewrites the cache. A cache write failure is logged but
/// does not fail the listing.
pub async fn list_devices(
    transport: &dyn Transport,
    cache_path: &Path,
    refresh: bool,
) -> anyhow::Result<Vec<String>> {
    if !refresh {
        match read_cache(cache_path) {
            Ok(devices) if !devices.is_empty() => {
                tracing::debug!(path = %cache_path.display(), count = devices.len(), "device list from cache");
                return Ok(devices);
            }
            Ok(_) => tracing::debug!("device cache empty, refetching"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %cache_path.display(), "unreadable device cache: {}", e),
        }
    }

    let page = transport
        .fetch_page(DEVICE_LIST_PATH, &[])
        .await
        .context("fetching device list page")?;
    let devices = scrape::device_ids(&page);
    if devices.is_empty() {
        anyhow::bail!("device list page contained no devices");
    }

    if let Err(e) = write_cache(cache_path, &devices) {
        tracing::warn!(path = %cache_path.display(), "could not write device cache: {}", e);
    }

    Ok(devices)
}

/// Read cached device ids, skipping `#` comments and blank lines.
fn read_cache(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Rewrite the cache with a fetch-date comment followed by one id per line.
fn write_cache(path: &Path, devices: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = format!("# fetched {}\n", Local::now().format("%Y-%m-%d"));
    for device in devices {
        content.push_str(device);
        content.push('\n');
    }
    std::fs::write(path, content)
}
