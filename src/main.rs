//! romdl — downloads Android ROM builds from an HTML distribution site.
//!
//! The server exposes no API; build listings, device lists, and MD5 digests
//! are scraped from fixed markers in its HTML. Files are streamed to disk
//! with byte-offset resume and re-verified against the scraped digest.

#![warn(clippy::all)]

mod checksum;
mod cli;
mod config;
mod devices;
mod fetch;
pub mod retry;
mod rom;
mod scrape;
mod shutdown;
mod types;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fetch::{HttpFetcher, Transport};
use rom::RomStatus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = config::Config::from_cli(cli)?;

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()?;
    let transport: Arc<dyn Transport> = Arc::new(HttpFetcher::new(client, config.server.clone()));

    if config.list_devices {
        let devices =
            devices::list_devices(transport.as_ref(), &config.device_cache, config.refresh_devices)
                .await?;
        for device in devices {
            println!("{}", device);
        }
        return Ok(());
    }

    if config.devices.is_empty() {
        anyhow::bail!("no devices given; pass codenames or use --list-devices");
    }

    let shutdown_token = shutdown::install_signal_handler();
    let pipeline = rom::Pipeline::new(
        transport,
        config.retry.clone(),
        config.no_progress_bar,
    );

    // Devices are processed strictly in request order, one ROM at a time.
    // A failure for one device is reported and the batch moves on.
    let mut downloaded = 0usize;
    let mut skipped = 0usize;
    let mut failures = 0usize;

    'devices: for device in &config.devices {
        if shutdown_token.is_cancelled() {
            tracing::info!("Shutdown requested, stopping batch");
            break;
        }

        let entries = match pipeline
            .resolve_latest_many(device, config.build_type, config.count)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("{}: {}", device, e);
                failures += 1;
                continue;
            }
        };

        for entry in &entries {
            if shutdown_token.is_cancelled() {
                tracing::info!("Shutdown requested, stopping batch");
                break 'devices;
            }

            if config.dry_run {
                tracing::info!(
                    "[DRY RUN] would download {} ({}, {})",
                    entry.filename,
                    entry.size.as_deref().unwrap_or("size unknown"),
                    entry.date.as_deref().unwrap_or("date unknown"),
                );
                continue;
            }

            match pipeline.download_and_verify(entry, &config.download_dir).await {
                Ok(RomStatus::Skipped) => {
                    tracing::info!("{}: {} is already current", device, entry.filename);
                    skipped += 1;
                }
                Ok(RomStatus::Verified) => {
                    tracing::info!(
                        "{}: {} downloaded to {}",
                        device,
                        entry.filename,
                        config.download_dir.join(device).display()
                    );
                    downloaded += 1;
                }
                Ok(RomStatus::Corrupt) => {
                    tracing::warn!(
                        "{}: checksum mismatch for {}; file kept for inspection",
                        device,
                        entry.filename
                    );
                    failures += 1;
                }
                Err(e) => {
                    tracing::error!("{}: {}: {}", device, entry.filename, e);
                    failures += 1;
                }
            }
        }
    }

    if !config.dry_run {
        tracing::info!("── Summary ──");
        tracing::info!(
            "  {} downloaded, {} already current, {} failed",
            downloaded,
            skipped,
            failures
        );
    }

    if failures > 0 {
        anyhow::bail!("{} ROM(s) failed", failures);
    }
    Ok(())
}
