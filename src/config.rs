use std::path::PathBuf;

use crate::retry::RetryConfig;
use crate::types::BuildType;

/// Resolved application configuration.
///
/// All paths and URLs are resolved here, once; the download pipeline only
/// reads them and never re-derives defaults itself.
#[derive(Debug)]
pub struct Config {
    pub devices: Vec<String>,
    pub build_type: BuildType,
    pub count: usize,
    pub download_dir: PathBuf,
    pub server: String,
    pub device_cache: PathBuf,
    pub list_devices: bool,
    pub refresh_devices: bool,
    pub dry_run: bool,
    pub no_progress_bar: bool,
    pub retry: RetryConfig,
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Default base download directory: `~/romdl`, falling back to the current
/// directory when no home is resolvable.
fn default_download_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join("romdl"))
        .unwrap_or_else(|| PathBuf::from("romdl"))
}

/// Location of the cached device list: `<data dir>/romdl/devices.list`.
fn device_cache_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("romdl"))
        .unwrap_or_else(|| PathBuf::from(".romdl"))
        .join("devices.list")
}

impl Config {
    pub fn from_cli(cli: crate::cli::Cli) -> anyhow::Result<Self> {
        if cli.count == 0 {
            anyhow::bail!("--count must be at least 1");
        }

        let download_dir = cli
            .directory
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(default_download_dir);

        // Trailing slashes would double up when joined with relative paths.
        let server = cli.server.trim_end_matches('/').to_string();

        Ok(Self {
            devices: cli.devices,
            build_type: cli.build_type,
            count: cli.count,
            download_dir,
            server,
            device_cache: device_cache_path(),
            list_devices: cli.list_devices,
            refresh_devices: cli.refresh_devices,
            dry_run: cli.dry_run,
            no_progress_bar: cli.no_progress_bar,
            retry: RetryConfig {
                max_retries: cli.max_retries,
                base_delay_secs: cli.retry_delay,
                max_delay_secs: 60,
            },
        })
    }
}
