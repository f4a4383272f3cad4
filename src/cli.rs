use clap::Parser;

use crate::types::{BuildType, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "romdl", about = "Download Android ROM builds")]
pub struct Cli {
    /// Device codename(s) to fetch builds for (e.g. "hammerhead")
    pub devices: Vec<String>,

    /// ROM build type to download
    #[arg(short = 't', long = "type", value_enum, default_value = "nightly")]
    pub build_type: BuildType,

    /// How many of the latest builds to download per device
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Local base directory for downloads (a per-device subdirectory is
    /// created underneath)
    #[arg(short = 'd', long)]
    pub directory: Option<String>,

    /// Root URL of the download server
    #[arg(long, env = "ROMDL_SERVER", default_value = "https://download.cyanogenmod.org")]
    pub server: String,

    /// List known device codenames and exit
    #[arg(short = 'l', long)]
    pub list_devices: bool,

    /// Re-fetch the device list from the server instead of the local cache
    #[arg(long)]
    pub refresh_devices: bool,

    /// Resolve and print what would be downloaded without transferring
    #[arg(long)]
    pub dry_run: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress_bar: bool,

    /// Retries per file on transient transport failures (0 = no retry)
    #[arg(long, default_value_t = 0)]
    pub max_retries: u32,

    /// Base delay in seconds between retries
    #[arg(long, default_value_t = 5)]
    pub retry_delay: u64,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}
