use std::fmt;

/// ROM build category as understood by the download server's `type=` query
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum BuildType {
    Stable,
    Nightly,
    Snapshot,
    #[value(name = "rc")]
    ReleaseCandidate,
}

impl BuildType {
    /// The literal value the server expects in the `type=` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Stable => "stable",
            BuildType::Nightly => "nightly",
            BuildType::Snapshot => "snapshot",
            BuildType::ReleaseCandidate => "RC",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
