use std::fmt;

use viewsync_config::shared::StartConfig;

/// Position in the source replication log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplicationPosition {
    pub log_file_name: String,
    pub log_offset: u64,
}

impl ReplicationPosition {
    pub fn new(log_file_name: impl Into<String>, log_offset: u64) -> Self {
        Self {
            log_file_name: log_file_name.into(),
            log_offset,
        }
    }
}

impl fmt::Display for ReplicationPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.log_file_name, self.log_offset)
    }
}

/// Where a log reader subscription starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// The current tail of the log, only future changes are delivered.
    #[default]
    Latest,
    At(ReplicationPosition),
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartPosition::Latest => f.write_str("latest position"),
            StartPosition::At(position) => write!(f, "{position}"),
        }
    }
}

/// How the engine establishes its starting point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMode {
    /// Run the init statements and stream from the position captured with them.
    Bootstrap,
    /// Stream from the given position without bootstrapping.
    Stream(StartPosition),
}

impl From<&StartConfig> for LaunchMode {
    fn from(config: &StartConfig) -> Self {
        match config {
            StartConfig::Bootstrap => LaunchMode::Bootstrap,
            StartConfig::Latest => LaunchMode::Stream(StartPosition::Latest),
            StartConfig::Position { file, offset } => LaunchMode::Stream(StartPosition::At(
                ReplicationPosition::new(file.clone(), *offset),
            )),
        }
    }
}
