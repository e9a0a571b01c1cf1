use serde::Deserialize;

use crate::Config;
use crate::shared::{MySqlConnectionConfig, ValidationError};

/// Query reading the current binary log file and offset of the server.
pub const DEFAULT_POSITION_QUERY: &str = "SHOW MASTER STATUS";

fn default_position_query() -> String {
    DEFAULT_POSITION_QUERY.to_string()
}

/// Where the incremental stream starts when the engine is launched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum StartConfig {
    /// Populate the views through their init statements and stream from the position captured
    /// in the same transaction.
    Bootstrap,
    /// Only capture changes committed from now on.
    #[default]
    Latest,
    /// Resume from an operator-provided position, skipping bootstrap.
    Position { file: String, offset: u64 },
}

/// Configuration of a view engine instance.
///
/// Views themselves are registered in code, since computed views carry closures.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Name of the engine, attached to every log line emitted by its workers.
    pub name: String,
    /// Store the views are materialized into.
    pub destination: MySqlConnectionConfig,
    /// Server whose replication log is tailed.
    pub source: MySqlConnectionConfig,
    #[serde(default)]
    pub start: StartConfig,
    /// Query returning the current log file and offset, `SHOW BINARY LOG STATUS` on servers
    /// that removed `SHOW MASTER STATUS`.
    #[serde(default = "default_position_query")]
    pub position_query: String,
}

impl Config for EngineConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyEngineName);
        }

        if self.position_query.trim().is_empty() {
            return Err(ValidationError::EmptyPositionQuery);
        }

        if let StartConfig::Position { file, .. } = &self.start {
            if file.is_empty() {
                return Err(ValidationError::EmptyLogFileName);
            }
        }

        self.destination.validate()?;
        self.source.validate()
    }
}
