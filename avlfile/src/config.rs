//! Index configuration module.
//!
//! This module provides configuration loading for the `avlfile` binary from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `AVLFILE_PATH`: Path of the index file (default: `./sales_avl.dat`)
//! - `AVLFILE_PERSISTENCE`: `in-place` or `rewrite` (default: `in-place`)
//!
//! # Invariants
//!
//! - `path` is never empty (the file may not exist yet)
//! - `persistence` is one of the supported modes

use std::path::PathBuf;

use crate::storage::PersistenceMode;

const PATH_VAR: &str = "AVLFILE_PATH";
const PERSISTENCE_VAR: &str = "AVLFILE_PERSISTENCE";

/// Index configuration.
///
/// Built once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Index file. Created with an empty tree if it does not exist.
    pub path: PathBuf,
    /// How mutations reach the file.
    pub persistence: PersistenceMode,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl IndexConfig {
    /// Default index file.
    pub const DEFAULT_PATH: &'static str = "./sales_avl.dat";

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `AVLFILE_PATH` is set but empty
    /// - `AVLFILE_PERSISTENCE` is set but not a known mode
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = Self::load_path(&lookup)?;
        let persistence = Self::load_persistence(&lookup)?;
        Ok(Self { path, persistence })
    }

    fn load_path(lookup: &impl Fn(&str) -> Option<String>) -> Result<PathBuf, ConfigError> {
        match lookup(PATH_VAR) {
            Some(value) if value.is_empty() => Err(ConfigError::InvalidValue {
                name: PATH_VAR.to_string(),
                message: "must not be empty".to_string(),
            }),
            Some(value) => Ok(PathBuf::from(value)),
            None => Ok(PathBuf::from(Self::DEFAULT_PATH)),
        }
    }

    fn load_persistence(
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<PersistenceMode, ConfigError> {
        lookup(PERSISTENCE_VAR).map_or(Ok(PersistenceMode::default()), |value| {
            value
                .parse::<PersistenceMode>()
                .map_err(|message| ConfigError::InvalidValue {
                    name: PERSISTENCE_VAR.to_string(),
                    message,
                })
        })
    }
}
