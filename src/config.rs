//! Startup configuration.
//!
//! The program takes no flags; every setting has a default and can be overridden through the
//! environment:
//!
//! | variable             | default                                           |
//! |----------------------|---------------------------------------------------|
//! | `FANOUT_STORE_URI`   | `mongodb://localhost:27017`                       |
//! | `FANOUT_DATABASE`    | `banana`                                          |
//! | `FANOUT_DATA_DIR`    | `data`                                            |
//! | `FANOUT_DATA_MASTER` | unset (no bootstrap copy)                         |
//! | `FANOUT_SOURCES`     | `contacts-au,contacts-ca,contacts-uk,contacts-us` |
//! | `FANOUT_EVENT_LOG`   | unset (no JSON event log)                         |

use std::path::PathBuf;

use crate::error::{IngestError, IngestResult};
use crate::types::SourceSet;

pub const ENV_STORE_URI: &str = "FANOUT_STORE_URI";
pub const ENV_DATABASE: &str = "FANOUT_DATABASE";
pub const ENV_DATA_DIR: &str = "FANOUT_DATA_DIR";
pub const ENV_DATA_MASTER: &str = "FANOUT_DATA_MASTER";
pub const ENV_SOURCES: &str = "FANOUT_SOURCES";
pub const ENV_EVENT_LOG: &str = "FANOUT_EVENT_LOG";

/// Sources registered when `FANOUT_SOURCES` is not set.
pub const DEFAULT_SOURCES: [&str; 4] = ["contacts-au", "contacts-ca", "contacts-uk", "contacts-us"];

/// Immutable configuration for one run, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Address handed to the store's `dial`.
    pub store_uri: String,
    /// Database holding the target collections.
    pub database: String,
    /// Directory with one `<source>.csv` file per source.
    pub data_dir: PathBuf,
    /// Directory copied into `data_dir` when registered source files are missing.
    pub master_dir: Option<PathBuf>,
    /// Registered source names; each one is also its collection name.
    pub sources: Vec<String>,
    /// Optional JSON-lines event log.
    pub event_log: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            store_uri: "mongodb://localhost:27017".to_string(),
            database: "banana".to_string(),
            data_dir: PathBuf::from("data"),
            master_dir: None,
            sources: DEFAULT_SOURCES.iter().map(|s| (*s).to_string()).collect(),
            event_log: None,
        }
    }
}

impl IngestConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> IngestResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> IngestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = non_blank(&lookup, ENV_STORE_URI)? {
            config.store_uri = v;
        }
        if let Some(v) = non_blank(&lookup, ENV_DATABASE)? {
            config.database = v;
        }
        if let Some(v) = non_blank(&lookup, ENV_DATA_DIR)? {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = non_blank(&lookup, ENV_DATA_MASTER)? {
            config.master_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = non_blank(&lookup, ENV_EVENT_LOG)? {
            config.event_log = Some(PathBuf::from(v));
        }
        if let Some(v) = non_blank(&lookup, ENV_SOURCES)? {
            config.sources = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
            if config.sources.is_empty() {
                return Err(IngestError::Config {
                    message: format!("{ENV_SOURCES} lists no source names"),
                });
            }
        }
        Ok(config)
    }

    /// The registered sources, rooted at [`Self::data_dir`].
    pub fn source_set(&self) -> IngestResult<SourceSet> {
        SourceSet::from_dir(&self.data_dir, &self.sources)
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> IngestResult<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Err(IngestError::Config {
            message: format!("{key} is set but empty"),
        }),
        Some(v) => Ok(Some(v.trim().to_owned())),
    }
}
