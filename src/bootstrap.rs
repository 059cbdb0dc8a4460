//! Local data-source preparation.
//!
//! Workers expect `<data_dir>/<source>.csv` for every registered source. When the directory is
//! unreadable or misses a source file, the whole master directory is copied over it before
//! ingestion starts. CSV files that belong to no registered source are logged and left alone.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::types::SourceSet;

/// Returns `true` if `data_dir` must be (re)supplied from the master copy.
pub fn needs_supply(data_dir: &Path, sources: &SourceSet) -> bool {
    if let Err(err) = fs::read_dir(data_dir) {
        tracing::info!(dir = %data_dir.display(), "data directory not readable: {err}");
        return true;
    }

    if let Some(missing) = sources.iter().find(|s| !s.path().is_file()) {
        tracing::info!(source = missing.name(), path = %missing.path().display(), "source file missing");
        return true;
    }
    false
}

/// CSV files in `data_dir` that belong to no registered source.
///
/// These are left alone; a run over a subset of the master files is expected to see them.
pub fn unregistered_files(data_dir: &Path, sources: &SourceSet) -> Vec<PathBuf> {
    let registered: HashSet<&Path> = sources.iter().map(|s| s.path()).collect();
    let pattern = format!("{}/*.csv", glob::Pattern::escape(&data_dir.to_string_lossy()));
    let Ok(entries) = glob::glob(&pattern) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|entry| !registered.contains(entry.as_path()))
        .collect()
}

/// Recursively copy `master` into `data_dir`, overwriting existing files.
///
/// Returns the number of files copied.
pub fn supply(master: &Path, data_dir: &Path) -> IngestResult<usize> {
    if !master.is_dir() {
        return Err(IngestError::Bootstrap {
            message: format!("master directory '{}' does not exist", master.display()),
        });
    }

    let mut copied = 0usize;
    for entry in walkdir::WalkDir::new(master).follow_links(true) {
        let entry = entry.map_err(|e| IngestError::Bootstrap {
            message: format!("walk '{}': {e}", master.display()),
        })?;
        let rel = entry
            .path()
            .strip_prefix(master)
            .map_err(|e| IngestError::Bootstrap { message: e.to_string() })?;
        let target = data_dir.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    tracing::info!(
        master = %master.display(),
        data_dir = %data_dir.display(),
        copied,
        "data source supplied"
    );
    Ok(copied)
}

/// Make sure the configured data directory holds every source file.
pub fn ensure_data_source(config: &IngestConfig, sources: &SourceSet) -> IngestResult<()> {
    if !needs_supply(&config.data_dir, sources) {
        warn_unregistered(&config.data_dir, sources);
        return Ok(());
    }
    let Some(master) = &config.master_dir else {
        return Err(IngestError::Bootstrap {
            message: format!(
                "'{}' is incomplete and {} is not set",
                config.data_dir.display(),
                crate::config::ENV_DATA_MASTER
            ),
        });
    };
    supply(master, &config.data_dir)?;
    if needs_supply(&config.data_dir, sources) {
        return Err(IngestError::Bootstrap {
            message: format!(
                "'{}' still lacks registered source files after copying '{}'",
                config.data_dir.display(),
                master.display()
            ),
        });
    }
    warn_unregistered(&config.data_dir, sources);
    Ok(())
}

fn warn_unregistered(data_dir: &Path, sources: &SourceSet) {
    for file in unregistered_files(data_dir, sources) {
        tracing::warn!(file = %file.display(), "csv file is not a registered source, ignoring it");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{ensure_data_source, needs_supply, supply, unregistered_files};
    use crate::config::IngestConfig;
    use crate::types::SourceSet;

    #[test]
    fn complete_directory_needs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "x\n").unwrap();
        fs::write(dir.path().join("b.csv"), "x\n").unwrap();
        let sources = SourceSet::from_dir(dir.path(), ["a", "b"]).unwrap();
        assert!(!needs_supply(dir.path(), &sources));
    }

    #[test]
    fn missing_file_or_absent_directory_needs_supply() {
        let dir = tempfile::tempdir().unwrap();
        let sources = SourceSet::from_dir(dir.path(), ["a"]).unwrap();
        assert!(needs_supply(dir.path(), &sources));

        let gone = dir.path().join("nope");
        let sources = SourceSet::from_dir(&gone, ["a"]).unwrap();
        assert!(needs_supply(&gone, &sources));
    }

    #[test]
    fn unregistered_csv_files_are_reported_but_need_no_supply() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "x\n").unwrap();
        fs::write(dir.path().join("stray.csv"), "x\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x\n").unwrap();
        let sources = SourceSet::from_dir(dir.path(), ["a"]).unwrap();

        assert!(!needs_supply(dir.path(), &sources));
        assert_eq!(unregistered_files(dir.path(), &sources), vec![dir.path().join("stray.csv")]);
    }

    #[test]
    fn glob_metacharacters_in_data_dir_are_literal() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data[1]");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("a.csv"), "x\n").unwrap();
        fs::write(dir.join("b.csv"), "x\n").unwrap();
        // "data1" would match the unescaped pattern "data[1]".
        let lookalike = root.path().join("data1");
        fs::create_dir(&lookalike).unwrap();
        fs::write(lookalike.join("c.csv"), "x\n").unwrap();
        let sources = SourceSet::from_dir(&dir, ["a"]).unwrap();

        assert_eq!(unregistered_files(&dir, &sources), vec![dir.join("b.csv")]);
    }

    #[test]
    fn supply_copies_master_tree() {
        let master = tempfile::tempdir().unwrap();
        fs::write(master.path().join("a.csv"), "name\nAle\n").unwrap();
        fs::create_dir(master.path().join("extra")).unwrap();
        fs::write(master.path().join("extra").join("notes.txt"), "n").unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("a.csv"), "stale\n").unwrap();

        let copied = supply(master.path(), data.path()).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(data.path().join("a.csv")).unwrap(), "name\nAle\n");
        assert!(data.path().join("extra").join("notes.txt").is_file());
    }

    #[test]
    fn ensure_requires_a_master_when_incomplete() {
        let data = tempfile::tempdir().unwrap();
        let config = IngestConfig {
            data_dir: data.path().to_path_buf(),
            sources: vec!["a".to_string()],
            ..IngestConfig::default()
        };
        let sources = config.source_set().unwrap();
        let err = ensure_data_source(&config, &sources).unwrap_err();
        assert_eq!(err.operation(), "Supply data source");

        let master = tempfile::tempdir().unwrap();
        fs::write(master.path().join("a.csv"), "name\n").unwrap();
        let config = IngestConfig {
            master_dir: Some(master.path().to_path_buf()),
            ..config
        };
        ensure_data_source(&config, &sources).unwrap();
        assert!(data.path().join("a.csv").is_file());
    }

    #[test]
    fn subset_of_master_sources_is_supplied_and_accepted() {
        let master = tempfile::tempdir().unwrap();
        for name in ["contacts-au", "contacts-ca", "contacts-uk", "contacts-us"] {
            fs::write(master.path().join(format!("{name}.csv")), "name\n").unwrap();
        }
        let work = tempfile::tempdir().unwrap();
        let config = IngestConfig {
            data_dir: work.path().join("data"),
            master_dir: Some(master.path().to_path_buf()),
            sources: vec!["contacts-au".to_string()],
            ..IngestConfig::default()
        };
        let sources = config.source_set().unwrap();

        // First run copies the whole master; the second finds everything in place.
        ensure_data_source(&config, &sources).unwrap();
        assert!(config.data_dir.join("contacts-us.csv").is_file());
        ensure_data_source(&config, &sources).unwrap();
        assert!(!needs_supply(&config.data_dir, &sources));
    }
}
