//! Core data model types for ingestion.
//!
//! A run ingests every [`SourceDescriptor`] of a [`SourceSet`]; each CSV data row becomes one
//! [`FieldRecord`] inserted as a document into the source's collection.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::error::{IngestError, IngestResult};

/// One registered dataset: its name, its CSV file and the collection it is loaded into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    name: String,
    path: PathBuf,
    collection: String,
}

impl SourceDescriptor {
    /// Create a new source descriptor.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            collection: collection.into(),
        }
    }

    /// Source name, also shown in the overwrite prompt.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the CSV file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Target collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

/// Immutable registry of sources, built once at startup and handed to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    sources: Vec<SourceDescriptor>,
}

impl SourceSet {
    /// Create a source set.
    ///
    /// Source names and collection names must both be unique, so that every source is handled
    /// by exactly one worker and no two workers write the same collection.
    pub fn new(sources: Vec<SourceDescriptor>) -> IngestResult<Self> {
        let mut names = HashSet::new();
        let mut collections = HashSet::new();
        for source in &sources {
            if !names.insert(source.name()) {
                return Err(IngestError::Config {
                    message: format!("source '{}' is registered twice", source.name()),
                });
            }
            if !collections.insert(source.collection()) {
                return Err(IngestError::Config {
                    message: format!("collection '{}' is targeted by more than one source", source.collection()),
                });
            }
        }
        Ok(Self { sources })
    }

    /// Build a source set where each name maps to `<dir>/<name>.csv` and a collection of the same name.
    pub fn from_dir<I, S>(dir: impl AsRef<Path>, names: I) -> IngestResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dir = dir.as_ref();
        let sources = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                SourceDescriptor::new(name, dir.join(format!("{name}.csv")), name)
            })
            .collect();
        Self::new(sources)
    }

    /// Iterate sources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter()
    }

    /// Look a source up by name.
    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Number of registered sources (and therefore of workers in a run).
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if no source is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl<'a> IntoIterator for &'a SourceSet {
    type Item = &'a SourceDescriptor;
    type IntoIter = std::slice::Iter<'a, SourceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}

/// One CSV data row as a field-name to value mapping.
///
/// Field order follows the header. Collecting pairs with a repeated name keeps the last value,
/// so the key set never holds duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRecord {
    fields: Vec<(String, String)>,
}

impl FieldRecord {
    /// Value of a field, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Field names in header order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// `(name, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn set(&mut self, name: String, value: String) {
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for FieldRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Self::default();
        for (k, v) in iter {
            record.set(k.into(), v.into());
        }
        record
    }
}

impl Serialize for FieldRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Answer given at the overwrite prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationDecision {
    /// Remove the existing documents, then ingest.
    Overwrite,
    /// Leave the collection untouched and insert nothing.
    Skip,
}

/// How a worker finished without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkerOutcome {
    /// Every data row was inserted.
    Inserted { rows: u64 },
    /// The collection was non-empty and the operator chose to skip it.
    Skipped,
    /// A sibling failed; the worker stopped after `inserted` rows.
    Cancelled { inserted: u64 },
}

impl WorkerOutcome {
    /// Number of documents this worker inserted.
    pub fn rows_inserted(&self) -> u64 {
        match self {
            Self::Inserted { rows } => *rows,
            Self::Skipped => 0,
            Self::Cancelled { inserted } => *inserted,
        }
    }
}

/// Per-source outcomes of a successful run, in source registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// `(source name, outcome)` pairs.
    pub outcomes: Vec<(String, WorkerOutcome)>,
}

impl RunSummary {
    /// Outcome of one source, if it was part of the run.
    pub fn outcome(&self, source: &str) -> Option<WorkerOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, outcome)| *outcome)
    }

    /// Total documents inserted across all sources.
    pub fn rows_inserted(&self) -> u64 {
        self.outcomes.iter().map(|(_, o)| o.rows_inserted()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldRecord, SourceDescriptor, SourceSet};

    #[test]
    fn source_set_maps_names_to_csv_files_and_collections() {
        let set = SourceSet::from_dir("data", ["contacts-au", "contacts-us"]).unwrap();
        assert_eq!(set.len(), 2);
        let au = set.get("contacts-au").unwrap();
        assert_eq!(au.path(), std::path::Path::new("data/contacts-au.csv"));
        assert_eq!(au.collection(), "contacts-au");
    }

    #[test]
    fn source_set_rejects_duplicate_names() {
        let err = SourceSet::from_dir("data", ["a", "b", "a"]).unwrap_err();
        assert!(err.to_string().contains("'a' is registered twice"));
    }

    #[test]
    fn source_set_rejects_shared_collection() {
        let err = SourceSet::new(vec![
            SourceDescriptor::new("a", "a.csv", "people"),
            SourceDescriptor::new("b", "b.csv", "people"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("'people'"));
    }

    #[test]
    fn field_record_serializes_as_object_in_header_order() {
        let record: FieldRecord = [("name", "Ale"), ("phone", "+1-1")].into_iter().collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"name":"Ale","phone":"+1-1"}"#);
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["name", "phone"]);
    }

    #[test]
    fn field_record_keeps_one_value_per_name() {
        let record: FieldRecord = [("a", "1"), ("a", "2")].into_iter().collect();
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("a"), Some("2"));
    }
}
