//! CSV reading for ingest workers.
//!
//! Rules:
//!
//! - The first record is the header: an ordered list of unique, non-empty field names.
//! - Every following record is a data row with exactly one value per header field.
//! - `\r\n`, `\n` and a lone `\r` all end a record, so files written with classic Mac line
//!   endings never have two rows run together.
//! - Values are copied verbatim (standard CSV quoting and escaping apply, no trimming).

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;

use crate::error::{IngestError, IngestResult};
use crate::types::{FieldRecord, SourceDescriptor};

/// Streams [`FieldRecord`]s out of one source's CSV data.
pub struct RowReader<R> {
    source_name: String,
    reader: csv::Reader<R>,
    header: Vec<String>,
    record: csv::StringRecord,
}

impl RowReader<File> {
    /// Open the source's CSV file and read its header.
    pub fn open(source: &SourceDescriptor) -> IngestResult<Self> {
        let file = File::open(source.path()).map_err(|e| IngestError::FileOpen {
            path: source.path().to_path_buf(),
            source: e,
        })?;
        Self::from_reader(source.name(), file)
    }
}

impl<R: Read> RowReader<R> {
    /// Wrap a byte reader and read its header.
    pub fn from_reader(source_name: impl Into<String>, input: R) -> IngestResult<Self> {
        let source_name = source_name.into();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .terminator(csv::Terminator::CRLF)
            .from_reader(input);

        let mut first = csv::StringRecord::new();
        let has_header = reader
            .read_record(&mut first)
            .map_err(|e| parse_error(&source_name, &e))?;
        if !has_header {
            return Err(IngestError::RowParse {
                source_name,
                message: "file is empty, expected a header line".to_string(),
            });
        }
        let header = validate_header(&source_name, &first)?;

        Ok(Self {
            source_name,
            reader,
            header,
            record: csv::StringRecord::new(),
        })
    }

    /// Field names in file order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Read the next data row, or `None` at end of input.
    ///
    /// Each call builds a new record from the current row only.
    pub fn next_record(&mut self) -> IngestResult<Option<FieldRecord>> {
        let more = self
            .reader
            .read_record(&mut self.record)
            .map_err(|e| parse_error(&self.source_name, &e))?;
        if !more {
            return Ok(None);
        }

        if self.record.len() != self.header.len() {
            return Err(IngestError::ArityMismatch {
                source_name: self.source_name.clone(),
                line: self.record.position().map_or(0, |p| p.line()),
                expected: self.header.len(),
                found: self.record.len(),
            });
        }

        Ok(Some(
            self.header
                .iter()
                .map(String::as_str)
                .zip(self.record.iter())
                .collect(),
        ))
    }
}

fn validate_header(source_name: &str, record: &csv::StringRecord) -> IngestResult<Vec<String>> {
    let mut seen = HashSet::with_capacity(record.len());
    let mut header = Vec::with_capacity(record.len());
    for name in record {
        if name.is_empty() {
            return Err(IngestError::RowParse {
                source_name: source_name.to_owned(),
                message: format!("header has an empty field name. header={:?}", record.iter().collect::<Vec<_>>()),
            });
        }
        if !seen.insert(name) {
            return Err(IngestError::RowParse {
                source_name: source_name.to_owned(),
                message: format!("duplicate field name '{name}' in header"),
            });
        }
        header.push(name.to_owned());
    }
    Ok(header)
}

fn parse_error(source_name: &str, err: &csv::Error) -> IngestError {
    IngestError::RowParse {
        source_name: source_name.to_owned(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::RowReader;
    use crate::error::IngestError;
    use crate::types::FieldRecord;

    fn read_all(input: &str) -> Result<(Vec<String>, Vec<FieldRecord>), IngestError> {
        let mut rdr = RowReader::from_reader("people", input.as_bytes())?;
        let mut rows = Vec::new();
        while let Some(row) = rdr.next_record()? {
            rows.push(row);
        }
        Ok((rdr.header().to_vec(), rows))
    }

    fn rec(pairs: &[(&str, &str)]) -> FieldRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn reads_header_then_rows_in_order() {
        let (header, rows) = read_all("name,phone\nAle,+1-1\nCla,+2-2\n").unwrap();
        assert_eq!(header, vec!["name", "phone"]);
        assert_eq!(
            rows,
            vec![
                rec(&[("name", "Ale"), ("phone", "+1-1")]),
                rec(&[("name", "Cla"), ("phone", "+2-2")]),
            ]
        );
    }

    #[test]
    fn lone_carriage_return_ends_a_row() {
        let (_, rows) = read_all("name,phone\rAle,+1-1\rCla,+2-2\r").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name"), Some("Cla"));
        assert_eq!(rows[0].get("phone"), Some("+1-1"));
    }

    #[test]
    fn crlf_and_missing_final_newline_are_accepted() {
        let (_, rows) = read_all("name,phone\r\nAle,+1-1\r\nCla,+2-2").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("phone"), Some("+2-2"));
    }

    #[test]
    fn quoted_values_keep_commas_and_quotes() {
        let (_, rows) = read_all("name,note\n\"Doe, Jane\",\"said \"\"hi\"\"\"\n").unwrap();
        assert_eq!(rows[0].get("name"), Some("Doe, Jane"));
        assert_eq!(rows[0].get("note"), Some("said \"hi\""));
    }

    #[test]
    fn empty_values_are_kept_per_row() {
        let (_, rows) = read_all("name,phone\nAle,+1-1\nCla,\n").unwrap();
        assert_eq!(rows[1].get("phone"), Some(""));
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn header_only_yields_no_rows() {
        let (header, rows) = read_all("name,phone\n").unwrap();
        assert_eq!(header.len(), 2);
        assert!(rows.is_empty());
    }

    #[test]
    fn short_row_is_an_arity_mismatch() {
        let err = read_all("name,phone\nAle,+1-1\nCla\n").unwrap_err();
        match err {
            IngestError::ArityMismatch { expected, found, line, .. } => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn long_row_is_an_arity_mismatch() {
        let err = read_all("name,phone\nAle,+1-1,extra\n").unwrap_err();
        assert!(matches!(err, IngestError::ArityMismatch { found: 3, .. }));
        assert_eq!(err.operation(), "Read row");
    }

    #[test]
    fn empty_input_has_no_header() {
        let err = read_all("").unwrap_err();
        assert!(err.to_string().contains("expected a header line"));
    }

    #[test]
    fn duplicate_header_names_are_rejected() {
        let err = read_all("name,name\nA,B\n").unwrap_err();
        assert!(err.to_string().contains("duplicate field name 'name'"));
    }
}
