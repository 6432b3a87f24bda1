//! CSV record sink
//!
//! Writes one row per completed record using the original feed-export column
//! order. List-valued columns (colors, packages) are JSON-encoded into their
//! cell, the way the original feeds serialized package details; an empty
//! list becomes an empty cell.

use crate::output::RecordSink;
use crate::record::{VehicleRecord, FIELD_ORDER};
use crate::SinkError;
use csv::Writer;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// CSV sink over any writer
pub struct CsvSink<W: Write> {
    writer: Writer<W>,
}

impl CsvSink<File> {
    /// Creates a sink writing to the given path, truncating an existing file
    pub fn from_path(path: &Path) -> Result<Self, SinkError> {
        let writer = Writer::from_path(path)?;
        Self::from_csv_writer(writer)
    }
}

impl<W: Write> CsvSink<W> {
    /// Creates a sink over an arbitrary writer
    pub fn from_writer(writer: W) -> Result<Self, SinkError> {
        Self::from_csv_writer(Writer::from_writer(writer))
    }

    fn from_csv_writer(mut writer: Writer<W>) -> Result<Self, SinkError> {
        writer.write_record(FIELD_ORDER)?;
        Ok(Self { writer })
    }

    /// Consumes the sink and returns the underlying writer (tests)
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn emit(&mut self, record: &VehicleRecord) -> Result<(), SinkError> {
        let mut row: Vec<String> = Vec::with_capacity(FIELD_ORDER.len());

        for field in FIELD_ORDER {
            let cell = match *field {
                "exteriorColors" => list_cell(&record.exterior_colors)?,
                "interiorColors" => list_cell(&record.interior_colors)?,
                "packages" => list_cell(&record.packages)?,
                scalar => record.scalar(scalar).unwrap_or("").to_string(),
            };
            row.push(cell);
        }

        self.writer.write_record(&row)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// JSON-encodes a list column, empty list -> empty cell
fn list_cell<T: serde::Serialize>(items: &[T]) -> Result<String, SinkError> {
    if items.is_empty() {
        return Ok(String::new());
    }
    Ok(serde_json::to_string(items)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ColorOption;

    fn create_test_record() -> VehicleRecord {
        let mut record = VehicleRecord::seeded("Chevrolet");
        record.model = Some("Silverado".to_string());
        record.year = Some("2025".to_string());
        record.trim = Some("LT".to_string());
        record.msrp = Some("45000".to_string());
        record.exterior_colors.push(ColorOption {
            name: "Summit White".to_string(),
            price: "0".to_string(),
            image: None,
            hex: None,
        });
        record
    }

    fn write_one(record: &VehicleRecord) -> String {
        let mut sink = CsvSink::from_writer(Vec::new()).unwrap();
        sink.emit(record).unwrap();
        sink.finish().unwrap();
        String::from_utf8(sink.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_header_matches_field_order() {
        let output = write_one(&create_test_record());
        let header = output.lines().next().unwrap();
        assert_eq!(header, FIELD_ORDER.join(","));
    }

    #[test]
    fn test_list_column_is_json_encoded() {
        let output = write_one(&create_test_record());
        let row = output.lines().nth(1).unwrap();
        assert!(row.contains("Summit White"));
        // The JSON cell is quoted by the CSV layer
        assert!(row.contains("\"\"name\"\""));
    }

    #[test]
    fn test_empty_list_is_empty_cell() {
        let mut record = create_test_record();
        record.exterior_colors.clear();
        let output = write_one(&record);
        let row = output.lines().nth(1).unwrap();
        assert!(!row.contains("name"));
    }

    #[test]
    fn test_sparse_record_writes_empty_scalars() {
        let record = VehicleRecord::seeded("Ford");
        let output = write_one(&record);
        let row = output.lines().nth(1).unwrap();
        assert!(row.starts_with("Ford,"));
    }
}
