//! JSON Lines record sink

use crate::output::RecordSink;
use crate::record::VehicleRecord;
use crate::SinkError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One serialized record per line
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl JsonlSink<BufWriter<File>> {
    /// Creates a sink writing to the given path, truncating an existing file
    pub fn from_path(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl<W: Write> JsonlSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the underlying writer (tests)
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonlSink<W> {
    fn emit(&mut self, record: &VehicleRecord) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_roundtrip_per_line() {
        let mut sink = JsonlSink::from_writer(Vec::new());

        let mut first = VehicleRecord::seeded("Toyota");
        first.model = Some("Tacoma".to_string());
        let mut second = VehicleRecord::seeded("Toyota");
        second.model = Some("Tundra".to_string());

        sink.emit(&first).unwrap();
        sink.emit(&second).unwrap();
        sink.finish().unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: VehicleRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, first);
        let parsed: VehicleRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, second);
    }
}
