//! Output module
//!
//! Record sinks for completed vehicle configurations: CSV (the original feed
//! format) and JSON Lines. The sink is chosen by the `[output]` config table.

mod csv_output;
mod jsonl;
mod traits;

pub use csv_output::CsvSink;
pub use jsonl::JsonlSink;
pub use traits::RecordSink;

use crate::config::{OutputConfig, OutputFormat};
use crate::SinkError;
use std::path::Path;

/// Opens the configured record sink
pub fn open_sink(config: &OutputConfig) -> Result<Box<dyn RecordSink>, SinkError> {
    let path = Path::new(&config.records_path);
    match config.format {
        OutputFormat::Csv => Ok(Box::new(CsvSink::from_path(path)?)),
        OutputFormat::Jsonl => Ok(Box::new(JsonlSink::from_path(path)?)),
    }
}
