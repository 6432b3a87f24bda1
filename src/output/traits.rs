//! Record sink trait
//!
//! The sink is the engine's output collaborator. Completed records arrive in
//! whatever order branches finish; a sink must not assume arrival order
//! matches discovery order, and must tolerate sparse records (sites differ
//! in which columns they populate).

use crate::record::VehicleRecord;
use crate::SinkError;

/// Destination for completed records
pub trait RecordSink {
    /// Writes one completed record
    fn emit(&mut self, record: &VehicleRecord) -> Result<(), SinkError>;

    /// Flushes buffered output; called once after the last emit
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
