//! The payload carried by one history entry of a variable.

use crate::{RecordTable, ScalarSlot};

/// Payload of a variable version: one scalar slot or one whole record table.
///
/// Cloning deep-copies the payload; this is what the versioning engine does
/// when it pushes a savepoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Scalar variable payload.
    Scalar(ScalarSlot),
    /// Record variable payload.
    Records(RecordTable),
}

impl Payload {
    /// Fresh scalar payload holding NULL.
    pub fn scalar() -> Self {
        Payload::Scalar(ScalarSlot::new())
    }

    /// Fresh record payload with no rows.
    pub fn records() -> Self {
        Payload::Records(RecordTable::new())
    }

    /// Scalar slot accessor; `None` for record payloads.
    pub fn as_scalar(&self) -> Option<&ScalarSlot> {
        match self {
            Payload::Scalar(slot) => Some(slot),
            Payload::Records(_) => None,
        }
    }

    /// Mutable scalar slot accessor; `None` for record payloads.
    pub fn as_scalar_mut(&mut self) -> Option<&mut ScalarSlot> {
        match self {
            Payload::Scalar(slot) => Some(slot),
            Payload::Records(_) => None,
        }
    }

    /// Record table accessor; `None` for scalar payloads.
    pub fn as_records(&self) -> Option<&RecordTable> {
        match self {
            Payload::Records(table) => Some(table),
            Payload::Scalar(_) => None,
        }
    }

    /// Mutable record table accessor; `None` for scalar payloads.
    pub fn as_records_mut(&mut self) -> Option<&mut RecordTable> {
        match self {
            Payload::Records(table) => Some(table),
            Payload::Scalar(_) => None,
        }
    }

    /// Approximate bytes retained by the payload.
    pub fn retained_bytes(&self) -> usize {
        match self {
            Payload::Scalar(slot) => slot.retained_bytes(),
            Payload::Records(table) => table.retained_bytes(),
        }
    }
}
