//! Payload storage for the variable store.
//!
//! This crate owns the two payload shapes a variable can hold:
//! - [`ScalarSlot`]: a single optional [`Value`](satchel_core::Value)
//! - [`RecordTable`]: a row set keyed by its first column
//!
//! Deep copy is `Clone`, release is `Drop`; the versioning engine stores one
//! [`Payload`] per history entry and copies the whole payload when it pushes
//! a savepoint (composite variables version the entire live row set, not a
//! diff).

pub mod payload;
pub mod record;
pub mod scalar;

pub use payload::Payload;
pub use record::{RecordSchema, RecordTable};
pub use scalar::ScalarSlot;
