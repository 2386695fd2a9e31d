//! Public type surface, re-exported from the internal crates.

pub use satchel_core::{Level, Value, ValueKind, NAME_MAX_BYTES};
pub use satchel_engine::{PackageStats, TxnEvent, VariableListing};
