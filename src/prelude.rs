//! Convenience re-exports for typical use.
//!
//! ```ignore
//! use satchel::prelude::*;
//! ```

pub use crate::{Error, Result, Session, SessionBuilder, Value, ValueKind};
