//! Core types for the Satchel variable store.
//!
//! This crate defines the fundamental vocabulary shared by every layer:
//! - [`Value`]: the canonical dynamically typed value
//! - [`ValueKind`]: the declared type of a variable
//! - [`PackageId`] / [`VariableId`]: registry handles
//! - [`Error`]: the error taxonomy for all store operations

pub mod error;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use types::{validate_name, Level, PackageId, VariableId, NAME_MAX_BYTES};
pub use value::{Value, ValueKind};
