//! Registry handles and name rules.
//!
//! Packages and variables live in handle tables keyed by [`PackageId`] and
//! [`VariableId`]. Ids are allocated from monotonic counters and never
//! reused, so a stale id held elsewhere (a changes-stack frame, the
//! last-touched cache) can never alias a different live object.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Transaction nesting depth. 0 means no transaction is active.
pub type Level = u32;

/// Maximum length of a package or variable name, in bytes.
///
/// Matches the host engine's identifier limit (NAMEDATALEN - 1).
pub const NAME_MAX_BYTES: usize = 63;

/// Handle of a package in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId(pub(crate) u64);

impl PackageId {
    /// Build a handle from its raw counter value.
    pub fn from_raw(raw: u64) -> Self {
        PackageId(raw)
    }

    /// Raw counter value of this handle.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Handle of a variable in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableId(pub(crate) u64);

impl VariableId {
    /// Build a handle from its raw counter value.
    pub fn from_raw(raw: u64) -> Self {
        VariableId(raw)
    }

    /// Raw counter value of this handle.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pkg#{}", self.0)
    }
}

impl std::fmt::Display for VariableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "var#{}", self.0)
    }
}

/// Validate a package or variable name.
///
/// Names must be non-empty and at most `max_bytes` bytes
/// ([`NAME_MAX_BYTES`] by default). The name is used verbatim as a map key;
/// no case folding is applied.
pub fn validate_name(name: &str, what: &str, max_bytes: usize) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument(format!("{what} name cannot be empty")));
    }
    if name.len() > max_bytes {
        return Err(Error::InvalidArgument(format!(
            "{what} name \"{name}\" is too long ({} bytes, max {max_bytes})",
            name.len()
        )));
    }
    Ok(())
}
