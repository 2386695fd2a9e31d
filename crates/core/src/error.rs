//! Error taxonomy for the variable store.
//!
//! Every fallible operation returns one of these variants. Errors are
//! synchronous and scoped to the failing operation; they never abort the
//! enclosing transaction on their own, escalation is the caller's call.
//! Internal invariant breaches (an empty state history, a frame deeper than
//! the nesting level) are bugs and panic instead of surfacing here.

use crate::value::ValueKind;
use thiserror::Error;

/// All variable-store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Strict lookup of a package that does not exist or is removed.
    #[error("unrecognized package \"{0}\"")]
    PackageNotFound(String),

    /// Strict lookup of a variable that does not exist or is removed.
    #[error("unrecognized variable \"{0}\"")]
    VariableNotFound(String),

    /// The variable exists with the opposite transactional flag.
    ///
    /// The flag is fixed at creation; re-declaring the other way fails and
    /// performs no mutation.
    #[error("variable \"{name}\" already declared as {}", kind_label(.declared_transactional))]
    KindMismatch {
        /// Variable name.
        name: String,
        /// The flag the variable was created with.
        declared_transactional: bool,
    },

    /// The variable exists with a different declared value kind.
    #[error("variable \"{name}\" requires \"{declared}\" value")]
    TypeMismatch {
        /// Variable name.
        name: String,
        /// Kind fixed at creation.
        declared: ValueKind,
    },

    /// Malformed name, null where a value is required, duplicate record
    /// key, commit/rollback with no active transaction, and similar
    /// caller mistakes.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn kind_label(transactional: &bool) -> &'static str {
    if *transactional {
        "TRANSACTIONAL"
    } else {
        "NOT TRANSACTIONAL"
    }
}

/// Result type for variable-store operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a not-found error (package or variable).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::PackageNotFound(_) | Error::VariableNotFound(_))
    }

    /// Check if this is a declaration conflict (kind or type).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::KindMismatch { .. } | Error::TypeMismatch { .. })
    }
}
