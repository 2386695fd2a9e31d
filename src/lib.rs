//! # Satchel
//!
//! Transaction-aware session variable store for embedded database engines.
//!
//! Satchel keeps named variables grouped into packages, readable and
//! writable across statement and transaction boundaries within one session.
//! Transactional variables participate in nested-transaction undo: aborting
//! any subtransaction restores their previous values, at a cost
//! proportional to the objects actually changed. Regular variables are
//! immediate and survive aborts.
//!
//! ## Quick start
//!
//! ```ignore
//! use satchel::prelude::*;
//!
//! let mut session = Session::new();
//!
//! // Immediate, untracked assignment (no transaction active).
//! session.set("vars", "greeting", "hello", false)?;
//!
//! // Transactional assignment with nested undo.
//! session.begin();
//! session.set("vars", "counter", 1, true)?;
//! session.begin();
//! session.set("vars", "counter", 2, true)?;
//! session.rollback()?;                         // inner change undone
//! assert_eq!(session.get_int("vars", "counter", true)?, Some(1));
//! session.commit()?;
//! ```
//!
//! ## Variables
//!
//! - **Regular**: changes apply immediately and are not undone on abort.
//!   Removing a package releases regular storage eagerly; that release is
//!   irreversible even if the removal itself is rolled back.
//! - **Transactional**: every first change at a nesting level snapshots the
//!   prior state, so commit keeps the new value and abort restores the old
//!   one, level by level.
//!
//! Scalar variables hold a single [`Value`]; record variables hold rows
//! keyed by their first column.

#![warn(missing_docs)]

mod session;
mod types;

pub mod prelude;

// Re-export main entry points
pub use session::{Session, SessionBuilder};

// Re-export the shared vocabulary
pub use satchel_core::{Error, Result};
pub use types::*;
