//! Session entry point.
//!
//! A [`Session`] owns one engine instance and stands in for the host
//! transaction manager: [`Session::begin`], [`Session::commit`] and
//! [`Session::rollback`] drive the nesting level and feed the corresponding
//! boundary events to the engine. All state is session-private; the store
//! is driven synchronously from one logical thread.

use crate::types::{Level, PackageStats, Value, ValueKind, VariableListing};
use satchel_core::{Error, Result};
use satchel_engine::{Engine, EngineConfig, TxnEvent};

/// A session-scoped variable store.
///
/// # Example
///
/// ```ignore
/// use satchel::prelude::*;
///
/// let mut session = Session::new();
/// session.set("app", "retries", 3, false)?;
///
/// session.begin();
/// session.set("app", "retries", 5, true)?;
/// session.rollback()?;
/// ```
pub struct Session {
    engine: Engine,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    /// New session with default configuration.
    pub fn new() -> Self {
        Session::builder().build()
    }

    /// Configuration builder.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut session = Session::builder()
    ///     .name_limit(32)
    ///     .disable_lookup_cache()
    ///     .build();
    /// ```
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    // =========================================================================
    // Transaction control
    // =========================================================================

    /// Begin a transaction, or a nested subtransaction if one is already
    /// active.
    pub fn begin(&mut self) {
        self.engine.dispatch(TxnEvent::BeginSub);
    }

    /// Commit the innermost transaction level.
    ///
    /// Committing a subtransaction merges its changes into the parent;
    /// committing the top level makes them final.
    pub fn commit(&mut self) -> Result<()> {
        match self.engine.current_level() {
            0 => Err(Error::InvalidArgument("no active transaction to commit".into())),
            1 => {
                self.engine.dispatch(TxnEvent::PreCommit);
                Ok(())
            }
            _ => {
                self.engine.dispatch(TxnEvent::CommitSub);
                Ok(())
            }
        }
    }

    /// Abort the innermost transaction level, restoring every transactional
    /// object it changed.
    pub fn rollback(&mut self) -> Result<()> {
        match self.engine.current_level() {
            0 => Err(Error::InvalidArgument("no active transaction to roll back".into())),
            1 => {
                self.engine.dispatch(TxnEvent::Abort);
                Ok(())
            }
            _ => {
                self.engine.dispatch(TxnEvent::AbortSub);
                Ok(())
            }
        }
    }

    /// Current nesting level; 0 means no transaction is active.
    pub fn nesting_level(&self) -> Level {
        self.engine.current_level()
    }

    /// Whether a transaction is active.
    pub fn in_transaction(&self) -> bool {
        self.engine.current_level() > 0
    }

    /// Whether any transactional object has unfinalized changes.
    pub fn has_pending_changes(&self) -> bool {
        self.engine.has_pending_changes()
    }

    // =========================================================================
    // Scalar variables
    // =========================================================================

    /// Assign a scalar value, creating the package and variable as needed.
    ///
    /// The first assignment fixes the variable's kind and its transactional
    /// flag; later accesses must match both.
    pub fn set(
        &mut self,
        package: &str,
        variable: &str,
        value: impl Into<Value>,
        transactional: bool,
    ) -> Result<()> {
        self.engine.set(package, variable, value.into(), transactional)
    }

    /// Assign SQL NULL with an explicit scalar kind.
    pub fn set_null(
        &mut self,
        package: &str,
        variable: &str,
        kind: ValueKind,
        transactional: bool,
    ) -> Result<()> {
        self.engine.set_null(package, variable, kind, transactional)
    }

    /// Read a scalar value.
    ///
    /// With `strict` an unknown or removed package/variable is an error;
    /// otherwise it reads as `None`, as does a NULL value.
    pub fn get(&mut self, package: &str, variable: &str, strict: bool) -> Result<Option<Value>> {
        self.engine.get(package, variable, strict)
    }

    /// Read an integer variable, checking the declared kind.
    pub fn get_int(&mut self, package: &str, variable: &str, strict: bool) -> Result<Option<i64>> {
        Ok(self
            .engine
            .get_expected(package, variable, ValueKind::Int, strict)?
            .and_then(|v| v.as_int()))
    }

    /// Read a boolean variable, checking the declared kind.
    pub fn get_bool(&mut self, package: &str, variable: &str, strict: bool) -> Result<Option<bool>> {
        Ok(self
            .engine
            .get_expected(package, variable, ValueKind::Bool, strict)?
            .and_then(|v| v.as_bool()))
    }

    /// Read a float variable, checking the declared kind.
    pub fn get_float(&mut self, package: &str, variable: &str, strict: bool) -> Result<Option<f64>> {
        Ok(self
            .engine
            .get_expected(package, variable, ValueKind::Float, strict)?
            .and_then(|v| v.as_float()))
    }

    /// Read a string variable, checking the declared kind.
    pub fn get_str(
        &mut self,
        package: &str,
        variable: &str,
        strict: bool,
    ) -> Result<Option<String>> {
        Ok(self
            .engine
            .get_expected(package, variable, ValueKind::String, strict)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    /// Read a bytes variable, checking the declared kind.
    pub fn get_bytes(
        &mut self,
        package: &str,
        variable: &str,
        strict: bool,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self
            .engine
            .get_expected(package, variable, ValueKind::Bytes, strict)?
            .and_then(|v| v.as_bytes().map(<[u8]>::to_vec)))
    }

    /// Whether a live variable with this name exists.
    pub fn exists(&mut self, package: &str, variable: &str) -> Result<bool> {
        self.engine.exists(package, variable)
    }

    /// Whether a live package with this name exists.
    pub fn package_exists(&mut self, package: &str) -> Result<bool> {
        self.engine.package_exists(package)
    }

    // =========================================================================
    // Record variables
    // =========================================================================

    /// Insert a row into a record variable, creating the package and
    /// variable as needed. The first row fixes the arity; the first column
    /// is the key.
    pub fn insert_record(
        &mut self,
        package: &str,
        variable: &str,
        row: Vec<Value>,
        transactional: bool,
    ) -> Result<()> {
        self.engine.insert_record(package, variable, row, transactional)
    }

    /// Replace the row sharing the new row's key. Returns whether a row was
    /// replaced.
    pub fn update_record(
        &mut self,
        package: &str,
        variable: &str,
        row: Vec<Value>,
    ) -> Result<bool> {
        self.engine.update_record(package, variable, row)
    }

    /// Delete the row with this key. Returns whether a row existed.
    pub fn delete_record(
        &mut self,
        package: &str,
        variable: &str,
        key: impl Into<Value>,
    ) -> Result<bool> {
        self.engine.delete_record(package, variable, &key.into())
    }

    /// All rows of a record variable, in unspecified order.
    pub fn records(&mut self, package: &str, variable: &str) -> Result<Vec<Vec<Value>>> {
        self.engine.records(package, variable)
    }

    /// The row with this key, if any.
    pub fn record_by_key(
        &mut self,
        package: &str,
        variable: &str,
        key: impl Into<Value>,
    ) -> Result<Option<Vec<Value>>> {
        self.engine.record_by_key(package, variable, &key.into())
    }

    /// Rows matching any of the keys, in key order; missing keys are
    /// skipped.
    pub fn records_by_keys(
        &mut self,
        package: &str,
        variable: &str,
        keys: &[Value],
    ) -> Result<Vec<Vec<Value>>> {
        self.engine.records_by_keys(package, variable, keys)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove a variable. Regular variables are released immediately;
    /// transactional removals participate in undo.
    pub fn remove_variable(&mut self, package: &str, variable: &str) -> Result<()> {
        self.engine.remove_variable(package, variable)
    }

    /// Remove a package. Regular storage is released eagerly and is not
    /// restored by abort; the package and its transactional variables roll
    /// back normally.
    pub fn remove_package(&mut self, package: &str) -> Result<()> {
        self.engine.remove_package(package)
    }

    /// Remove every live package.
    pub fn remove_all(&mut self) {
        self.engine.remove_all()
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// All currently valid (package, variable, transactional) triples.
    pub fn list(&self) -> Vec<VariableListing> {
        self.engine.list()
    }

    /// Per-package bytes retained in regular vs transactional storage.
    pub fn stats(&self) -> Vec<PackageStats> {
        self.engine.stats()
    }
}

/// Builder for session configuration.
///
/// # Example
///
/// ```ignore
/// let mut session = Session::builder()
///     .name_limit(128)
///     .build();
/// ```
pub struct SessionBuilder {
    config: EngineConfig,
}

impl SessionBuilder {
    /// New builder with default settings.
    pub fn new() -> Self {
        SessionBuilder {
            config: EngineConfig::default(),
        }
    }

    /// Override the maximum package/variable name length in bytes.
    pub fn name_limit(mut self, max_bytes: usize) -> Self {
        self.config.name_max_bytes = max_bytes;
        self
    }

    /// Disable the last-touched lookup cache. Purely an optimization
    /// toggle; semantics are identical either way.
    pub fn disable_lookup_cache(mut self) -> Self {
        self.config.cache_enabled = false;
        self
    }

    /// Build the session.
    pub fn build(self) -> Session {
        Session {
            engine: Engine::new(self.config),
        }
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        SessionBuilder::new()
    }
}
