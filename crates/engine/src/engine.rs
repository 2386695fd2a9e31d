//! The package-variable store facade.
//!
//! [`Engine`] combines the registry, the state histories, and the changes
//! stack into create/get/set/remove semantics for regular and transactional
//! variables. Every mutation path on a transactional object registers the
//! change before touching the payload, so a savepoint always predates the
//! mutation.

use crate::changes::ChangesStack;
use crate::coordinator::ObjectRef;
use crate::registry::Registry;
use satchel_core::{
    validate_name, Error, Level, PackageId, Result, Value, ValueKind, VariableId, NAME_MAX_BYTES,
};
use satchel_storage::Payload;
use serde::{Deserialize, Serialize};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum package/variable name length in bytes.
    pub name_max_bytes: usize,
    /// Whether the last-touched lookup cache is enabled. The cache is a
    /// pure optimization; disabling it changes nothing observable.
    pub cache_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            name_max_bytes: NAME_MAX_BYTES,
            cache_enabled: true,
        }
    }
}

/// Most-recently-resolved package and variable.
///
/// Entries are verified against the registry on every hit and ids are never
/// reused, so a stale entry misses instead of aliasing. Never authoritative.
#[derive(Debug, Default)]
pub(crate) struct TouchCache {
    pub(crate) package: Option<PackageId>,
    pub(crate) variable: Option<VariableId>,
}

impl TouchCache {
    pub(crate) fn clear(&mut self) {
        self.package = None;
        self.variable = None;
    }

    pub(crate) fn forget_package(&mut self, id: PackageId) {
        if self.package == Some(id) {
            self.package = None;
            self.variable = None;
        }
    }

    pub(crate) fn forget_variable(&mut self, id: VariableId) {
        if self.variable == Some(id) {
            self.variable = None;
        }
    }
}

/// One (package, variable, transactional) triple from [`Engine::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableListing {
    /// Package name.
    pub package: String,
    /// Variable name.
    pub variable: String,
    /// Whether the variable participates in transactional undo.
    pub transactional: bool,
}

/// Per-package retained bytes from [`Engine::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStats {
    /// Package name.
    pub package: String,
    /// Bytes retained by regular variables. Zero while the package is
    /// pending removal (regular storage is released eagerly).
    pub regular_bytes: usize,
    /// Bytes retained by transactional variables, all versions included.
    pub transactional_bytes: usize,
}

impl PackageStats {
    /// Regular plus transactional bytes.
    pub fn total_bytes(&self) -> usize {
        self.regular_bytes + self.transactional_bytes
    }
}

/// The transaction-aware package-variable store.
pub struct Engine {
    pub(crate) registry: Registry,
    pub(crate) stack: ChangesStack,
    pub(crate) level: Level,
    pub(crate) cache: TouchCache,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(EngineConfig::default())
    }
}

impl Engine {
    /// New engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            registry: Registry::new(),
            stack: ChangesStack::new(),
            level: 0,
            cache: TouchCache::default(),
            config,
        }
    }

    /// Whether no packages exist at all (live or pending removal).
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    fn check_name(&self, name: &str, what: &str) -> Result<()> {
        validate_name(name, what, self.config.name_max_bytes)
    }

    fn touch_variable(&mut self, vid: VariableId) {
        if self.config.cache_enabled {
            self.cache.variable = Some(vid);
        }
    }

    /// Resolve a package name through the last-touched cache.
    fn lookup_package_id(&mut self, name: &str) -> Option<PackageId> {
        if self.config.cache_enabled {
            if let Some(pid) = self.cache.package {
                if self.registry.package(pid).map_or(false, |p| p.name == name) {
                    return Some(pid);
                }
            }
        }
        let pid = self.registry.package_id(name)?;
        if self.config.cache_enabled {
            self.cache.package = Some(pid);
            self.cache.variable = None;
        }
        Some(pid)
    }

    // =========================================================================
    // Packages
    // =========================================================================

    /// Resolve a package, creating it when absent and resurrecting it when
    /// pending removal.
    pub fn get_or_create_package(&mut self, name: &str) -> Result<PackageId> {
        self.check_name(name, "package")?;
        if let Some(pid) = self.lookup_package_id(name) {
            let valid = self
                .registry
                .package(pid)
                .map_or(false, |p| p.is_valid());
            if !valid {
                self.resurrect_package(pid);
            }
            return Ok(pid);
        }

        let pid = self.registry.insert_package(name, 0);
        self.track_new(ObjectRef::Package(pid));
        if self.config.cache_enabled {
            self.cache.package = Some(pid);
            self.cache.variable = None;
        }
        tracing::debug!(package = name, "package created");
        Ok(pid)
    }

    /// Bring a removed package back: savepoint it, mark it live again, and
    /// kill off stale transactional children so old values cannot leak into
    /// the resurrected package. The regular map stays empty: its storage
    /// was released when the package was removed.
    fn resurrect_package(&mut self, pid: PackageId) {
        self.register_change(ObjectRef::Package(pid));
        self.registry
            .package_mut(pid)
            .expect("resurrecting unknown package")
            .history
            .head_mut()
            .valid = true;

        let children: Vec<VariableId> = self
            .registry
            .package(pid)
            .expect("resurrecting unknown package")
            .transactional
            .values()
            .copied()
            .collect();
        for vid in children {
            self.invalidate_variable(vid);
        }
        tracing::debug!(package = %pid, "package resurrected");
    }

    /// Look up a valid package. `strict` turns absence (or pending removal)
    /// into [`Error::PackageNotFound`].
    pub fn find_package(&mut self, name: &str, strict: bool) -> Result<Option<PackageId>> {
        self.check_name(name, "package")?;
        match self.lookup_package_id(name) {
            Some(pid) if self.registry.package(pid).map_or(false, |p| p.is_valid()) => {
                Ok(Some(pid))
            }
            _ if strict => Err(Error::PackageNotFound(name.to_string())),
            _ => Ok(None),
        }
    }

    fn require_package(&mut self, name: &str) -> Result<PackageId> {
        self.find_package(name, true)
            .map(|found| found.expect("strict package lookup returned none"))
    }

    /// Whether a valid package with this name exists.
    pub fn package_exists(&mut self, name: &str) -> Result<bool> {
        Ok(self.find_package(name, false)?.is_some())
    }

    // =========================================================================
    // Variable resolution
    // =========================================================================

    /// Resolve a variable for writing, creating it when absent.
    ///
    /// The transactional flag and value kind are immutable after creation:
    /// a name held by the opposite map (even invalidated) is
    /// [`Error::KindMismatch`], a differing kind is [`Error::TypeMismatch`];
    /// neither mutates anything. For an existing transactional variable a
    /// savepoint is registered before the caller overwrites the payload.
    fn get_or_create_variable(
        &mut self,
        pid: PackageId,
        name: &str,
        kind: ValueKind,
        transactional: bool,
    ) -> Result<VariableId> {
        self.check_name(name, "variable")?;
        debug_assert_ne!(kind, ValueKind::Null);

        let (opposite_hit, own_hit) = {
            let pkg = self
                .registry
                .package(pid)
                .expect("unknown package handle");
            let opposite = if transactional {
                pkg.regular.contains_key(name)
            } else {
                pkg.transactional.contains_key(name)
            };
            let own = if transactional {
                pkg.transactional.get(name).copied()
            } else {
                pkg.regular.get(name).copied()
            };
            (opposite, own)
        };

        if opposite_hit {
            return Err(Error::KindMismatch {
                name: name.to_string(),
                declared_transactional: !transactional,
            });
        }

        if let Some(vid) = own_hit {
            let declared = self
                .registry
                .variable(vid)
                .expect("dangling variable id in package map")
                .kind;
            if declared != kind {
                return Err(Error::TypeMismatch {
                    name: name.to_string(),
                    declared,
                });
            }
            if transactional {
                self.register_change(ObjectRef::Variable(vid));
            }
            // Writing to a removed variable resurrects it.
            self.registry
                .variable_mut(vid)
                .expect("dangling variable id in package map")
                .history
                .head_mut()
                .valid = true;
            self.touch_variable(vid);
            Ok(vid)
        } else {
            let payload = if kind == ValueKind::Record {
                Payload::records()
            } else {
                Payload::scalar()
            };
            let vid = self
                .registry
                .insert_variable(pid, name, kind, transactional, 0, payload);
            if transactional {
                self.track_new(ObjectRef::Variable(vid));
            }
            self.touch_variable(vid);
            tracing::debug!(variable = name, %kind, transactional, "variable created");
            Ok(vid)
        }
    }

    /// Resolve a variable for reading. `expect` enforces the declared kind
    /// (checked before validity, so a removed variable still reports its
    /// type faithfully); `strict` turns absence or pending removal into
    /// [`Error::VariableNotFound`].
    fn find_variable(
        &mut self,
        pid: PackageId,
        name: &str,
        expect: Option<ValueKind>,
        strict: bool,
    ) -> Result<Option<VariableId>> {
        self.check_name(name, "variable")?;

        let cached = if self.config.cache_enabled {
            self.cache.variable
        } else {
            None
        };
        let vid = match cached {
            Some(vid)
                if self
                    .registry
                    .variable(vid)
                    .map_or(false, |v| v.package == pid && v.name == name) =>
            {
                Some(vid)
            }
            _ => self
                .registry
                .package(pid)
                .expect("unknown package handle")
                .variable(name),
        };

        let Some(vid) = vid else {
            return if strict {
                Err(Error::VariableNotFound(name.to_string()))
            } else {
                Ok(None)
            };
        };

        let variable = self.registry.variable(vid).expect("dangling variable id");
        if let Some(kind) = expect {
            if variable.kind != kind {
                return Err(Error::TypeMismatch {
                    name: name.to_string(),
                    declared: variable.kind,
                });
            }
        }
        if !variable.is_valid() {
            return if strict {
                Err(Error::VariableNotFound(name.to_string()))
            } else {
                Ok(None)
            };
        }
        self.touch_variable(vid);
        Ok(Some(vid))
    }

    fn require_variable(
        &mut self,
        pid: PackageId,
        name: &str,
        expect: Option<ValueKind>,
    ) -> Result<VariableId> {
        self.find_variable(pid, name, expect, true)
            .map(|found| found.expect("strict variable lookup returned none"))
    }

    // =========================================================================
    // Scalar operations
    // =========================================================================

    /// Assign a scalar value, creating package and variable as needed.
    ///
    /// The value's kind becomes the declared kind on first assignment. Bare
    /// nulls cannot declare a kind; use [`Engine::set_null`].
    pub fn set(
        &mut self,
        package: &str,
        variable: &str,
        value: Value,
        transactional: bool,
    ) -> Result<()> {
        let kind = value.kind();
        if kind == ValueKind::Null {
            return Err(Error::InvalidArgument(format!(
                "cannot assign a bare null to variable \"{variable}\"; use set_null with an explicit kind"
            )));
        }
        let pid = self.get_or_create_package(package)?;
        let vid = self.get_or_create_variable(pid, variable, kind, transactional)?;
        self.registry
            .variable_mut(vid)
            .expect("dangling variable id")
            .history
            .head_mut()
            .payload
            .as_scalar_mut()
            .expect("scalar payload for scalar kind")
            .set(Some(value));
        Ok(())
    }

    /// Assign SQL NULL with an explicit scalar kind, creating package and
    /// variable as needed.
    pub fn set_null(
        &mut self,
        package: &str,
        variable: &str,
        kind: ValueKind,
        transactional: bool,
    ) -> Result<()> {
        if matches!(kind, ValueKind::Null | ValueKind::Record) {
            return Err(Error::InvalidArgument(format!(
                "\"{kind}\" is not a scalar kind for variable \"{variable}\""
            )));
        }
        let pid = self.get_or_create_package(package)?;
        let vid = self.get_or_create_variable(pid, variable, kind, transactional)?;
        self.registry
            .variable_mut(vid)
            .expect("dangling variable id")
            .history
            .head_mut()
            .payload
            .as_scalar_mut()
            .expect("scalar payload for scalar kind")
            .set(None);
        Ok(())
    }

    /// Read a scalar value. Returns `None` for an absent variable (when not
    /// strict) and for a NULL value.
    pub fn get(&mut self, package: &str, variable: &str, strict: bool) -> Result<Option<Value>> {
        let Some(pid) = self.find_package(package, strict)? else {
            return Ok(None);
        };
        let Some(vid) = self.find_variable(pid, variable, None, strict)? else {
            return Ok(None);
        };
        let var = self.registry.variable(vid).expect("dangling variable id");
        match var.history.head().payload.as_scalar() {
            Some(slot) => Ok(slot.get().cloned()),
            None => Err(Error::TypeMismatch {
                name: variable.to_string(),
                declared: ValueKind::Record,
            }),
        }
    }

    /// Read a scalar value, checking the declared kind first.
    pub fn get_expected(
        &mut self,
        package: &str,
        variable: &str,
        kind: ValueKind,
        strict: bool,
    ) -> Result<Option<Value>> {
        if matches!(kind, ValueKind::Null | ValueKind::Record) {
            return Err(Error::InvalidArgument(format!(
                "\"{kind}\" is not a scalar kind for variable \"{variable}\""
            )));
        }
        let Some(pid) = self.find_package(package, strict)? else {
            return Ok(None);
        };
        let Some(vid) = self.find_variable(pid, variable, Some(kind), strict)? else {
            return Ok(None);
        };
        let var = self.registry.variable(vid).expect("dangling variable id");
        let slot = var
            .history
            .head()
            .payload
            .as_scalar()
            .expect("scalar payload for scalar kind");
        Ok(slot.get().cloned())
    }

    /// Whether a valid variable with this name exists in a valid package.
    pub fn exists(&mut self, package: &str, variable: &str) -> Result<bool> {
        self.check_name(variable, "variable")?;
        let Some(pid) = self.find_package(package, false)? else {
            return Ok(false);
        };
        let pkg = self.registry.package(pid).expect("unknown package handle");
        match pkg.variable(variable) {
            Some(vid) => Ok(self
                .registry
                .variable(vid)
                .map_or(false, |v| v.is_valid())),
            None => Ok(false),
        }
    }

    // =========================================================================
    // Record operations
    // =========================================================================

    /// Insert a row into a record variable, creating package and variable
    /// as needed. The first row fixes the arity; the first column is the
    /// key.
    pub fn insert_record(
        &mut self,
        package: &str,
        variable: &str,
        row: Vec<Value>,
        transactional: bool,
    ) -> Result<()> {
        let pid = self.get_or_create_package(package)?;
        let vid = self.get_or_create_variable(pid, variable, ValueKind::Record, transactional)?;
        self.registry
            .variable_mut(vid)
            .expect("dangling variable id")
            .history
            .head_mut()
            .payload
            .as_records_mut()
            .expect("record payload for record kind")
            .insert(variable, row)
    }

    /// Replace the row sharing the new row's key. Returns whether a row was
    /// replaced.
    pub fn update_record(&mut self, package: &str, variable: &str, row: Vec<Value>) -> Result<bool> {
        let pid = self.require_package(package)?;
        let vid = self.require_variable(pid, variable, Some(ValueKind::Record))?;
        if self
            .registry
            .variable(vid)
            .expect("dangling variable id")
            .transactional
        {
            self.register_change(ObjectRef::Variable(vid));
        }
        self.registry
            .variable_mut(vid)
            .expect("dangling variable id")
            .history
            .head_mut()
            .payload
            .as_records_mut()
            .expect("record payload for record kind")
            .update(variable, row)
    }

    /// Delete the row with this key (`Value::Null` addresses the null key
    /// slot). Returns whether a row existed.
    pub fn delete_record(&mut self, package: &str, variable: &str, key: &Value) -> Result<bool> {
        let pid = self.require_package(package)?;
        let vid = self.require_variable(pid, variable, Some(ValueKind::Record))?;
        if self
            .registry
            .variable(vid)
            .expect("dangling variable id")
            .transactional
        {
            self.register_change(ObjectRef::Variable(vid));
        }
        let table = self
            .registry
            .variable_mut(vid)
            .expect("dangling variable id")
            .history
            .head_mut()
            .payload
            .as_records_mut()
            .expect("record payload for record kind");
        table.check_key(variable, key)?;
        Ok(table.remove(key))
    }

    /// All rows of a record variable, in unspecified order.
    pub fn records(&mut self, package: &str, variable: &str) -> Result<Vec<Vec<Value>>> {
        let pid = self.require_package(package)?;
        let vid = self.require_variable(pid, variable, Some(ValueKind::Record))?;
        let table = self
            .registry
            .variable(vid)
            .expect("dangling variable id")
            .history
            .head()
            .payload
            .as_records()
            .expect("record payload for record kind");
        Ok(table.rows().map(|row| row.to_vec()).collect())
    }

    /// The row with this key, if any.
    pub fn record_by_key(
        &mut self,
        package: &str,
        variable: &str,
        key: &Value,
    ) -> Result<Option<Vec<Value>>> {
        let pid = self.require_package(package)?;
        let vid = self.require_variable(pid, variable, Some(ValueKind::Record))?;
        let table = self
            .registry
            .variable(vid)
            .expect("dangling variable id")
            .history
            .head()
            .payload
            .as_records()
            .expect("record payload for record kind");
        table.check_key(variable, key)?;
        Ok(table.get(key).map(|row| row.to_vec()))
    }

    /// Rows matching any of the keys, in key order; missing keys are
    /// skipped.
    pub fn records_by_keys(
        &mut self,
        package: &str,
        variable: &str,
        keys: &[Value],
    ) -> Result<Vec<Vec<Value>>> {
        let pid = self.require_package(package)?;
        let vid = self.require_variable(pid, variable, Some(ValueKind::Record))?;
        let table = self
            .registry
            .variable(vid)
            .expect("dangling variable id")
            .history
            .head()
            .payload
            .as_records()
            .expect("record payload for record kind");
        let mut rows = Vec::new();
        for key in keys {
            table.check_key(variable, key)?;
            if let Some(row) = table.get(key) {
                rows.push(row.to_vec());
            }
        }
        Ok(rows)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove a variable by name.
    ///
    /// A regular variable and its storage are released immediately and will
    /// not come back on abort. A transactional removal is a tracked change:
    /// it is undone by abort and becomes final at top-level commit.
    pub fn remove_variable(&mut self, package: &str, variable: &str) -> Result<()> {
        self.check_name(variable, "variable")?;
        let pid = self.require_package(package)?;

        let pkg = self.registry.package(pid).expect("unknown package handle");
        if let Some(&vid) = pkg.regular.get(variable) {
            self.destroy_variable(vid);
            self.cache.variable = None;
            return Ok(());
        }

        let found = pkg.transactional.get(variable).copied();
        match found {
            Some(vid)
                if self
                    .registry
                    .variable(vid)
                    .map_or(false, |v| v.is_valid()) =>
            {
                self.invalidate_variable(vid);
                self.cache.variable = None;
                Ok(())
            }
            _ => Err(Error::VariableNotFound(variable.to_string())),
        }
    }

    /// Remove a package by name.
    ///
    /// Regular variables are released eagerly, irreversibly even on abort.
    /// The package object and its transactional variables are tracked and
    /// roll back; aborting a removal resurrects the package with an empty
    /// regular map.
    pub fn remove_package(&mut self, package: &str) -> Result<()> {
        let pid = self.require_package(package)?;
        self.remove_package_internal(pid);
        self.cache.clear();
        self.maybe_reset();
        Ok(())
    }

    fn remove_package_internal(&mut self, pid: PackageId) {
        // Eager release of regular storage, by design not recoverable.
        let regular: Vec<VariableId> = self
            .registry
            .package(pid)
            .expect("unknown package handle")
            .regular
            .values()
            .copied()
            .collect();
        for vid in regular {
            self.registry.remove_variable_entry(vid);
        }

        if self.level == 0 {
            // No undo scope: the removal is immediate and final.
            self.destroy_package(pid);
            return;
        }

        self.register_change(ObjectRef::Package(pid));
        self.registry
            .package_mut(pid)
            .expect("unknown package handle")
            .history
            .head_mut()
            .valid = false;

        // Children go down with the package, so no lookup can see a live
        // variable under a dead package.
        let children: Vec<VariableId> = self
            .registry
            .package(pid)
            .expect("unknown package handle")
            .transactional
            .values()
            .copied()
            .collect();
        for vid in children {
            self.invalidate_variable(vid);
        }
        tracing::debug!(package = %pid, "package removed");
    }

    /// Mark a transactional variable removed, savepointing it first. At
    /// level 0 the removal is immediate and final.
    fn invalidate_variable(&mut self, vid: VariableId) {
        let valid = self
            .registry
            .variable(vid)
            .map_or(false, |v| v.is_valid());
        if !valid {
            return;
        }
        if self.level == 0 {
            self.destroy_variable(vid);
        } else {
            self.register_change(ObjectRef::Variable(vid));
            self.registry
                .variable_mut(vid)
                .expect("dangling variable id")
                .history
                .head_mut()
                .valid = false;
        }
    }

    /// Remove every valid package.
    pub fn remove_all(&mut self) {
        for pid in self.registry.packages_by_name() {
            if self
                .registry
                .package(pid)
                .map_or(false, |p| p.is_valid())
            {
                self.remove_package_internal(pid);
            }
        }
        self.cache.clear();
        self.maybe_reset();
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// All currently valid (package, variable, transactional) triples,
    /// sorted by package name, then regular before transactional, then
    /// variable name.
    pub fn list(&self) -> Vec<VariableListing> {
        let mut out = Vec::new();
        for pid in self.registry.packages_by_name() {
            let pkg = self.registry.package(pid).expect("unknown package handle");
            if !pkg.is_valid() {
                continue;
            }
            for (map, transactional) in [(&pkg.regular, false), (&pkg.transactional, true)] {
                let mut names: Vec<&String> = map.keys().collect();
                names.sort();
                for name in names {
                    let vid = map[name];
                    let live = self
                        .registry
                        .variable(vid)
                        .map_or(false, |v| v.is_valid());
                    if live {
                        out.push(VariableListing {
                            package: pkg.name.clone(),
                            variable: name.clone(),
                            transactional,
                        });
                    }
                }
            }
        }
        out
    }

    /// Per-package retained bytes, sorted by package name. Packages pending
    /// removal still appear: their transactional storage is retained until
    /// final commit or abort, while their regular storage is already gone.
    pub fn stats(&self) -> Vec<PackageStats> {
        let mut out = Vec::new();
        for pid in self.registry.packages_by_name() {
            let pkg = self.registry.package(pid).expect("unknown package handle");
            let mut regular_bytes = 0;
            if pkg.is_valid() {
                for vid in pkg.regular.values() {
                    let var = self.registry.variable(*vid).expect("dangling variable id");
                    regular_bytes += var.history.head().payload.retained_bytes();
                }
            }
            let mut transactional_bytes = 0;
            for vid in pkg.transactional.values() {
                let var = self.registry.variable(*vid).expect("dangling variable id");
                transactional_bytes += var
                    .history
                    .states()
                    .map(|state| state.payload.retained_bytes())
                    .sum::<usize>();
            }
            out.push(PackageStats {
                package: pkg.name.clone(),
                regular_bytes,
                transactional_bytes,
            });
        }
        out
    }
}
