//! Name registry: the handle table for packages and variables.
//!
//! Entities live in id-keyed maps; names resolve to ids through per-registry
//! and per-package name maps. Ids come from monotonic counters and are never
//! reused, so anything holding a stale id (a changes-stack frame, the
//! last-touched cache) misses cleanly instead of aliasing a new object.

use crate::history::StateHistory;
use rustc_hash::FxHashMap;
use satchel_core::{Level, PackageId, ValueKind, VariableId};
use satchel_storage::Payload;

/// A named namespace grouping variables.
///
/// The two name maps mirror the two storage arenas: regular variables are
/// released eagerly on package removal, transactional ones are
/// version-tracked and survive until final commit or abort.
#[derive(Debug)]
pub struct Package {
    /// Package name, unique in the registry.
    pub name: String,
    /// Regular (non-transactional) variables by name.
    pub regular: FxHashMap<String, VariableId>,
    /// Transactional variables by name.
    pub transactional: FxHashMap<String, VariableId>,
    /// Validity history; the payload of a package state is validity alone.
    pub history: StateHistory<()>,
}

impl Package {
    /// Whether the current state is live.
    pub fn is_valid(&self) -> bool {
        self.history.head().valid
    }

    /// Resolve a variable name against both maps, regular first.
    pub fn variable(&self, name: &str) -> Option<VariableId> {
        self.regular
            .get(name)
            .or_else(|| self.transactional.get(name))
            .copied()
    }
}

/// A named, typed value slot inside a package.
#[derive(Debug)]
pub struct Variable {
    /// Variable name, unique within its package across both maps in
    /// practice (creation checks the opposite map first).
    pub name: String,
    /// Owning package.
    pub package: PackageId,
    /// Value kind fixed at creation.
    pub kind: ValueKind,
    /// Transactional flag fixed at creation.
    pub transactional: bool,
    /// Versioned payload history.
    pub history: StateHistory<Payload>,
}

impl Variable {
    /// Whether the current state is live.
    pub fn is_valid(&self) -> bool {
        self.history.head().valid
    }
}

/// Handle table mapping names to packages and ids to entities.
#[derive(Debug, Default)]
pub struct Registry {
    by_name: FxHashMap<String, PackageId>,
    packages: FxHashMap<PackageId, Package>,
    variables: FxHashMap<VariableId, Variable>,
    next_package: u64,
    next_variable: u64,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Whether no packages exist (live or pending removal).
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Number of package entries, including invalidated ones awaiting
    /// finalize.
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Resolve a package name to its handle.
    pub fn package_id(&self, name: &str) -> Option<PackageId> {
        self.by_name.get(name).copied()
    }

    /// Package by handle.
    pub fn package(&self, id: PackageId) -> Option<&Package> {
        self.packages.get(&id)
    }

    /// Package by handle, mutable.
    pub fn package_mut(&mut self, id: PackageId) -> Option<&mut Package> {
        self.packages.get_mut(&id)
    }

    /// Variable by handle.
    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(&id)
    }

    /// Variable by handle, mutable.
    pub fn variable_mut(&mut self, id: VariableId) -> Option<&mut Variable> {
        self.variables.get_mut(&id)
    }

    /// Iterate packages sorted by name, for deterministic listings.
    pub fn packages_by_name(&self) -> Vec<PackageId> {
        let mut ids: Vec<(&str, PackageId)> = self
            .packages
            .iter()
            .map(|(id, pkg)| (pkg.name.as_str(), *id))
            .collect();
        ids.sort_by(|a, b| a.0.cmp(b.0));
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Create a package entry with a live initial state.
    pub fn insert_package(&mut self, name: &str, level: Level) -> PackageId {
        debug_assert!(!self.by_name.contains_key(name));
        let id = PackageId::from_raw(self.next_package);
        self.next_package += 1;
        self.packages.insert(
            id,
            Package {
                name: name.to_string(),
                regular: FxHashMap::default(),
                transactional: FxHashMap::default(),
                history: StateHistory::with_initial(level, ()),
            },
        );
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Create a variable entry with a live initial state and register it in
    /// the owning package's map.
    pub fn insert_variable(
        &mut self,
        package: PackageId,
        name: &str,
        kind: ValueKind,
        transactional: bool,
        level: Level,
        payload: Payload,
    ) -> VariableId {
        let id = VariableId::from_raw(self.next_variable);
        self.next_variable += 1;
        self.variables.insert(
            id,
            Variable {
                name: name.to_string(),
                package,
                kind,
                transactional,
                history: StateHistory::with_initial(level, payload),
            },
        );
        let pkg = self
            .packages
            .get_mut(&package)
            .expect("variable inserted into unknown package");
        let map = if transactional {
            &mut pkg.transactional
        } else {
            &mut pkg.regular
        };
        debug_assert!(!map.contains_key(name));
        map.insert(name.to_string(), id);
        id
    }

    /// Detach a variable from its package and drop it with all retained
    /// states. Tolerates a package that is already gone.
    pub fn remove_variable_entry(&mut self, id: VariableId) -> Option<Variable> {
        let variable = self.variables.remove(&id)?;
        if let Some(pkg) = self.packages.get_mut(&variable.package) {
            let map = if variable.transactional {
                &mut pkg.transactional
            } else {
                &mut pkg.regular
            };
            map.remove(&variable.name);
        }
        Some(variable)
    }

    /// Drop a package with all of its variables (both maps) and retained
    /// states.
    pub fn remove_package_entry(&mut self, id: PackageId) -> Option<Package> {
        let package = self.packages.remove(&id)?;
        self.by_name.remove(&package.name);
        for vid in package.regular.values().chain(package.transactional.values()) {
            self.variables.remove(vid);
        }
        Some(package)
    }

    /// Tear everything down, id counters included: the process-wide reset
    /// point. Subsequent creation behaves as first-ever use.
    pub fn reset(&mut self) {
        *self = Registry::default();
    }
}
