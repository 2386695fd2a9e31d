//! Transaction event handling.
//!
//! The host transaction manager reports nesting-boundary events through
//! [`TxnEvent`]; this module drives the state histories and the changes
//! stack in response. Commit of a level merges its versions into the parent
//! in O(1) per object; abort discards them and reinstates the previous
//! state. Cost of either is proportional to the objects actually changed at
//! that level.

use crate::engine::Engine;
use satchel_core::{Level, PackageId, VariableId};

/// Transaction-boundary events, tagged implicitly with the engine's current
/// nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnEvent {
    /// A subtransaction began; nesting deepens by one.
    BeginSub,
    /// The innermost subtransaction committed into its parent.
    CommitSub,
    /// The innermost subtransaction aborted.
    AbortSub,
    /// The top-level transaction is about to commit.
    PreCommit,
    /// The top-level transaction aborted.
    Abort,
}

/// A tracked object: package or variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectRef {
    Package(PackageId),
    Variable(VariableId),
}

impl Engine {
    /// Current transaction nesting level; 0 means none active.
    pub fn current_level(&self) -> Level {
        self.level
    }

    /// Whether any object has pending (unfinalized) changes.
    pub fn has_pending_changes(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Apply a transaction-boundary event.
    pub fn dispatch(&mut self, event: TxnEvent) {
        match event {
            TxnEvent::BeginSub => {
                self.level += 1;
                // Lazy stack: a new frame is only needed once something has
                // been tracked at all.
                if !self.stack.is_empty() {
                    self.stack.push_frame();
                }
                tracing::trace!(level = self.level, "subtransaction began");
            }
            TxnEvent::CommitSub | TxnEvent::PreCommit => {
                if !self.stack.is_empty() {
                    self.commit_top();
                }
                self.level = self.level.saturating_sub(1);
                self.maybe_reset();
            }
            TxnEvent::AbortSub | TxnEvent::Abort => {
                if !self.stack.is_empty() {
                    self.abort_top();
                }
                self.level = self.level.saturating_sub(1);
                self.maybe_reset();
            }
        }
    }

    /// Whether the object already has a version at the current level.
    pub(crate) fn changed_in_current(&self, object: ObjectRef) -> bool {
        if self.stack.is_empty() {
            return false;
        }
        let head_level = match object {
            ObjectRef::Package(id) => self
                .registry
                .package(id)
                .map(|p| p.history.head().level),
            ObjectRef::Variable(id) => self
                .registry
                .variable(id)
                .map(|v| v.history.head().level),
        };
        head_level == Some(self.level)
    }

    /// Register a change to an existing tracked object: push a deep-copied
    /// version stamped with the current level and list the object in the
    /// level's frame. Idempotent within one level; a no-op outside any
    /// transaction (changes are then immediate and untracked).
    ///
    /// Every mutation path calls this before touching the payload, so a
    /// savepoint always predates the mutation.
    pub(crate) fn register_change(&mut self, object: ObjectRef) {
        if self.level == 0 || self.changed_in_current(object) {
            return;
        }
        self.stack.prepare(self.level);
        let level = self.level;
        match object {
            ObjectRef::Package(id) => {
                let pkg = self
                    .registry
                    .package_mut(id)
                    .expect("change registered for unknown package");
                pkg.history.push_version(level);
                self.stack.top_mut().packages.push(id);
                tracing::trace!(package = %id, level, "package version pushed");
            }
            ObjectRef::Variable(id) => {
                let var = self
                    .registry
                    .variable_mut(id)
                    .expect("change registered for unknown variable");
                var.history.push_version(level);
                self.stack.top_mut().variables.push(id);
                tracing::trace!(variable = %id, level, "variable version pushed");
            }
        }
    }

    /// Track a freshly created object: stamp its initial state with the
    /// current level and list it, without copying anything. A no-op outside
    /// any transaction.
    pub(crate) fn track_new(&mut self, object: ObjectRef) {
        if self.level == 0 {
            return;
        }
        self.stack.prepare(self.level);
        let level = self.level;
        match object {
            ObjectRef::Package(id) => {
                let pkg = self
                    .registry
                    .package_mut(id)
                    .expect("tracking unknown package");
                pkg.history.head_mut().level = level;
                self.stack.top_mut().packages.push(id);
            }
            ObjectRef::Variable(id) => {
                let var = self
                    .registry
                    .variable_mut(id)
                    .expect("tracking unknown variable");
                var.history.head_mut().level = level;
                self.stack.top_mut().variables.push(id);
            }
        }
    }

    /// Commit the top frame: merge this level's versions into the parent.
    ///
    /// Variables are processed before packages so that package invalidity is
    /// already visible when a variable's release logic consults it.
    fn commit_top(&mut self) {
        let level = self.level;
        debug_assert!(level >= 1);
        let frame = self.stack.pop_frame();
        tracing::debug!(level, objects = frame.len(), "committing level");

        for vid in frame.variables {
            self.commit_variable(vid, level);
        }
        for pid in frame.packages {
            self.commit_package(pid, level);
        }
    }

    fn commit_variable(&mut self, vid: VariableId, level: Level) {
        // Skip ids whose object was destroyed by an earlier finalize, and
        // stale listings already collapsed into this level.
        let Some(variable) = self.registry.variable(vid) else {
            return;
        };
        if variable.history.head().level != level {
            return;
        }

        // A variable committed under a removed package is itself dead.
        let package_invalid = self
            .registry
            .package(variable.package)
            .map_or(true, |pkg| !pkg.is_valid());
        if package_invalid {
            self.registry
                .variable_mut(vid)
                .expect("variable disappeared mid-commit")
                .history
                .head_mut()
                .valid = false;
        }

        let variable = self.registry.variable(vid).expect("variable disappeared mid-commit");
        let superseded_in_parent = variable.history.second_level() == Some(level - 1);

        if self.stack.is_empty() || superseded_in_parent {
            // The parent already holds its own version (or no enclosing
            // level tracks changes): drop the superseded state for good.
            let variable = self
                .registry
                .variable_mut(vid)
                .expect("variable disappeared mid-commit");
            variable.history.drop_superseded();
            if !variable.history.head().valid && variable.history.len() == 1 {
                self.destroy_variable(vid);
            } else {
                variable.history.head_mut().level = level - 1;
            }
        } else {
            // First change seen by the parent: collapse into its frame.
            self.registry
                .variable_mut(vid)
                .expect("variable disappeared mid-commit")
                .history
                .head_mut()
                .level = level - 1;
            self.stack.top_mut().variables.push(vid);
        }
    }

    fn commit_package(&mut self, pid: PackageId, level: Level) {
        let Some(package) = self.registry.package(pid) else {
            return;
        };
        if package.history.head().level != level {
            return;
        }
        let superseded_in_parent = package.history.second_level() == Some(level - 1);

        if self.stack.is_empty() || superseded_in_parent {
            let package = self
                .registry
                .package_mut(pid)
                .expect("package disappeared mid-commit");
            package.history.drop_superseded();
            if !package.history.head().valid && package.history.len() == 1 {
                self.destroy_package(pid);
            } else {
                package.history.head_mut().level = level - 1;
            }
        } else {
            self.registry
                .package_mut(pid)
                .expect("package disappeared mid-commit")
                .history
                .head_mut()
                .level = level - 1;
            self.stack.top_mut().packages.push(pid);
        }
    }

    /// Abort the top frame: discard this level's versions, reinstating the
    /// previous state of every changed object.
    fn abort_top(&mut self) {
        let level = self.level;
        debug_assert!(level >= 1);
        let frame = self.stack.pop_frame();
        tracing::debug!(level, objects = frame.len(), "aborting level");

        for vid in frame.variables {
            let Some(variable) = self.registry.variable_mut(vid) else {
                continue;
            };
            if variable.history.head().level != level {
                continue;
            }
            variable.history.discard_head();
            if variable.history.is_empty() {
                // Never existed before this level.
                self.destroy_variable(vid);
            }
        }

        for pid in frame.packages {
            let Some(package) = self.registry.package_mut(pid) else {
                continue;
            };
            if package.history.head().level != level {
                continue;
            }
            package.history.discard_head();
            if package.history.is_empty() {
                self.destroy_package(pid);
            }
            // Otherwise the previous state is reinstated. Undoing a removal
            // brings the package back with an empty regular map: regular
            // storage was released eagerly and is not recoverable.
        }
    }

    /// Destroy a variable entirely: detach from its package and release all
    /// retained states.
    pub(crate) fn destroy_variable(&mut self, vid: VariableId) {
        if let Some(variable) = self.registry.remove_variable_entry(vid) {
            tracing::debug!(variable = %vid, name = %variable.name, "variable destroyed");
        }
        self.cache.forget_variable(vid);
    }

    /// Destroy a package entirely, with every variable it still owns.
    pub(crate) fn destroy_package(&mut self, pid: PackageId) {
        if let Some(package) = self.registry.remove_package_entry(pid) {
            tracing::debug!(package = %pid, name = %package.name, "package destroyed");
        }
        self.cache.forget_package(pid);
    }

    /// The process-wide reset point: once the last frame has popped and the
    /// registry is empty, tear down caches and id counters so subsequent
    /// creation behaves as first-ever use.
    pub(crate) fn maybe_reset(&mut self) {
        if self.level == 0 && self.stack.is_empty() && self.registry.is_empty() {
            self.registry.reset();
            self.cache.clear();
            tracing::debug!("registry empty at top level; store reset");
        }
    }
}
