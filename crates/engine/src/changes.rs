//! Per-level change tracking.
//!
//! The changes stack holds one [`Frame`] per active nesting level; a frame
//! lists the objects first touched at that level. Finalizing a level pops
//! its frame and walks only those objects, which keeps commit and abort
//! O(k) in the number of objects actually changed.
//!
//! The stack is built lazily: nothing exists until the first transactional
//! change, at which point empty frames are pushed for every level below the
//! current one too. Frames hold non-owning ids; ids whose object has been
//! destroyed in the meantime are skipped during finalize (ids are never
//! reused, so a stale id cannot alias).

use satchel_core::{Level, PackageId, VariableId};
use smallvec::SmallVec;

/// Objects first changed at one nesting level.
///
/// Membership order does not affect correctness, but iteration is in
/// insertion order, which keeps finalize deterministic.
#[derive(Debug, Default)]
pub struct Frame {
    /// Variables changed at this level.
    pub variables: SmallVec<[VariableId; 8]>,
    /// Packages created, removed, or resurrected at this level.
    pub packages: SmallVec<[PackageId; 4]>,
}

impl Frame {
    /// Number of listed objects.
    pub fn len(&self) -> usize {
        self.variables.len() + self.packages.len()
    }

    /// Whether the frame lists nothing.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.packages.is_empty()
    }
}

/// Stack of frames, outermost level at the bottom.
#[derive(Debug, Default)]
pub struct ChangesStack {
    frames: Vec<Frame>,
}

impl ChangesStack {
    /// New stack with no frames.
    pub fn new() -> Self {
        ChangesStack::default()
    }

    /// Whether any level has pending changes. An empty stack means nothing
    /// is mid-transaction anywhere.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames. Equals the nesting depth whenever non-empty.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push an empty frame for a newly begun subtransaction.
    pub fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Lazily build frames up to the current nesting depth. A no-op when
    /// the stack already exists.
    pub fn prepare(&mut self, level: Level) {
        if self.frames.is_empty() {
            for _ in 0..level {
                self.frames.push(Frame::default());
            }
        } else {
            debug_assert_eq!(self.frames.len(), level as usize, "stack depth diverged from nesting level");
        }
    }

    /// Pop the frame of the level being finalized.
    ///
    /// # Panics
    ///
    /// Panics if no frame exists; callers check [`ChangesStack::is_empty`].
    pub fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("changes stack is empty")
    }

    /// Current top frame.
    ///
    /// # Panics
    ///
    /// Panics if no frame exists.
    pub fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("changes stack is empty")
    }
}
