//! Scalar variable storage.

use satchel_core::Value;

/// A single scalar slot. `None` models SQL NULL; the declared kind lives on
/// the owning variable, so a null slot keeps its type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarSlot {
    value: Option<Value>,
}

impl ScalarSlot {
    /// New slot holding NULL.
    pub fn new() -> Self {
        ScalarSlot { value: None }
    }

    /// Current value, `None` when NULL.
    pub fn get(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Overwrite the slot; the previous value is released.
    pub fn set(&mut self, value: Option<Value>) {
        self.value = value;
    }

    /// Whether the slot holds NULL.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Approximate bytes retained by the stored value.
    pub fn retained_bytes(&self) -> usize {
        self.value.as_ref().map_or(0, Value::retained_bytes)
    }
}
