use cantal_core::{CantalError, Value};

/// What the interpreter does after a side-effecting host function returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionOutcome {
    /// Advance to the next statement right away.
    Continue,
    /// Stay on the calling statement until a timer of this length fires.
    Wait { duration_ms: u64 },
    /// Advance, then re-run state selection.
    Reselect,
}

/// Host-side storage a register resolves to once routing is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSlot {
    /// Actor parameter from the map data.
    Parameter(String),
    /// Save-store entry, keyed `mapName.actorName.variableName`.
    Saved(String),
}

/// The surface a scripted actor exposes to its scripts.
pub trait ScriptHost {
    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<FunctionOutcome, CantalError>;

    fn call_value_function(&mut self, name: &str, args: &[Value]) -> Result<Value, CantalError>;

    fn resolve_value(&self, slot: &StorageSlot) -> Value;

    fn write_register(&mut self, slot: &StorageSlot, value: Value) -> Result<(), CantalError>;
}
