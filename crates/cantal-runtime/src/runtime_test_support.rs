use std::collections::BTreeMap;

use cantal_core::{AssignTarget, CantalError, Script, Value};

use crate::eval::{EvalContext, Reference};
use crate::host::{FunctionOutcome, ScriptHost, StorageSlot};
use crate::interpreter::ExecutionContext;

pub(crate) fn parse(source: &str) -> Script {
    cantal_parser::parse_script(source).expect("test script should parse")
}

/// Host double: records side-effecting calls and keeps parameters and saved
/// values in plain maps.
#[derive(Debug, Default)]
pub(crate) struct RecordingHost {
    pub(crate) calls: Vec<(String, Vec<Value>)>,
    pub(crate) parameters: BTreeMap<String, Value>,
    pub(crate) saved: BTreeMap<String, Value>,
}

impl RecordingHost {
    pub(crate) fn call_names(&self) -> Vec<&str> {
        self.calls.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub(crate) fn count_calls(&self, name: &str) -> usize {
        self.calls.iter().filter(|(called, _)| called == name).count()
    }

    pub(crate) fn printed(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter(|(name, _)| name == "print")
            .map(|(_, args)| args.iter().map(Value::to_text).collect::<String>())
            .collect()
    }
}

impl ScriptHost for RecordingHost {
    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<FunctionOutcome, CantalError> {
        let outcome = match name {
            "wait" => FunctionOutcome::Wait {
                duration_ms: args
                    .first()
                    .and_then(Value::as_int)
                    .map(|ms| ms.max(0) as u64)
                    .unwrap_or(0),
            },
            "triggerStateChange" => FunctionOutcome::Reselect,
            "print" | "count" | "mark" => FunctionOutcome::Continue,
            _ => {
                return Err(CantalError::UnknownFunction {
                    name: name.to_string(),
                })
            }
        };
        self.calls.push((name.to_string(), args.to_vec()));
        Ok(outcome)
    }

    fn call_value_function(&mut self, name: &str, args: &[Value]) -> Result<Value, CantalError> {
        match name {
            "toString" => Ok(Value::String(
                args.first().map(Value::to_text).unwrap_or_default(),
            )),
            "double" => Ok(Value::Int(
                args.first().and_then(Value::as_int).unwrap_or(0) * 2,
            )),
            _ => Err(CantalError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }

    fn resolve_value(&self, slot: &StorageSlot) -> Value {
        let stored = match slot {
            StorageSlot::Parameter(key) => self.parameters.get(key),
            StorageSlot::Saved(key) => self.saved.get(key),
        };
        stored.cloned().unwrap_or_default()
    }

    fn write_register(&mut self, slot: &StorageSlot, value: Value) -> Result<(), CantalError> {
        match slot {
            StorageSlot::Parameter(key) => self.parameters.insert(key.clone(), value),
            StorageSlot::Saved(key) => self.saved.insert(key.clone(), value),
        };
        Ok(())
    }
}

/// Execution context without routing: every symbol and register is one flat
/// map entry, keyed by its source spelling.
#[derive(Debug, Default)]
pub(crate) struct FlatContext {
    pub(crate) host: RecordingHost,
    pub(crate) symbols: BTreeMap<String, Value>,
}

impl EvalContext for FlatContext {
    fn constant(&self, _name: &str) -> Option<Value> {
        None
    }

    fn resolve_value(&mut self, reference: Reference<'_>) -> Value {
        let key = match reference {
            Reference::Register(register) => register.to_string(),
            Reference::Symbol(name) => name.to_string(),
        };
        self.symbols.get(&key).cloned().unwrap_or_default()
    }

    fn call_value_function(&mut self, name: &str, args: &[Value]) -> Result<Value, CantalError> {
        self.host.call_value_function(name, args)
    }
}

impl ExecutionContext for FlatContext {
    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<FunctionOutcome, CantalError> {
        self.host.call_function(name, args)
    }

    fn write(&mut self, target: &AssignTarget, value: Value) -> Result<(), CantalError> {
        let key = match target {
            AssignTarget::Register { register } => register.to_string(),
            AssignTarget::Symbol { name } => name.clone(),
        };
        self.symbols.insert(key, value);
        Ok(())
    }
}
