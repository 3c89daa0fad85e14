mod eval;
mod host;
mod interpreter;
mod machine;
mod timer;

#[cfg(test)]
mod runtime_test_support;

pub use eval::{evaluate, EvalContext, Reference};
pub use host::{FunctionOutcome, ScriptHost, StorageSlot};
pub use interpreter::{ExecutionContext, Interpreter, StepOutcome, DEFAULT_STATEMENT_BUDGET};
pub use machine::{
    ActorIdentity, MachineOptions, ScriptMachine, DEFAULT_MAX_STATE_SWITCH_DEPTH,
};
pub use timer::Timer;
