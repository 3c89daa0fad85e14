use std::collections::BTreeMap;
use std::sync::Arc;

use cantal_core::{AssignTarget, CantalError, EventName, RegisterSpace, Script, Value};
use log::{debug, warn};

use crate::eval::{evaluate, EvalContext, Reference};
use crate::host::{FunctionOutcome, ScriptHost, StorageSlot};
use crate::interpreter::{ExecutionContext, Interpreter, StepOutcome, DEFAULT_STATEMENT_BUDGET};
use crate::timer::Timer;

pub const DEFAULT_MAX_STATE_SWITCH_DEPTH: usize = 32;

/// Who owns a machine: the map it lives on and, optionally, the actor name
/// that scopes its saved variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorIdentity {
    pub map_name: String,
    pub actor_name: Option<String>,
}

impl ActorIdentity {
    pub fn new(map_name: impl Into<String>, actor_name: Option<String>) -> Self {
        Self {
            map_name: map_name.into(),
            actor_name,
        }
    }

    /// Save-store key of a persisted variable, `mapName.actorName.variable`.
    pub fn saved_key(&self, variable: &str) -> Result<String, CantalError> {
        match &self.actor_name {
            Some(actor_name) => Ok(format!("{}.{}.{}", self.map_name, actor_name, variable)),
            None => Err(CantalError::MissingActorName {
                variable: variable.to_string(),
            }),
        }
    }

    pub fn display_name(&self) -> String {
        match &self.actor_name {
            Some(name) => name.clone(),
            None => format!("<unnamed actor on {}>", self.map_name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineOptions {
    pub statement_budget: usize,
    pub max_state_switch_depth: usize,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            statement_budget: DEFAULT_STATEMENT_BUDGET,
            max_state_switch_depth: DEFAULT_MAX_STATE_SWITCH_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StepAction {
    Run,
    NewFrame,
    Resume,
    Proceed,
}

/// Runs one actor's script: picks the active state, owns one interpreter per
/// event of that state and the timers their blocking calls armed.
#[derive(Debug)]
pub struct ScriptMachine {
    script: Arc<Script>,
    identity: ActorIdentity,
    options: MachineOptions,
    locals: BTreeMap<String, Value>,
    current_state: Option<usize>,
    interpreters: BTreeMap<EventName, Interpreter>,
    timers: Vec<Timer>,
    generation: u64,
    switch_depth: usize,
}

impl ScriptMachine {
    pub fn new(
        script: Arc<Script>,
        identity: ActorIdentity,
        options: MachineOptions,
    ) -> Result<Self, CantalError> {
        if identity.actor_name.is_none() {
            if let Some(variable) = script.variables.iter().find(|variable| variable.persisted) {
                return Err(CantalError::MissingActorName {
                    variable: variable.name.clone(),
                });
            }
        }

        let locals = initial_locals(&script);
        Ok(Self {
            script,
            identity,
            options,
            locals,
            current_state: None,
            interpreters: BTreeMap::new(),
            timers: Vec::new(),
            generation: 0,
            switch_depth: 0,
        })
    }

    pub fn script(&self) -> &Arc<Script> {
        &self.script
    }

    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub fn is_active(&self) -> bool {
        self.current_state.is_some()
    }

    pub fn current_state_name(&self) -> Option<&str> {
        self.current_state
            .and_then(|index| self.script.states.get(index))
            .map(|state| state.name.as_str())
    }

    pub fn pending_timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn interpreter(&self, event: EventName) -> Option<&Interpreter> {
        self.interpreters.get(&event)
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    /// Seeds saved defaults, selects the first matching state and fires
    /// `spawn` on it.
    pub fn activate(&mut self, host: &mut dyn ScriptHost) -> Result<(), CantalError> {
        self.initialize_saved_defaults(host)?;
        self.select_state(host)?;
        self.trigger(EventName::Spawn, host)
    }

    /// Starts the handler for `event` in the current state, if it has one.
    pub fn trigger(&mut self, event: EventName, host: &mut dyn ScriptHost) -> Result<(), CantalError> {
        if self.current_state.is_none() {
            return Ok(());
        }
        self.run_event(event, host)
    }

    /// Advances every interpreter and timer by one frame of `dt_ms`.
    ///
    /// A failing handler is aborted on its own; the rest of the frame still
    /// runs and the first error is returned at the end.
    pub fn on_new_frame(&mut self, dt_ms: u64, host: &mut dyn ScriptHost) -> Result<(), CantalError> {
        if self.current_state.is_none() {
            return Ok(());
        }

        // Timers armed during this frame start counting on the next one.
        let generation = self.generation;
        let mut first_error = None;
        let mut existing = std::mem::take(&mut self.timers);
        let events: Vec<EventName> = self.interpreters.keys().copied().collect();
        for event in events {
            let stepped = self
                .step(event, host, StepAction::NewFrame)
                .and_then(|outcome| self.drive(event, outcome, host));
            if let Err(error) = stepped {
                self.abort(event, generation);
                first_error = first_error.or(Some(error));
            }
            if self.generation != generation {
                return first_error.map_or(Ok(()), Err);
            }
        }

        let mut fired = Vec::new();
        existing.retain_mut(|timer| {
            if timer.update(dt_ms) {
                fired.push(timer.event());
                false
            } else {
                true
            }
        });
        existing.append(&mut self.timers);
        self.timers = existing;

        for event in fired {
            if self.generation != generation {
                break;
            }
            debug!(
                "timer fired for {} of {}",
                event,
                self.identity.display_name()
            );
            let resumed = self
                .step(event, host, StepAction::Resume)
                .and_then(|outcome| self.drive(event, outcome, host));
            if let Err(error) = resumed {
                self.abort(event, generation);
                first_error = first_error.or(Some(error));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Resets every interpreter, drops pending timers and restores locals to
    /// their declared defaults.
    pub fn despawn(&mut self) {
        for interpreter in self.interpreters.values_mut() {
            interpreter.reset();
        }
        self.interpreters.clear();
        self.timers.clear();
        self.locals = initial_locals(&self.script);
        self.current_state = None;
        self.switch_depth = 0;
        self.generation += 1;
    }

    /// Re-evaluates state conditions in declaration order; the first true one
    /// becomes current.
    pub fn select_state(&mut self, host: &mut dyn ScriptHost) -> Result<(), CantalError> {
        let index = self.find_active_state(host)?;
        if self.current_state == Some(index) {
            return Ok(());
        }
        self.switch_to(index, host)
    }

    fn initialize_saved_defaults(&mut self, host: &mut dyn ScriptHost) -> Result<(), CantalError> {
        for variable in self.script.variables.iter().filter(|variable| variable.persisted) {
            let Some(default) = &variable.default else {
                continue;
            };
            let slot = StorageSlot::Saved(self.identity.saved_key(&variable.name)?);
            if host.resolve_value(&slot).is_absent() {
                host.write_register(&slot, default.clone())?;
            }
        }
        Ok(())
    }

    fn find_active_state(&mut self, host: &mut dyn ScriptHost) -> Result<usize, CantalError> {
        let Self {
            script,
            identity,
            locals,
            ..
        } = self;
        let mut router = RegisterRouter {
            script,
            identity,
            locals,
            host,
        };
        for (index, state) in script.states.iter().enumerate() {
            if evaluate(&state.condition, &mut router)?.is_truthy() {
                return Ok(index);
            }
        }
        Err(CantalError::NoActiveState {
            actor_name: identity.display_name(),
        })
    }

    fn switch_to(&mut self, index: usize, host: &mut dyn ScriptHost) -> Result<(), CantalError> {
        if self.switch_depth >= self.options.max_state_switch_depth {
            return Err(CantalError::StateSwitchOverflow {
                actor_name: self.identity.display_name(),
                limit: self.options.max_state_switch_depth,
            });
        }

        let script = Arc::clone(&self.script);
        let Some(state) = script.states.get(index) else {
            return Ok(());
        };
        debug!(
            "{} switches state {} -> {}",
            self.identity.display_name(),
            self.current_state_name().unwrap_or("<none>"),
            state.name
        );

        for interpreter in self.interpreters.values_mut() {
            interpreter.reset();
        }
        self.timers.clear();
        self.generation += 1;
        self.current_state = Some(index);
        let budget = self.options.statement_budget;
        self.interpreters = state
            .events
            .iter()
            .map(|(event, block)| {
                (*event, Interpreter::new(*event, *block, budget))
            })
            .collect();

        self.switch_depth += 1;
        let started = self.start_state_handlers(host);
        self.switch_depth -= 1;
        started
    }

    fn start_state_handlers(&mut self, host: &mut dyn ScriptHost) -> Result<(), CantalError> {
        let generation = self.generation;
        for event in [EventName::Loop, EventName::EnterState] {
            self.run_event(event, host)?;
            if self.generation != generation {
                break;
            }
        }
        Ok(())
    }

    /// Stops the handler for `event` after a fatal error, unless a state
    /// switch already replaced it.
    fn abort(&mut self, event: EventName, generation: u64) {
        if self.generation != generation {
            return;
        }
        if let Some(interpreter) = self.interpreters.get_mut(&event) {
            interpreter.reset();
        }
        self.timers.retain(|timer| timer.event() != event);
        debug!(
            "aborted {} of {}",
            event,
            self.identity.display_name()
        );
    }

    fn run_event(&mut self, event: EventName, host: &mut dyn ScriptHost) -> Result<(), CantalError> {
        let outcome = self.step(event, host, StepAction::Run)?;
        self.drive(event, outcome, host)
    }

    /// Acts on what an interpreter yielded until it needs another frame,
    /// a timer, or the state it belonged to is gone.
    fn drive(
        &mut self,
        event: EventName,
        mut outcome: StepOutcome,
        host: &mut dyn ScriptHost,
    ) -> Result<(), CantalError> {
        loop {
            match outcome {
                StepOutcome::Idle | StepOutcome::Finished | StepOutcome::FrameBudgetExhausted => {
                    return Ok(());
                }
                StepOutcome::Waiting { duration_ms } => {
                    self.timers.push(Timer::new(event, duration_ms));
                    return Ok(());
                }
                StepOutcome::StateReselect => {
                    let generation = self.generation;
                    self.select_state(host)?;
                    if self.generation != generation {
                        return Ok(());
                    }
                    outcome = self.step(event, host, StepAction::Proceed)?;
                }
            }
        }
    }

    fn step(
        &mut self,
        event: EventName,
        host: &mut dyn ScriptHost,
        action: StepAction,
    ) -> Result<StepOutcome, CantalError> {
        let Self {
            script,
            identity,
            locals,
            interpreters,
            ..
        } = self;
        let Some(interpreter) = interpreters.get_mut(&event) else {
            return Ok(StepOutcome::Idle);
        };
        let mut router = RegisterRouter {
            script,
            identity,
            locals,
            host,
        };
        match action {
            StepAction::Run => interpreter.run(script, &mut router),
            StepAction::NewFrame => interpreter.on_new_frame(script, &mut router),
            StepAction::Resume => interpreter.resume(script, &mut router),
            StepAction::Proceed => interpreter.proceed(script, &mut router),
        }
    }
}

fn initial_locals(script: &Script) -> BTreeMap<String, Value> {
    script
        .variables
        .iter()
        .filter(|variable| !variable.persisted)
        .map(|variable| {
            (
                variable.name.clone(),
                variable.default.clone().unwrap_or_default(),
            )
        })
        .collect()
}

/// Routes register and symbol access to the local store or the host.
struct RegisterRouter<'a> {
    script: &'a Script,
    identity: &'a ActorIdentity,
    locals: &'a mut BTreeMap<String, Value>,
    host: &'a mut dyn ScriptHost,
}

impl RegisterRouter<'_> {
    fn is_local(&self, name: &str) -> bool {
        self.script
            .variable(name)
            .is_some_and(|variable| !variable.persisted)
    }

    fn read_variable(&mut self, name: &str) -> Value {
        if self.is_local(name) {
            return self.locals.get(name).cloned().unwrap_or_default();
        }
        self.read_saved(name)
    }

    fn read_saved(&mut self, name: &str) -> Value {
        match self.identity.saved_key(name) {
            Ok(key) => self.host.resolve_value(&StorageSlot::Saved(key)),
            Err(_) => Value::Absent,
        }
    }

    fn write_variable(&mut self, name: &str, value: Value) -> Result<(), CantalError> {
        if self.is_local(name) {
            self.locals.insert(name.to_string(), value);
            return Ok(());
        }
        self.write_saved(name, value)
    }

    fn write_saved(&mut self, name: &str, value: Value) -> Result<(), CantalError> {
        let key = self.identity.saved_key(name)?;
        self.host.write_register(&StorageSlot::Saved(key), value)
    }
}

impl EvalContext for RegisterRouter<'_> {
    fn constant(&self, name: &str) -> Option<Value> {
        self.script.constant(name).cloned()
    }

    fn resolve_value(&mut self, reference: Reference<'_>) -> Value {
        match reference {
            Reference::Symbol(name) => {
                if self.script.variable(name).is_some() {
                    self.read_variable(name)
                } else {
                    Value::Absent
                }
            }
            Reference::Register(register) => match register.space {
                RegisterSpace::Parameters => self
                    .host
                    .resolve_value(&StorageSlot::Parameter(register.key.clone())),
                RegisterSpace::Variables => self.read_variable(&register.key),
                RegisterSpace::SavedVariables => self.read_saved(&register.key),
                RegisterSpace::MessageParameters => Value::Absent,
            },
        }
    }

    fn call_value_function(&mut self, name: &str, args: &[Value]) -> Result<Value, CantalError> {
        self.host.call_value_function(name, args)
    }
}

impl ExecutionContext for RegisterRouter<'_> {
    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<FunctionOutcome, CantalError> {
        self.host.call_function(name, args)
    }

    fn write(&mut self, target: &AssignTarget, value: Value) -> Result<(), CantalError> {
        match target {
            AssignTarget::Symbol { name } => {
                if self.script.constant(name).is_some() {
                    return Err(CantalError::ConstantAssignment { name: name.clone() });
                }
                if self.script.variable(name).is_none() {
                    return Err(CantalError::UnknownSymbol { name: name.clone() });
                }
                self.write_variable(name, value)
            }
            AssignTarget::Register { register } => match register.space {
                RegisterSpace::Parameters => self
                    .host
                    .write_register(&StorageSlot::Parameter(register.key.clone()), value),
                RegisterSpace::Variables => self.write_variable(&register.key, value),
                RegisterSpace::SavedVariables => self.write_saved(&register.key, value),
                RegisterSpace::MessageParameters => {
                    warn!("discarding write to reserved register {}", register);
                    Ok(())
                }
            },
        }
    }
}

#[cfg(test)]
mod machine_tests {
    use super::*;
    use crate::runtime_test_support::*;

    fn machine(source: &str, actor_name: Option<&str>) -> ScriptMachine {
        ScriptMachine::new(
            Arc::new(parse(source)),
            ActorIdentity::new("town", actor_name.map(str::to_string)),
            MachineOptions::default(),
        )
        .expect("machine should build")
    }

    fn active(source: &str, host: &mut RecordingHost) -> ScriptMachine {
        let mut machine = machine(source, Some("Bob"));
        machine.activate(host).expect("activation should succeed");
        machine
    }

    #[test]
    fn constants_resolve_in_conditions_and_statements() {
        let mut host = RecordingHost::default();
        let machine = active(
            "const X = 5; state S(X == 5) { event spawn() { print(X); } }",
            &mut host,
        );
        assert_eq!(machine.current_state_name(), Some("S"));
        assert_eq!(host.printed(), vec!["5"]);
    }

    #[test]
    fn affectation_switches_state_before_the_next_statement() {
        let mut host = RecordingHost::default();
        let machine = active(
            r#"
            var flag = false;
            state First(flag) { event enterState() { mark("first"); } }
            state Second(true) { event spawn() { flag = true; print("after"); } }
            "#,
            &mut host,
        );
        assert_eq!(machine.current_state_name(), Some("First"));
        assert_eq!(machine.local("flag"), Some(&Value::Bool(true)));
        assert_eq!(host.call_names(), vec!["mark"]);
        assert!(machine.interpreter(EventName::Spawn).is_none());
    }

    #[test]
    fn write_that_keeps_the_state_continues_the_handler() {
        let mut host = RecordingHost::default();
        let machine = active(
            r#"var n = 0; state S(true) { event spawn() { n = n + 1; n = n + 1; print(n); } }"#,
            &mut host,
        );
        assert_eq!(host.printed(), vec!["2"]);
        assert_eq!(machine.local("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn loop_budget_is_sliced_per_frame_and_restarts() {
        let body = "count();".repeat(250);
        let source = format!("state S(true) {{ event loop() {{ {} }} }}", body);
        let mut host = RecordingHost::default();
        let mut machine = active(&source, &mut host);
        let executed = |machine: &ScriptMachine| {
            machine
                .interpreter(EventName::Loop)
                .expect("loop handler")
                .executed_statements()
        };

        assert_eq!(executed(&machine), 100);
        machine.on_new_frame(16, &mut host).expect("frame 1");
        assert_eq!(executed(&machine), 200);
        machine.on_new_frame(16, &mut host).expect("frame 2");
        assert_eq!(executed(&machine), 250);
        assert!(machine
            .interpreter(EventName::Loop)
            .expect("loop handler")
            .should_loop_after_finish());

        machine.on_new_frame(16, &mut host).expect("frame 3");
        assert_eq!(executed(&machine), 350);
        assert_eq!(host.count_calls("count"), 350);
    }

    #[test]
    fn wait_resumes_once_accumulated_delta_reaches_duration() {
        let mut host = RecordingHost::default();
        let mut machine = active(
            r#"state S(true) { event spawn() { wait(500); print("done"); } }"#,
            &mut host,
        );
        assert_eq!(machine.pending_timer_count(), 1);

        machine.on_new_frame(250, &mut host).expect("frame");
        machine.on_new_frame(249, &mut host).expect("frame");
        assert!(host.printed().is_empty());
        assert!(machine
            .interpreter(EventName::Spawn)
            .expect("spawn handler")
            .is_suspended());

        machine.on_new_frame(1, &mut host).expect("frame");
        assert_eq!(host.printed(), vec!["done"]);
        assert_eq!(machine.pending_timer_count(), 0);
    }

    #[test]
    fn waiting_loop_restarts_on_the_frame_after_it_finishes() {
        let mut host = RecordingHost::default();
        let mut machine = active(
            "state S(true) { event loop() { count(); wait(100); } }",
            &mut host,
        );
        assert_eq!(host.count_calls("count"), 1);

        machine.on_new_frame(100, &mut host).expect("timer fires");
        assert_eq!(host.count_calls("count"), 1);
        machine.on_new_frame(16, &mut host).expect("loop restarts");
        assert_eq!(host.count_calls("count"), 2);
        assert_eq!(machine.pending_timer_count(), 1);
    }

    #[test]
    fn saved_variables_round_trip_through_the_host_store() {
        let source = r#"
            saved var visits = 0;
            state Visited(visits >= 2) { }
            state Fresh(true) { event actionPressed() { visits = visits + 1; } }
        "#;
        let mut host = RecordingHost::default();
        let mut first = active(source, &mut host);
        assert_eq!(host.saved.get("town.Bob.visits"), Some(&Value::Int(0)));

        first
            .trigger(EventName::ActionPressed, &mut host)
            .expect("first press");
        assert_eq!(first.current_state_name(), Some("Fresh"));
        first
            .trigger(EventName::ActionPressed, &mut host)
            .expect("second press");
        assert_eq!(first.current_state_name(), Some("Visited"));

        let reloaded = active(source, &mut host);
        assert_eq!(reloaded.current_state_name(), Some("Visited"));
        assert_eq!(host.saved.get("town.Bob.visits"), Some(&Value::Int(2)));
    }

    #[test]
    fn saved_variables_require_an_actor_name() {
        let error = ScriptMachine::new(
            Arc::new(parse("saved var met; state S(true) { }")),
            ActorIdentity::new("town", None),
            MachineOptions::default(),
        )
        .expect_err("unnamed actor cannot persist");
        assert_eq!(
            error,
            CantalError::MissingActorName {
                variable: "met".to_string()
            }
        );
    }

    #[test]
    fn unknown_function_aborts_the_handler_and_allows_a_retry() {
        let mut host = RecordingHost::default();
        let mut machine = active(
            r#"state S(true) { event actionPressed() { print("a"); teleport(); print("b"); } }"#,
            &mut host,
        );

        let error = machine
            .trigger(EventName::ActionPressed, &mut host)
            .expect_err("teleport is not a host function");
        assert_eq!(
            error,
            CantalError::UnknownFunction {
                name: "teleport".to_string()
            }
        );
        let handler = machine
            .interpreter(EventName::ActionPressed)
            .expect("handler");
        assert!(!handler.is_running());
        assert_eq!(handler.block_depth(), 0);

        assert!(machine.trigger(EventName::ActionPressed, &mut host).is_err());
        assert_eq!(host.printed(), vec!["a", "a"]);
    }

    #[test]
    fn failing_timer_resume_does_not_freeze_sibling_handlers() {
        let mut host = RecordingHost::default();
        let mut machine = active(
            r#"
            state S(true) {
                event loop() { wait(100); teleport(); }
                event actionPressed() { wait(100); print("b"); }
            }
            "#,
            &mut host,
        );
        machine
            .trigger(EventName::ActionPressed, &mut host)
            .expect("press");
        assert_eq!(machine.pending_timer_count(), 2);

        let error = machine
            .on_new_frame(100, &mut host)
            .expect_err("loop resumes into teleport");
        assert_eq!(
            error,
            CantalError::UnknownFunction {
                name: "teleport".to_string()
            }
        );
        assert_eq!(host.printed(), vec!["b"]);

        let pressed = machine
            .interpreter(EventName::ActionPressed)
            .expect("handler");
        assert!(!pressed.is_running());
        assert!(!pressed.is_suspended());
        let looped = machine.interpreter(EventName::Loop).expect("loop");
        assert!(!looped.is_running());
        assert_eq!(machine.pending_timer_count(), 0);

        machine
            .trigger(EventName::ActionPressed, &mut host)
            .expect("press again");
        machine.on_new_frame(100, &mut host).expect("frame");
        assert_eq!(host.printed(), vec!["b", "b"]);
    }

    #[test]
    fn failing_frame_step_still_advances_timers() {
        let body = "count();".repeat(100);
        let mut host = RecordingHost::default();
        let mut machine = active(
            &format!(
                r#"state S(true) {{
                    event loop() {{ {} teleport(); }}
                    event actionPressed() {{ wait(50); print("b"); }}
                }}"#,
                body
            ),
            &mut host,
        );
        machine
            .trigger(EventName::ActionPressed, &mut host)
            .expect("press");

        let error = machine
            .on_new_frame(50, &mut host)
            .expect_err("loop continues into teleport");
        assert_eq!(error.code(), "UNKNOWN_FUNCTION");
        assert_eq!(host.printed(), vec!["b"]);
        assert_eq!(machine.pending_timer_count(), 0);
    }

    #[test]
    fn no_true_condition_names_the_actor() {
        let mut host = RecordingHost::default();
        let mut machine = machine("state Closed(false) { }", Some("Chest"));
        let error = machine
            .activate(&mut host)
            .expect_err("no state can be active");
        assert_eq!(
            error,
            CantalError::NoActiveState {
                actor_name: "Chest".to_string()
            }
        );
        assert!(!machine.is_active());
    }

    #[test]
    fn first_declared_true_state_wins() {
        let mut host = RecordingHost::default();
        let machine = active("state A(true) { } state B(true) { }", &mut host);
        assert_eq!(machine.current_state_name(), Some("A"));
    }

    #[test]
    fn writes_to_constants_and_undeclared_symbols_fail() {
        let mut host = RecordingHost::default();
        let mut machine = active(
            r#"
            const LIMIT = 3;
            state S(true) {
                event actionPressed() { LIMIT = 4; }
                event characterTouchEvent() { ghost = 1; }
            }
            "#,
            &mut host,
        );
        let error = machine
            .trigger(EventName::ActionPressed, &mut host)
            .expect_err("constants are read-only");
        assert!(matches!(error, CantalError::ConstantAssignment { ref name } if name == "LIMIT"));

        let error = machine
            .trigger(EventName::CharacterTouchEvent, &mut host)
            .expect_err("ghost was never declared");
        assert!(matches!(error, CantalError::UnknownSymbol { ref name } if name == "ghost"));
    }

    #[test]
    fn registers_route_to_parameters_locals_and_saved_store() {
        let mut host = RecordingHost::default();
        host.parameters
            .insert("charset".to_string(), Value::from("villager"));
        let machine = active(
            r#"
            var mood = "calm";
            state S(true) {
                event spawn() {
                    print(parameters[charset]);
                    variables[mood] = "angry";
                    variables["tmp"] = 7;
                    savedVariables[met] = true;
                    messageParameters[x] = 1;
                    print(messageParameters[x]);
                }
            }
            "#,
            &mut host,
        );
        assert_eq!(host.printed(), vec!["villager", ""]);
        assert_eq!(machine.local("mood"), Some(&Value::from("angry")));
        assert_eq!(host.saved.get("town.Bob.tmp"), Some(&Value::Int(7)));
        assert_eq!(host.saved.get("town.Bob.met"), Some(&Value::Bool(true)));
        assert!(!host.saved.contains_key("town.Bob.mood"));
    }

    #[test]
    fn trigger_state_change_reselects_after_host_side_changes() {
        let mut host = RecordingHost::default();
        let mut machine = active(
            r#"
            state Open(parameters[open]) { event enterState() { mark("opened"); } }
            state Closed(true) { event actionPressed() { triggerStateChange(); print("never"); } }
            "#,
            &mut host,
        );
        host.parameters.insert("open".to_string(), Value::Bool(true));
        machine
            .trigger(EventName::ActionPressed, &mut host)
            .expect("press");
        assert_eq!(machine.current_state_name(), Some("Open"));
        assert!(host.printed().is_empty());
        assert_eq!(host.count_calls("mark"), 1);
    }

    #[test]
    fn state_switch_discards_pending_timers() {
        let mut host = RecordingHost::default();
        let mut machine = active(
            r#"
            var done = false;
            state Done(done) { }
            state Busy(true) {
                event loop() { wait(1000); print("late"); }
                event actionPressed() { done = true; }
            }
            "#,
            &mut host,
        );
        assert_eq!(machine.pending_timer_count(), 1);
        machine
            .trigger(EventName::ActionPressed, &mut host)
            .expect("press");
        assert_eq!(machine.current_state_name(), Some("Done"));
        assert_eq!(machine.pending_timer_count(), 0);

        machine.on_new_frame(2000, &mut host).expect("frame");
        assert!(host.printed().is_empty());
    }

    #[test]
    fn flip_flopping_states_hit_the_switch_depth_limit() {
        let mut host = RecordingHost::default();
        let mut machine = machine(
            r#"
            var flag = false;
            state A(flag) { event enterState() { flag = false; } }
            state B(!flag) { event enterState() { flag = true; } }
            "#,
            Some("Flipper"),
        );
        let error = machine
            .activate(&mut host)
            .expect_err("states flip forever");
        assert_eq!(
            error,
            CantalError::StateSwitchOverflow {
                actor_name: "Flipper".to_string(),
                limit: DEFAULT_MAX_STATE_SWITCH_DEPTH,
            }
        );
    }

    #[test]
    fn despawn_resets_handlers_timers_and_locals() {
        let mut host = RecordingHost::default();
        let mut machine = active(
            r#"var n = 1; state S(true) { event spawn() { n = 5; wait(300); } }"#,
            &mut host,
        );
        assert_eq!(machine.local("n"), Some(&Value::Int(5)));
        assert_eq!(machine.pending_timer_count(), 1);

        machine.despawn();
        assert!(!machine.is_active());
        assert_eq!(machine.pending_timer_count(), 0);
        assert_eq!(machine.local("n"), Some(&Value::Int(1)));
        assert!(machine.interpreter(EventName::Spawn).is_none());

        machine.on_new_frame(500, &mut host).expect("inactive frame");
        assert_eq!(host.count_calls("wait"), 1);
    }

    #[test]
    fn custom_statement_budget_is_honoured() {
        let mut host = RecordingHost::default();
        let mut machine = ScriptMachine::new(
            Arc::new(parse(&format!(
                "state S(true) {{ event spawn() {{ {} }} }}",
                "count();".repeat(5)
            ))),
            ActorIdentity::new("town", Some("Bob".to_string())),
            MachineOptions {
                statement_budget: 2,
                ..MachineOptions::default()
            },
        )
        .expect("machine");
        machine.activate(&mut host).expect("activate");
        assert_eq!(host.count_calls("count"), 2);
        machine.on_new_frame(16, &mut host).expect("frame");
        assert_eq!(host.count_calls("count"), 4);
        machine.on_new_frame(16, &mut host).expect("frame");
        assert_eq!(host.count_calls("count"), 5);
    }
}
