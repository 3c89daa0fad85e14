use std::collections::BTreeMap;

use cantal_core::{CantalError, EventName, Orientation, Value};
use cantal_runtime::{ActorIdentity, MachineOptions, ScriptHost, ScriptMachine};

use crate::cache::ScriptCache;
use crate::host::{ActorCommand, ActorEnv, ActorHost, TilePosition};

/// Static description of an actor placed on a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorSpec {
    pub name: Option<String>,
    pub position: TilePosition,
    pub orientation: Orientation,
    pub parameters: BTreeMap<String, Value>,
    pub script: Option<String>,
}

impl ActorSpec {
    pub fn new(name: Option<&str>, position: TilePosition) -> Self {
        Self {
            name: name.map(str::to_string),
            position,
            orientation: Orientation::Down,
            parameters: BTreeMap::new(),
            script: None,
        }
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }
}

/// A scripted map entity.
#[derive(Debug)]
pub struct Actor {
    label: String,
    name: Option<String>,
    position: TilePosition,
    orientation: Orientation,
    parameters: BTreeMap<String, Value>,
    script_name: Option<String>,
    machine: Option<ScriptMachine>,
    spawned: bool,
    commands: Vec<ActorCommand>,
}

impl Actor {
    pub fn new(spec: ActorSpec) -> Self {
        let label = spec.name.clone().unwrap_or_else(|| {
            format!("actor@{},{}", spec.position.0, spec.position.1)
        });
        Self {
            label,
            name: spec.name,
            position: spec.position,
            orientation: spec.orientation,
            parameters: spec.parameters,
            script_name: spec.script,
            machine: None,
            spawned: false,
            commands: Vec::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn position(&self) -> TilePosition {
        self.position
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    pub fn is_spawned(&self) -> bool {
        self.spawned
    }

    pub fn machine(&self) -> Option<&ScriptMachine> {
        self.machine.as_ref()
    }

    pub fn current_state_name(&self) -> Option<&str> {
        self.machine
            .as_ref()
            .and_then(ScriptMachine::current_state_name)
    }

    /// Parses (or fetches from `cache`) the actor's script and prepares its
    /// machine. Actors without a script stay inert.
    pub fn load(
        &mut self,
        map_name: &str,
        cache: &mut ScriptCache,
        options: MachineOptions,
    ) -> Result<(), CantalError> {
        let Some(script_name) = &self.script_name else {
            return Ok(());
        };
        let script = cache.load(map_name, script_name)?;
        let identity = ActorIdentity::new(map_name, self.name.clone());
        self.machine = Some(ScriptMachine::new(script, identity, options)?);
        Ok(())
    }

    /// Activates the script: saved defaults, state selection, then `spawn`.
    pub fn spawn(&mut self, env: &mut ActorEnv<'_>) -> Result<(), CantalError> {
        if self.spawned {
            return Ok(());
        }
        self.spawned = true;
        self.with_machine(env, |machine, host| machine.activate(host))
    }

    /// Resets every interpreter and timer and clears local variables.
    pub fn despawn(&mut self) {
        if !self.spawned {
            return;
        }
        self.spawned = false;
        if let Some(machine) = &mut self.machine {
            machine.despawn();
        }
    }

    pub fn on_action_pressed(&mut self, env: &mut ActorEnv<'_>) -> Result<(), CantalError> {
        self.trigger(EventName::ActionPressed, env)
    }

    pub fn on_character_entered_tile(&mut self, env: &mut ActorEnv<'_>) -> Result<(), CantalError> {
        self.trigger(EventName::CharacterEnteredTile, env)
    }

    pub fn on_character_touch_event(&mut self, env: &mut ActorEnv<'_>) -> Result<(), CantalError> {
        self.trigger(EventName::CharacterTouchEvent, env)
    }

    /// One frame tick.
    pub fn update(&mut self, dt_ms: u64, env: &mut ActorEnv<'_>) -> Result<(), CantalError> {
        if !self.spawned {
            return Ok(());
        }
        self.with_machine(env, |machine, host| machine.on_new_frame(dt_ms, host))
    }

    /// Takes every command queued since the last drain.
    pub fn drain_commands(&mut self) -> Vec<ActorCommand> {
        std::mem::take(&mut self.commands)
    }

    fn trigger(&mut self, event: EventName, env: &mut ActorEnv<'_>) -> Result<(), CantalError> {
        if !self.spawned {
            return Ok(());
        }
        self.with_machine(env, |machine, host| machine.trigger(event, host))
    }

    fn with_machine(
        &mut self,
        env: &mut ActorEnv<'_>,
        f: impl FnOnce(&mut ScriptMachine, &mut dyn ScriptHost) -> Result<(), CantalError>,
    ) -> Result<(), CantalError> {
        let Self {
            label,
            position,
            orientation,
            parameters,
            machine,
            commands,
            ..
        } = self;
        let Some(machine) = machine else {
            return Ok(());
        };
        let mut host = ActorHost {
            label,
            position,
            orientation,
            parameters,
            commands,
            env,
        };
        f(machine, &mut host)
    }
}
