use std::collections::BTreeMap;

use cantal_core::{CantalError, Orientation, Value};
use cantal_runtime::{FunctionOutcome, ScriptHost, StorageSlot};
use log::{info, warn};

use crate::save_store::SaveStore;
use crate::strings::StringTable;

/// Side-effecting functions scripts may call as statements.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "wait",
    "print",
    "triggerStateChange",
    "lockInputs",
    "unlockInputs",
    "setOrientation",
    "turnToFaceCharacter",
    "walk",
    "setParameter",
];

/// Functions scripts may call inside expressions.
pub const BUILTIN_VALUE_FUNCTIONS: &[&str] = &["getString", "toString", "inParameters"];

/// Time one `walk` step takes, matching the camera movement duration.
pub const MOVEMENT_DURATION_MS: u64 = 200;

pub type TilePosition = (i64, i64);

/// Something the game layer has to render or apply for an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorCommand {
    Print {
        text: String,
    },
    LockInputs,
    UnlockInputs,
    SetOrientation {
        orientation: Orientation,
    },
    Walk {
        orientation: Orientation,
        from: TilePosition,
        to: TilePosition,
    },
}

/// Map-level state an actor's built-ins read or write besides the actor itself.
#[derive(Debug)]
pub struct ActorEnv<'a> {
    pub save_store: &'a mut dyn SaveStore,
    pub strings: &'a StringTable,
    pub character_position: Option<TilePosition>,
}

/// [`ScriptHost`] for one actor for the duration of one engine call.
pub(crate) struct ActorHost<'a, 'e> {
    pub(crate) label: &'a str,
    pub(crate) position: &'a mut TilePosition,
    pub(crate) orientation: &'a mut Orientation,
    pub(crate) parameters: &'a mut BTreeMap<String, Value>,
    pub(crate) commands: &'a mut Vec<ActorCommand>,
    pub(crate) env: &'a mut ActorEnv<'e>,
}

impl ActorHost<'_, '_> {
    fn set_orientation(&mut self, orientation: Orientation) {
        *self.orientation = orientation;
        self.commands
            .push(ActorCommand::SetOrientation { orientation });
    }

    fn walk(&mut self, orientation: Orientation) {
        let from = *self.position;
        let (dx, dy) = orientation.delta();
        let to = (from.0 + dx, from.1 + dy);
        *self.orientation = orientation;
        *self.position = to;
        self.commands.push(ActorCommand::Walk {
            orientation,
            from,
            to,
        });
    }

    fn turn_to_face_character(&mut self) {
        let Some(character) = self.env.character_position else {
            return;
        };
        let orientation = facing_towards(*self.position, character);
        self.set_orientation(orientation);
    }
}

impl ScriptHost for ActorHost<'_, '_> {
    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<FunctionOutcome, CantalError> {
        match name {
            "wait" => {
                let duration = int_arg(name, args, 0)?;
                let duration_ms = u64::try_from(duration).map_err(|_| {
                    CantalError::invalid_argument(name, format!("negative duration {}", duration))
                })?;
                Ok(FunctionOutcome::Wait { duration_ms })
            }
            "print" => {
                let text: String = args.iter().map(Value::to_text).collect();
                info!("[{}] {}", self.label, text);
                self.commands.push(ActorCommand::Print { text });
                Ok(FunctionOutcome::Continue)
            }
            "triggerStateChange" => Ok(FunctionOutcome::Reselect),
            "lockInputs" => {
                self.commands.push(ActorCommand::LockInputs);
                Ok(FunctionOutcome::Continue)
            }
            "unlockInputs" => {
                self.commands.push(ActorCommand::UnlockInputs);
                Ok(FunctionOutcome::Continue)
            }
            "setOrientation" => {
                let orientation = orientation_arg(name, args, 0)?;
                self.set_orientation(orientation);
                Ok(FunctionOutcome::Continue)
            }
            "turnToFaceCharacter" => {
                self.turn_to_face_character();
                Ok(FunctionOutcome::Continue)
            }
            "walk" => {
                let orientation = orientation_arg(name, args, 0)?;
                self.walk(orientation);
                Ok(FunctionOutcome::Wait {
                    duration_ms: MOVEMENT_DURATION_MS,
                })
            }
            "setParameter" => {
                let key = string_arg(name, args, 0)?.to_string();
                let value = arg(name, args, 1)?.clone();
                self.parameters.insert(key, value);
                Ok(FunctionOutcome::Continue)
            }
            _ => Err(CantalError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }

    fn call_value_function(&mut self, name: &str, args: &[Value]) -> Result<Value, CantalError> {
        match name {
            "getString" => {
                let key = string_arg(name, args, 0)?;
                let text = self.env.strings.format(key, &args[1..])?;
                Ok(Value::String(text))
            }
            "toString" => {
                let value = arg(name, args, 0)?;
                if value.is_absent() {
                    warn!("[{}] toString of an absent value", self.label);
                }
                Ok(Value::String(value.to_text()))
            }
            "inParameters" => {
                let key = string_arg(name, args, 0)?;
                Ok(Value::Bool(self.parameters.contains_key(key)))
            }
            _ => Err(CantalError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }

    fn resolve_value(&self, slot: &StorageSlot) -> Value {
        match slot {
            StorageSlot::Parameter(key) => self.parameters.get(key).cloned().unwrap_or_default(),
            StorageSlot::Saved(key) => self.env.save_store.get(key).unwrap_or_default(),
        }
    }

    fn write_register(&mut self, slot: &StorageSlot, value: Value) -> Result<(), CantalError> {
        match slot {
            StorageSlot::Parameter(key) => {
                self.parameters.insert(key.clone(), value);
                Ok(())
            }
            StorageSlot::Saved(key) => self.env.save_store.set(key, value),
        }
    }
}

/// Orientation that points from `from` towards `target`, split into four
/// 90 degree sectors centred on the axes.
pub fn facing_towards(from: TilePosition, target: TilePosition) -> Orientation {
    let dx = (target.0 - from.0) as f64;
    let dy = (target.1 - from.1) as f64;
    let degrees = dy.atan2(dx).to_degrees();
    if (-45.0..45.0).contains(&degrees) {
        Orientation::Right
    } else if (45.0..135.0).contains(&degrees) {
        Orientation::Down
    } else if (-135.0..-45.0).contains(&degrees) {
        Orientation::Up
    } else {
        Orientation::Left
    }
}

fn arg<'v>(function: &str, args: &'v [Value], index: usize) -> Result<&'v Value, CantalError> {
    args.get(index).ok_or_else(|| {
        CantalError::invalid_argument(function, format!("missing argument {}", index + 1))
    })
}

fn int_arg(function: &str, args: &[Value], index: usize) -> Result<i64, CantalError> {
    let value = arg(function, args, index)?;
    value
        .as_int()
        .ok_or_else(|| expected(function, index, "an int", value))
}

fn string_arg<'v>(function: &str, args: &'v [Value], index: usize) -> Result<&'v str, CantalError> {
    let value = arg(function, args, index)?;
    value
        .as_string()
        .ok_or_else(|| expected(function, index, "a string", value))
}

/// Accepts an orientation literal or its upper-case name as a string.
fn orientation_arg(function: &str, args: &[Value], index: usize) -> Result<Orientation, CantalError> {
    let value = arg(function, args, index)?;
    value
        .as_orientation()
        .or_else(|| value.as_string().and_then(|raw| raw.parse().ok()))
        .ok_or_else(|| expected(function, index, "an orientation", value))
}

fn expected(function: &str, index: usize, kind: &str, value: &Value) -> CantalError {
    CantalError::invalid_argument(
        function,
        format!(
            "argument {} must be {}, got {}",
            index + 1,
            kind,
            value.type_name()
        ),
    )
}
