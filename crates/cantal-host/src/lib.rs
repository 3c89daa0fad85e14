mod actor;
mod cache;
mod host;
mod save_store;
mod session;
mod strings;

pub use actor::{Actor, ActorSpec};
pub use cache::{ScriptCache, ScriptKey, SCRIPT_EXTENSION};
pub use host::{
    facing_towards, ActorCommand, ActorEnv, TilePosition, BUILTIN_FUNCTIONS,
    BUILTIN_VALUE_FUNCTIONS, MOVEMENT_DURATION_MS,
};
pub use save_store::{JsonFileSaveStore, MemorySaveStore, SaveStore};
pub use session::{ActorId, MapSession, MapSessionOptions};
pub use strings::StringTable;

/// True when `name` is a function scripts may call through the actor host.
pub fn is_builtin_function(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&name) || BUILTIN_VALUE_FUNCTIONS.contains(&name)
}
