use std::fmt;
use std::path::PathBuf;

use cantal_core::CantalError;
use cantal_runtime::MachineOptions;
use log::{debug, warn};

use crate::actor::{Actor, ActorSpec};
use crate::cache::ScriptCache;
use crate::host::{ActorCommand, ActorEnv, TilePosition};
use crate::save_store::{MemorySaveStore, SaveStore};
use crate::strings::StringTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub usize);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub struct MapSessionOptions {
    pub map_name: String,
    pub scripts_root: PathBuf,
    pub strings: StringTable,
    pub save_store: Box<dyn SaveStore>,
    pub machine: MachineOptions,
}

impl MapSessionOptions {
    /// In-memory save store, no strings, default machine options.
    pub fn new(map_name: impl Into<String>, scripts_root: impl Into<PathBuf>) -> Self {
        Self {
            map_name: map_name.into(),
            scripts_root: scripts_root.into(),
            strings: StringTable::new(),
            save_store: Box::new(MemorySaveStore::new()),
            machine: MachineOptions::default(),
        }
    }
}

/// Everything one loaded map owns: its script cache, the save store, the
/// string table and the actors placed on it.
pub struct MapSession {
    map_name: String,
    cache: ScriptCache,
    save_store: Box<dyn SaveStore>,
    strings: StringTable,
    machine_options: MachineOptions,
    actors: Vec<Actor>,
    character_position: Option<TilePosition>,
}

impl MapSession {
    pub fn new(options: MapSessionOptions) -> Self {
        Self {
            map_name: options.map_name,
            cache: ScriptCache::new(options.scripts_root),
            save_store: options.save_store,
            strings: options.strings,
            machine_options: options.machine,
            actors: Vec::new(),
            character_position: None,
        }
    }

    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    pub fn cache(&self) -> &ScriptCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ScriptCache {
        &mut self.cache
    }

    pub fn save_store(&self) -> &dyn SaveStore {
        self.save_store.as_ref()
    }

    pub fn set_character_position(&mut self, position: Option<TilePosition>) {
        self.character_position = position;
    }

    /// Loads the actor's script (through the cache) and places it, unspawned.
    pub fn add_actor(&mut self, spec: ActorSpec) -> Result<ActorId, CantalError> {
        let mut actor = Actor::new(spec);
        actor.load(&self.map_name, &mut self.cache, self.machine_options)?;
        self.actors.push(actor);
        Ok(ActorId(self.actors.len() - 1))
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(id.0)
    }

    pub fn actors(&self) -> impl Iterator<Item = (ActorId, &Actor)> {
        self.actors
            .iter()
            .enumerate()
            .map(|(index, actor)| (ActorId(index), actor))
    }

    pub fn find_actor(&self, name: &str) -> Option<ActorId> {
        self.actors
            .iter()
            .position(|actor| actor.name() == Some(name))
            .map(ActorId)
    }

    /// Spawns every actor. An actor whose activation fails does not keep the
    /// others from spawning; the first error is returned afterwards.
    pub fn spawn_all(&mut self) -> Result<(), CantalError> {
        self.for_each_actor(|actor, env| actor.spawn(env))
    }

    pub fn despawn_all(&mut self) {
        for actor in &mut self.actors {
            actor.despawn();
        }
    }

    /// One frame: every spawned actor gets exactly one update, even when an
    /// earlier one fails. The first error is returned afterwards.
    pub fn tick(&mut self, dt_ms: u64) -> Result<(), CantalError> {
        self.for_each_actor(|actor, env| actor.update(dt_ms, env))
    }

    pub fn action_pressed(&mut self, id: ActorId) -> Result<(), CantalError> {
        self.with_actor(id, |actor, env| actor.on_action_pressed(env))
    }

    pub fn character_entered_tile(&mut self, id: ActorId) -> Result<(), CantalError> {
        self.with_actor(id, |actor, env| actor.on_character_entered_tile(env))
    }

    pub fn character_touch_event(&mut self, id: ActorId) -> Result<(), CantalError> {
        self.with_actor(id, |actor, env| actor.on_character_touch_event(env))
    }

    /// Commands queued by every actor since the last drain, in actor order.
    pub fn drain_commands(&mut self) -> Vec<(ActorId, ActorCommand)> {
        self.actors
            .iter_mut()
            .enumerate()
            .flat_map(|(index, actor)| {
                actor
                    .drain_commands()
                    .into_iter()
                    .map(move |command| (ActorId(index), command))
            })
            .collect()
    }

    /// Despawns every actor, forgets them and the parsed scripts, and flushes
    /// the save store.
    pub fn unload(&mut self) -> Result<(), CantalError> {
        self.despawn_all();
        self.actors.clear();
        self.cache.clear();
        debug!("unloaded map {}", self.map_name);
        self.save_store.flush()
    }

    fn for_each_actor(
        &mut self,
        mut f: impl FnMut(&mut Actor, &mut ActorEnv<'_>) -> Result<(), CantalError>,
    ) -> Result<(), CantalError> {
        let mut env = ActorEnv {
            save_store: self.save_store.as_mut(),
            strings: &self.strings,
            character_position: self.character_position,
        };
        let mut first_error = None;
        for (index, actor) in self.actors.iter_mut().enumerate() {
            if let Err(error) = f(actor, &mut env) {
                warn!("actor {} ({}) failed: {}", ActorId(index), actor.label(), error);
                first_error = first_error.or(Some(error));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn with_actor(
        &mut self,
        id: ActorId,
        f: impl FnOnce(&mut Actor, &mut ActorEnv<'_>) -> Result<(), CantalError>,
    ) -> Result<(), CantalError> {
        let Some(actor) = self.actors.get_mut(id.0) else {
            return Ok(());
        };
        let mut env = ActorEnv {
            save_store: self.save_store.as_mut(),
            strings: &self.strings,
            character_position: self.character_position,
        };
        f(actor, &mut env)
    }
}

impl fmt::Debug for MapSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapSession")
            .field("map_name", &self.map_name)
            .field("actors", &self.actors.len())
            .field("cached_scripts", &self.cache.len())
            .finish()
    }
}
