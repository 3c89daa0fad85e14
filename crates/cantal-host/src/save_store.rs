use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::fs;
use std::path::{Path, PathBuf};

use cantal_core::{CantalError, Value};
use log::debug;

/// Key/value save data shared by every actor of a session.
pub trait SaveStore: fmt::Debug {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), CantalError>;

    /// Writes pending changes to the backing medium, if there is one.
    fn flush(&mut self) -> Result<(), CantalError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySaveStore {
    values: BTreeMap<String, Value>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

impl SaveStore for MemorySaveStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), CantalError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Save data kept in memory and written to one JSON document on `flush`.
#[derive(Debug)]
pub struct JsonFileSaveStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
    dirty: bool,
}

impl JsonFileSaveStore {
    /// Opens `path`. A missing file is an empty save.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CantalError> {
        let path = path.into();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|error| save_error(&path, error))?;
            serde_json::from_str(&raw).map_err(|error| save_error(&path, error))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl SaveStore for JsonFileSaveStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), CantalError> {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CantalError> {
        if !self.dirty {
            return Ok(());
        }
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|error| save_error(&self.path, error))?;

        let payload = serde_json::to_string_pretty(&self.values)
            .map_err(|error| save_error(&self.path, error))?;
        fs::write(&self.path, payload).map_err(|error| save_error(&self.path, error))?;
        debug!(
            "flushed {} save entries to {}",
            self.values.len(),
            self.path.display()
        );
        self.dirty = false;
        Ok(())
    }
}

fn save_error(path: &Path, error: impl Display) -> CantalError {
    CantalError::SaveStore {
        message: format!("{}: {}", path.display(), error),
    }
}
