use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cantal_core::{CantalError, Script};
use cantal_parser::parse_script;
use log::debug;

pub const SCRIPT_EXTENSION: &str = "cantalscript";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptKey {
    pub map_name: String,
    pub script_name: String,
}

impl ScriptKey {
    pub fn new(map_name: impl Into<String>, script_name: impl Into<String>) -> Self {
        Self {
            map_name: map_name.into(),
            script_name: script_name.into(),
        }
    }
}

impl fmt::Display for ScriptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.map_name, self.script_name, SCRIPT_EXTENSION
        )
    }
}

/// Parsed scripts of one map session. Each `(map, script)` pair is read and
/// parsed at most once until [`ScriptCache::clear`].
#[derive(Debug)]
pub struct ScriptCache {
    root: PathBuf,
    scripts: BTreeMap<ScriptKey, Arc<Script>>,
    sources: BTreeMap<ScriptKey, String>,
}

impl ScriptCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scripts: BTreeMap::new(),
            sources: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{map}/{script}.cantalscript`
    pub fn script_path(&self, key: &ScriptKey) -> PathBuf {
        self.root
            .join(&key.map_name)
            .join(format!("{}.{}", key.script_name, SCRIPT_EXTENSION))
    }

    /// Registers source text for a script so it is parsed from memory instead
    /// of the scripts root. Replaces any cached parse of the same key.
    pub fn insert_source(
        &mut self,
        map_name: impl Into<String>,
        script_name: impl Into<String>,
        source: impl Into<String>,
    ) {
        let key = ScriptKey::new(map_name, script_name);
        self.scripts.remove(&key);
        self.sources.insert(key, source.into());
    }

    pub fn load(&mut self, map_name: &str, script_name: &str) -> Result<Arc<Script>, CantalError> {
        let key = ScriptKey::new(map_name, script_name);
        if let Some(script) = self.scripts.get(&key) {
            return Ok(Arc::clone(script));
        }

        let script = match self.sources.get(&key) {
            Some(source) => parse_script(source).map_err(|error| error.in_file(key.to_string()))?,
            None => {
                let path = self.script_path(&key);
                let source = fs::read_to_string(&path).map_err(|error| CantalError::ScriptRead {
                    path: path.display().to_string(),
                    message: error.to_string(),
                })?;
                parse_script(&source).map_err(|error| error.in_file(path.display().to_string()))?
            }
        };

        debug!("cached script {}", key);
        let script = Arc::new(script);
        self.scripts.insert(key, Arc::clone(&script));
        Ok(script)
    }

    pub fn contains(&self, map_name: &str, script_name: &str) -> bool {
        self.scripts
            .contains_key(&ScriptKey::new(map_name, script_name))
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Drops every parsed script and registered source.
    pub fn clear(&mut self) {
        self.scripts.clear();
        self.sources.clear();
    }
}
