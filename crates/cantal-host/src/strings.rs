use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use cantal_core::{CantalError, Value};
use log::debug;
use regex::{Captures, Regex};
use walkdir::WalkDir;

/// Localized text templates, keyed by `<relative.path>.<key>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    entries: BTreeMap<String, String>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.json` file under `root`. A file `npc/guard.json` holding
    /// `{"hello": "..."}` contributes the key `npc.guard.hello`.
    pub fn load_dir(root: &Path) -> Result<Self, CantalError> {
        let mut table = Self::new();
        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some("json")
            {
                continue;
            }

            let prefix = path
                .strip_prefix(root)
                .map_err(|error| strings_error(path, error))?
                .with_extension("")
                .to_string_lossy()
                .replace(['/', '\\'], ".");
            let raw = fs::read_to_string(path).map_err(|error| strings_error(path, error))?;
            let strings: BTreeMap<String, String> =
                serde_json::from_str(&raw).map_err(|error| strings_error(path, error))?;
            for (key, template) in strings {
                table.insert(format!("{}.{}", prefix, key), template);
            }
        }
        debug!("loaded {} strings from {}", table.len(), root.display());
        Ok(table)
    }

    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.entries.insert(key.into(), template.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Substitutes `{0}`, `{1}`, ... in the template for `key` with the
    /// text of the matching argument.
    pub fn format(&self, key: &str, args: &[Value]) -> Result<String, CantalError> {
        let template = self.get(key).ok_or_else(|| CantalError::StringNotFound {
            key: key.to_string(),
        })?;

        if let Some(index) = placeholder_regex()
            .captures_iter(template)
            .filter_map(|caps| caps[1].parse::<usize>().ok())
            .find(|index| *index >= args.len())
        {
            return Err(CantalError::invalid_argument(
                "getString",
                format!(
                    "string \"{}\" uses placeholder {{{}}} but only {} argument(s) were given",
                    key,
                    index,
                    args.len()
                ),
            ));
        }

        let formatted = placeholder_regex().replace_all(template, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| args.get(index))
                .map(Value::to_text)
                .unwrap_or_default()
        });
        Ok(formatted.into_owned())
    }
}

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\{(\d+)\}").expect("placeholder regex must compile"))
}

fn strings_error(path: &Path, error: impl std::fmt::Display) -> CantalError {
    CantalError::ScriptRead {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod strings_tests {
    use super::*;

    #[test]
    fn format_substitutes_positional_placeholders() {
        let mut table = StringTable::new();
        table.insert("npc.guard.greet", "Halt, {0}! You owe {1} coins.");
        let text = table
            .format("npc.guard.greet", &[Value::from("Ana"), Value::Int(12)])
            .expect("format should succeed");
        assert_eq!(text, "Halt, Ana! You owe 12 coins.");
    }

    #[test]
    fn placeholders_may_repeat_and_appear_out_of_order() {
        let mut table = StringTable::new();
        table.insert("k", "{1}-{0}-{1}");
        let text = table
            .format("k", &[Value::Int(1), Value::Bool(true)])
            .expect("format should succeed");
        assert_eq!(text, "true-1-true");
    }

    #[test]
    fn unknown_key_and_missing_argument_are_errors() {
        let mut table = StringTable::new();
        table.insert("k", "needs {0}");
        let missing = table.format("nope", &[]).expect_err("unknown key");
        assert_eq!(missing.code(), "STRING_NOT_FOUND");
        let short = table.format("k", &[]).expect_err("missing argument");
        assert_eq!(short.code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn load_dir_prefixes_keys_with_the_relative_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("npc");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("guard.json"), r#"{"hello": "Hi {0}"}"#).expect("write");
        fs::write(dir.path().join("menu.json"), r#"{"quit": "Quit"}"#).expect("write");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let table = StringTable::load_dir(dir.path()).expect("load should succeed");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("npc.guard.hello"), Some("Hi {0}"));
        assert_eq!(table.get("menu.quit"), Some("Quit"));
    }
}
