use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use cantal_host::SCRIPT_EXTENSION;
use walkdir::WalkDir;

use crate::error_map::{map_cli_source_path, map_cli_source_read, map_cli_source_scan, LintError};

pub(crate) fn resolve_scripts_dir(scripts_dir: &str) -> Result<PathBuf, LintError> {
    let path = PathBuf::from(scripts_dir);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(map_cli_source_path)?
            .join(path)
    };

    if !absolute.exists() {
        return Err(LintError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("scripts-dir does not exist: {}", absolute.display()),
        ));
    }

    if !absolute.is_dir() {
        return Err(LintError::new(
            "CLI_SOURCE_NOT_DIR",
            format!("scripts-dir is not a directory: {}", absolute.display()),
        ));
    }

    Ok(absolute)
}

/// Every `*.cantalscript` file under `scripts_dir`, keyed by its path
/// relative to that directory with `/` separators.
pub(crate) fn read_scripts_from_dir(
    scripts_dir: &Path,
) -> Result<BTreeMap<String, String>, LintError> {
    let mut scripts = BTreeMap::new();

    for entry in WalkDir::new(scripts_dir).follow_links(false) {
        let entry = entry.map_err(map_cli_source_scan)?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some(SCRIPT_EXTENSION)
        {
            continue;
        }

        let relative = path
            .strip_prefix(scripts_dir)
            .map_err(|error| LintError::new("CLI_SOURCE_SCAN", error.to_string()))?;
        let key = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let source = fs::read_to_string(path).map_err(map_cli_source_read)?;
        scripts.insert(key, source);
    }

    if scripts.is_empty() {
        return Err(LintError::new(
            "CLI_SOURCE_EMPTY",
            format!(
                "no .{} files found under {}",
                SCRIPT_EXTENSION,
                scripts_dir.display()
            ),
        ));
    }

    Ok(scripts)
}

#[cfg(test)]
mod source_loader_tests {
    use super::*;

    #[test]
    fn resolve_rejects_missing_and_non_directory_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let error = resolve_scripts_dir(missing.to_str().expect("utf-8")).expect_err("missing");
        assert_eq!(error.code, "CLI_SOURCE_NOT_FOUND");

        let file = dir.path().join("file.txt");
        fs::write(&file, "x").expect("write");
        let error = resolve_scripts_dir(file.to_str().expect("utf-8")).expect_err("file");
        assert_eq!(error.code, "CLI_SOURCE_NOT_DIR");

        let resolved = resolve_scripts_dir(dir.path().to_str().expect("utf-8")).expect("dir");
        assert!(resolved.is_absolute());
    }

    #[test]
    fn reads_only_cantalscript_files_recursively() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("town")).expect("mkdir");
        fs::write(dir.path().join("town").join("guard.cantalscript"), "state A(true) { }")
            .expect("write");
        fs::write(dir.path().join("town").join("notes.txt"), "ignored").expect("write");
        fs::write(dir.path().join("chest.cantalscript"), "state B(true) { }").expect("write");

        let scripts = read_scripts_from_dir(dir.path()).expect("scripts");
        assert_eq!(
            scripts.keys().cloned().collect::<Vec<_>>(),
            vec!["chest.cantalscript", "town/guard.cantalscript"]
        );
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = read_scripts_from_dir(dir.path()).expect_err("empty");
        assert_eq!(error.code, "CLI_SOURCE_EMPTY");
    }
}
