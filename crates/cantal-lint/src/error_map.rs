use std::fmt::Display;

use thiserror::Error;

/// Failure of the tool itself, as opposed to diagnostics found in scripts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub(crate) struct LintError {
    pub(crate) code: &'static str,
    pub(crate) message: String,
}

impl LintError {
    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

fn map_error(code: &'static str, error: impl Display) -> LintError {
    LintError::new(code, error.to_string())
}

pub(crate) fn emit_error(error: LintError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    match serde_json::to_string(&error.message) {
        Ok(json) => println!("ERROR_MSG_JSON:{}", json),
        Err(_) => println!("ERROR_MSG_JSON:null"),
    }
    1
}

pub(crate) fn map_cli_source_path(error: std::io::Error) -> LintError {
    map_error("CLI_SOURCE_PATH", error)
}

pub(crate) fn map_cli_source_scan(error: walkdir::Error) -> LintError {
    map_error("CLI_SOURCE_SCAN", error)
}

pub(crate) fn map_cli_source_read(error: std::io::Error) -> LintError {
    map_error("CLI_SOURCE_READ", error)
}

pub(crate) fn map_cli_dump(error: serde_json::Error) -> LintError {
    map_error("CLI_DUMP", error)
}
