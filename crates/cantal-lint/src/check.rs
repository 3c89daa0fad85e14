use std::collections::BTreeMap;
use std::fmt;
use std::fs;

use cantal_core::{CantalError, SourceLocation};
use cantal_host::is_builtin_function;
use cantal_parser::parse_script;
use log::debug;

use crate::cli_args::{CheckArgs, DumpArgs};
use crate::error_map::{map_cli_dump, map_cli_source_read, LintError};
use crate::source_loader::{read_scripts_from_dir, resolve_scripts_dir};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Diagnostic {
    pub(crate) path: String,
    pub(crate) location: SourceLocation,
    pub(crate) severity: Severity,
    pub(crate) code: &'static str,
    pub(crate) message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.severity {
            Severity::Error => "",
            Severity::Warning => "warning ",
        };
        write!(
            f,
            "{}:{}: {}{} {}",
            self.path, self.location, marker, self.code, self.message
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct CheckReport {
    pub(crate) files: usize,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl CheckReport {
    pub(crate) fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == Severity::Error)
            .count()
    }

    pub(crate) fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }
}

/// Parses every source and collects load errors plus calls outside the
/// built-in function surface.
pub(crate) fn check_sources(sources: &BTreeMap<String, String>) -> CheckReport {
    let mut report = CheckReport::default();
    for (path, source) in sources {
        report.files += 1;
        match parse_script(source) {
            Ok(script) => {
                debug!(
                    "{}: {} states, {} blocks",
                    path,
                    script.states.len(),
                    script.blocks.len()
                );
                for (name, location) in script.called_functions() {
                    if is_builtin_function(&name) {
                        continue;
                    }
                    let error = CantalError::UnknownFunction { name };
                    report.diagnostics.push(Diagnostic {
                        path: path.clone(),
                        location,
                        severity: Severity::Warning,
                        code: error.code(),
                        message: error.to_string(),
                    });
                }
            }
            Err(error) => report.diagnostics.push(Diagnostic {
                path: path.clone(),
                location: error.location().unwrap_or_else(SourceLocation::synthetic),
                severity: Severity::Error,
                code: error.code(),
                message: error_detail(&error),
            }),
        }
    }
    report
}

/// The error text without its leading `line:column: `.
fn error_detail(error: &CantalError) -> String {
    if let CantalError::Parse { message, .. } = error {
        return message.clone();
    }
    let text = error.to_string();
    match error.location() {
        Some(location) => text
            .strip_prefix(&format!("{}: ", location))
            .map(str::to_string)
            .unwrap_or(text),
        None => text,
    }
}

pub(crate) fn run_check(args: CheckArgs) -> Result<i32, LintError> {
    let scripts_root = resolve_scripts_dir(&args.scripts_dir)?;
    let sources = read_scripts_from_dir(&scripts_root)?;
    let report = check_sources(&sources);

    for diagnostic in &report.diagnostics {
        println!("{}", diagnostic);
    }
    println!(
        "checked {} file(s): {} error(s), {} warning(s)",
        report.files,
        report.error_count(),
        report.warning_count()
    );
    if report.error_count() > 0 {
        println!("RESULT:ERROR");
        Ok(1)
    } else {
        println!("RESULT:OK");
        Ok(0)
    }
}

pub(crate) fn run_dump(args: DumpArgs) -> Result<i32, LintError> {
    let source = fs::read_to_string(&args.file).map_err(map_cli_source_read)?;
    let script = parse_script(&source)
        .map_err(|error| LintError::new(error.code(), error.in_file(&args.file).to_string()))?;
    let json = serde_json::to_string_pretty(&script).map_err(map_cli_dump)?;
    println!("{}", json);
    Ok(0)
}
