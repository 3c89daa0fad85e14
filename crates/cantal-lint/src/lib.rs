use std::ffi::OsString;

use clap::Parser;
use log::LevelFilter;

mod check;
mod cli_args;
mod error_map;
mod source_loader;

pub(crate) use cli_args::{Cli, Mode};
pub(crate) use error_map::{emit_error, LintError};

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    if cli.verbose {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .try_init();
    }
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, LintError> {
    match cli.command {
        Mode::Check(args) => check::run_check(args),
        Mode::Dump(args) => check::run_dump(args),
    }
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn argument_errors_use_clap_exit_code() {
        assert_eq!(run_cli_from_args(["cantal-lint", "frobnicate"]), 2);
        assert_eq!(run_cli_from_args(["cantal-lint", "check"]), 2);
    }

    #[test]
    fn missing_scripts_dir_is_reported_as_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent");
        let code = run_cli_from_args([
            "cantal-lint",
            "check",
            "--scripts-dir",
            missing.to_str().expect("utf-8"),
        ]);
        assert_eq!(code, 1);
    }
}
