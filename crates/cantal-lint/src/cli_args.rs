use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cantal-lint")]
#[command(about = "Checks and inspects CantalScript actor scripts")]
pub(crate) struct Cli {
    /// Log engine diagnostics to stderr.
    #[arg(long, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Parse every `.cantalscript` file under a directory.
    Check(CheckArgs),
    /// Print one parsed script as JSON.
    Dump(DumpArgs),
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    #[arg(long = "scripts-dir")]
    pub(crate) scripts_dir: String,
}

#[derive(Debug, Args)]
pub(crate) struct DumpArgs {
    #[arg(long = "file")]
    pub(crate) file: String,
}
