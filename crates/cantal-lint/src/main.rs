fn main() {
    std::process::exit(cantal_lint::run_cli_from_args(std::env::args_os()));
}
