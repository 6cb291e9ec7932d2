use clap::Parser;
use signal_trader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
