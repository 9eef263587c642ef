//! Command-line entry point for `xcc` (spec.md §6.4).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

mod repl;
mod runner;

/// xcc — a JIT compiler and REPL for a small C-like systems language.
#[derive(Parser)]
#[command(name = "xcc", about = "JIT compiler and REPL for xcc", long_about = None)]
struct Cli {
    /// Source file to compile and run. Omit to start the REPL.
    source: Option<PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dump each compiled module's LLVM IR to stderr before it runs.
    #[arg(long = "emit-ir")]
    emit_ir: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.source {
        Some(path) => match runner::run_file(&path, cli.emit_ir) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{} {e}", "error:".red().bold());
                ExitCode::FAILURE
            }
        },
        None => {
            repl::run(cli.emit_ir);
            ExitCode::SUCCESS
        }
    }
}

fn init_logging(verbosity: u8) {
    env_logger::init();
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    log::set_max_level(level);
}
