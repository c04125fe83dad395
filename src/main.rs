//! CLI front-end (§12): loads a class by name off a classpath and runs its `main`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use pretty_env_logger::env_logger::Target;

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate log;

mod class;
mod constant_pool;
mod environment;
mod error;
mod frame;
mod heap;
mod instruction;
mod jvm;
mod native;
mod registry;
mod resolve;
mod types;
mod version;

#[cfg(test)]
mod test_support;

/// A minimal JVM bytecode interpreter.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// Binary class name (`.`-or-`/`-separated) to load and run.
    class_name: String,

    /// Classpath root directories, searched in order. Repeatable.
    #[clap(short = 'p', long = "classpath", default_value = ".", multiple_values = true)]
    classpath: Vec<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[clap(short, long, parse(from_occurrences))]
    verbose: u8,
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    pretty_env_logger::formatted_builder()
        .target(Target::Stdout)
        .filter_level(level_for(cli.verbose))
        .init();

    let vm = jvm::Jvm::new(cli.classpath);
    match vm.run_main(&cli.class_name) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
