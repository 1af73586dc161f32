mod commands;
mod config;
mod error;
mod logger;
mod manifest;
mod runner;
mod writer;
use crate::commands::Commands;
use crate::error::Error;
use crate::logger::Logger;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use clap::Parser;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Derive a runner from the command and run it
fn run(command: impl Runnable, writer: &Writer) {
    if let Err(error) = command.runner(writer).run() {
        error.exit()
    }
}

fn main() {
    if let Err(report) = color_eyre::install() {
        Error::from(report).exit()
    }

    Logger::init();

    let cli = Cli::parse();
    let writer = Writer::default();

    // Match all commands here, in one place
    match cli.command {
        Commands::Templates(cmd) => run(cmd, &writer),
        Commands::Graph(cmd) => run(cmd, &writer),
        Commands::Synth(cmd) => run(cmd, &writer),
        Commands::Check(cmd) => run(cmd, &writer),
    }
}
