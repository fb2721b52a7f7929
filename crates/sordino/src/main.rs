use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;
mod config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Shape(args) => args.run(),
        Command::Filter(args) => args.run(),
    }
}

#[derive(Parser)]
#[command(name = "sordino", about = "Input-shaping tooling for sordino")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Shape a job's move queue into quadratic position segments.
    Shape(cli::shape::ShapeArgs),
    /// Print the derived impulse train for a shaper configuration.
    Filter(cli::filter::FilterArgs),
}
