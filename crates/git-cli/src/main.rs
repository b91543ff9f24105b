mod commands;

use std::process;

use clap::Parser;

/// A minimal git client: clones a remote repository over smart-HTTP.
#[derive(Parser)]
#[command(name = "gitr", about = "A minimal git client")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Clone a repository into a new directory.
    Clone(commands::clone::CloneArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Clone(args) => commands::clone::run(args),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("fatal: {e}");
            process::exit(128);
        }
    }
}
