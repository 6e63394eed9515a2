use clap::{Parser, Subcommand};

mod commands;
mod config;

/// spike: live-stream access control server
#[derive(Parser)]
#[command(name = "spike-server", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve(commands::serve::ServeArgs),

    /// Generate a random secret for SPIKE_SECRET
    Secret,

    /// Load and validate the configuration, then exit
    CheckConfig(commands::check_config::CheckConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::run(args),
        Commands::Secret => commands::secret::run(),
        Commands::CheckConfig(args) => commands::check_config::run(args),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", colored::Colorize::red("error:"), e);
        std::process::exit(1);
    }
}
