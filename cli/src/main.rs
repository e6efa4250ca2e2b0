mod args;
mod commands;
mod events;
mod run;

use std::process::ExitCode;

use backitup::config::{default_settings_path, Settings};
use backitup::schema::{Schema, SchemaStore};
use backitup::{logging, BackitupError};
use clap::Parser;
use log::info;

use args::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<bool, BackitupError> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_or_default(default_settings_path())?,
    };

    let filter = if cli.verbose {
        "debug"
    } else {
        settings.log_filter.as_str()
    };
    logging::init(filter)?;
    info!("Starting BackItUp v{}", env!("CARGO_PKG_VERSION"));

    let store = SchemaStore::open(&settings.config_dir)?;
    let json = cli.json;

    match cli.command {
        Commands::List => commands::list(&store, json),
        Commands::Show { name } => commands::show(&store, &name, json),
        Commands::Save {
            name,
            sources,
            destination,
            force,
        } => commands::save(&store, Schema::new(name, sources, destination), force, json),
        Commands::Delete { name } => commands::delete(&store, &name, json),
        Commands::Validate { name } => commands::validate(&store, &name, json),
        Commands::Run { names } => run::run(&settings, &names, json),
    }
}
