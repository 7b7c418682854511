use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rc_cli::commands::{detect, export, gallery, goal, log, sessions, status, view};
use rc_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays pipeable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    match command {
        Commands::Detect(args) => detect::run(&mut writer, args, &config)?,
        Commands::Log(args) => log::run(&mut writer, args, &config)?,
        Commands::View(args) => view::run(&mut writer, args, &config)?,
        Commands::Goal(action) => goal::run(&mut writer, action, &config)?,
        Commands::Gallery(args) => gallery::run(&mut writer, args, &config)?,
        Commands::Sessions(args) => sessions::run(&mut writer, args, &config)?,
        Commands::Export => export::run(&mut writer, &config)?,
        Commands::Status => status::run(&mut writer, &config)?,
    }
    writer.flush()?;

    Ok(())
}
