//! Notepaper CLI - Command-line interface for Notepaper notes
//!
//! Lists, creates, edits, stars, and deletes notes in the signed-in account.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::new::run_new;
use crate::commands::show::run_show;
use crate::commands::star::run_star;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        if error.is_retryable() {
            eprintln!("The backend may be temporarily unavailable; try again shortly.");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "notepaper_cli=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::List {
            starred,
            search,
            pages,
            json,
        } => run_list(profile, starred, search, pages, json).await?,
        Commands::New { title, content } => run_new(profile, title, &content).await?,
        Commands::Show { id, json } => run_show(profile, &id, json).await?,
        Commands::Edit { id, title, content } => run_edit(profile, &id, title, content).await?,
        Commands::Star { id } => run_star(profile, &id).await?,
        Commands::Delete { id, yes } => run_delete(profile, &id, yes).await?,
        Commands::Config { command } => run_config(command, profile)?,
        Commands::Auth { command } => run_auth(command, profile).await?,
    }

    Ok(())
}
