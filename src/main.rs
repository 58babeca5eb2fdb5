//! Prerender - static HTML generation for server-rendered apps.

#![allow(dead_code)]

mod cli;
mod config;
mod exec;
mod logger;
mod pages;
mod probe;
mod routes;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::PrerenderConfig;

// The whole pipeline is one control-flow thread suspending on process,
// socket and file I/O; worker threads would buy nothing here.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = PrerenderConfig::load(cli)?;

    match &cli.command {
        Commands::Generate { .. } => cli::generate::generate_site(&config).await,
        Commands::Routes { json } => cli::routes::print_routes(&config, *json),
    }
}
