//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Content development server
#[derive(Parser, Debug)]
#[command(
    name = "tina-dev",
    version = env!("CARGO_PKG_VERSION"),
    about = "Content development server",
    long_about = "Build the content schema, serve it, and rebuild on every change.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Project root containing the tina/ folder
    #[arg(long, global = true, value_name = "PATH")]
    pub root_path: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the dev server and watch for changes
    #[command(
        visible_alias = "server:start",
        about = "Build the schema, start the dev server and watch for changes"
    )]
    Dev(DevArgs),

    /// Run one pipeline generation and exit
    #[command(about = "Build schema, artifacts and client once, then exit")]
    Build {
        /// Skip generating the TypeScript client
        #[arg(long)]
        no_client_build: bool,
    },

    /// Print resolved settings
    #[command(about = "Display the resolved settings from tina/config.toml")]
    Config,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct DevArgs {
    /// Port for the dev server (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Shell command to run once the server is listening
    #[arg(short, long, value_name = "CMD")]
    pub command: Option<String>,

    /// Do not watch configuration or content for changes
    #[arg(long)]
    pub no_watch: bool,

    /// Skip generating the TypeScript client
    #[arg(long)]
    pub no_client_build: bool,

    /// Accepted for compatibility; no telemetry is collected
    #[arg(long)]
    pub no_telemetry: bool,
}
