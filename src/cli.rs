use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{config::Config, messages::ClientMessage};

/// The command line interface for the sensor bridge.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    pub config: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),
}

/// Helpful examples for users.
#[derive(Subcommand, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,

    /// Show an example JSON status message as sent to clients.
    Status,

    /// Show an example JSON data message as sent to clients.
    Data,
}

/// Print whatever the given command asks for.
pub fn handle_command(command: Commands) {
    let Commands::Examples(example) = command;

    match example {
        Examples::Config => println!("{}", Config::example().serialize_pretty()),
        Examples::Status => println!("{}", ClientMessage::status(true).serialize()),
        Examples::Data => println!("{}", ClientMessage::example_data().serialize()),
    }
}
