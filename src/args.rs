//! This module defines the command line arguments Tome accepts.

use std::{io::IsTerminal, path::PathBuf};
use termcolor::ColorChoice;

use crate::{cmd, db::cmd::DbCommand};


#[derive(Debug, clap::Parser)]
#[command(about = "GraphQL API for spells, books and their authors.")]
pub(crate) struct Args {
    #[command(subcommand)]
    pub(crate) cmd: Command,

    /// Whether to use colors and other ANSI codes in the output. Possible
    /// values: 'auto', 'always', 'never'.
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_parser = parse_color_choice,
    )]
    pub(crate) color: ColorChoice,
}

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Starts the HTTP server serving the GraphQL API.
    Serve {
        #[command(flatten)]
        shared: Shared,
    },

    /// Database operations.
    Db {
        #[command(subcommand)]
        cmd: DbCommand,

        #[command(flatten)]
        shared: Shared,
    },

    /// Checks config, DB connection and the remote spell API to find
    /// problems in Tome's environment.
    ///
    /// Exits with 0 if everything is Ok, and with 1 otherwise.
    Check {
        #[command(flatten)]
        shared: Shared,
    },

    /// Outputs a template for the configuration file (which includes
    /// descriptions or all options).
    WriteConfig {
        /// Target file. If not specified, the template is written to stdout.
        target: Option<PathBuf>,
    },

    /// Exports the API as GraphQL schema.
    ExportApiSchema {
        #[command(flatten)]
        args: cmd::export_api_schema::Args,
    },
}

#[derive(Debug, clap::Args)]
pub(crate) struct Shared {
    /// Path to the configuration file. If this is not specified, Tome will
    /// check `TOME_CONFIG_PATH` and then try opening `config.toml` or
    /// `/etc/tome/config.toml`.
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,
}

impl Args {
    pub(crate) fn stdout_color(&self) -> ColorChoice {
        Self::color_for(self.color, std::io::stdout().is_terminal())
    }

    pub(crate) fn stderr_color(&self) -> ColorChoice {
        Self::color_for(self.color, std::io::stderr().is_terminal())
    }

    fn color_for(choice: ColorChoice, is_terminal: bool) -> ColorChoice {
        match choice {
            ColorChoice::Auto if !is_terminal => ColorChoice::Never,
            other => other,
        }
    }
}

fn parse_color_choice(s: &str) -> Result<ColorChoice, String> {
    match s {
        "auto" => Ok(ColorChoice::Auto),
        "always" => Ok(ColorChoice::Always),
        "never" => Ok(ColorChoice::Never),
        other => Err(format!("invalid color choice '{other}' (valid: auto, always, never)")),
    }
}
