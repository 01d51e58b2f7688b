//! The Tome GraphQL server.

use clap::{CommandFactory, FromArgMatches};

use crate::{
    args::{Args, Command},
    config::Config,
    prelude::*,
};

mod api;
mod args;
mod cmd;
mod config;
mod db;
mod http;
mod logger;
mod model;
mod prelude;
mod remote;
mod store;
mod util;
mod version;


#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        report_fatal(&e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Panics are unexpected, so a backtrace is almost always wanted.
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        std::env::set_var("RUST_BACKTRACE", "1");
    }

    // The version string is only known at runtime.
    let matches = Args::command().version(version::full()).get_matches();
    let args = Args::from_arg_matches(&matches)?;
    bunt::set_stdout_color_choice(args.stdout_color());
    bunt::set_stderr_color_choice(args.stderr_color());

    match &args.cmd {
        Command::Serve { shared } => {
            let config = load_config_and_init_logger(shared, &args, "serve")?;
            cmd::serve::run(config).await
        }
        Command::Db { cmd, shared } => {
            let config = load_config_and_init_logger(shared, &args, "db")?;
            db::cmd::run(cmd, &config).await
        }
        Command::Check { shared } => cmd::check::run(shared, &args).await,
        Command::WriteConfig { target } => config::write_template(target.as_ref()),
        Command::ExportApiSchema { args } => cmd::export_api_schema::run(args),
    }
}

/// Logs the error (the log might go to a file) and prints it with its causes
/// to stderr.
fn report_fatal(e: &anyhow::Error) {
    error!("Fatal: {e:?}");

    eprintln!();
    bunt::eprintln!("{$red+bold}Tome failed:{/$} {[yellow+intense]}", e);
    for (depth, cause) in e.chain().skip(1).enumerate() {
        eprintln!("{:indent$}  because: {cause}", "", indent = depth * 2);
    }
}

/// The logger config is part of the config file, so both happen together.
fn load_config_and_init_logger(
    shared: &args::Shared,
    args: &Args,
    cmd: &str,
) -> Result<Config> {
    let (config, path) = Config::load(shared.config.as_deref())?;
    logger::init(&config.log, args, cmd)?;
    info!("Loaded config from '{}'", path.display());
    Ok(config)
}
