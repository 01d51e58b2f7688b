use std::{collections::HashMap, fs::OpenOptions, io::Write as _, path::Path, sync::Mutex};

use serde::Deserialize;
use termcolor::ColorChoice;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{self, format::Writer, time::FormatTime},
    prelude::*,
};

use crate::{prelude::*, args::Args};


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Minimum log level per module path prefix.
    ///
    /// For each message, the entry with the longest prefix of the message's
    /// module path decides. Messages matched by no entry are dropped.
    ///
    /// Example: info and up for Tome, everything from the store, no request
    /// logs, and debug messages of the HTTP client `reqwest`.
    ///
    ///    [log]
    ///    filters.tome = "info"
    ///    filters."tome::store" = "trace"
    ///    filters."tome::http::log::req" = "off"
    ///    filters.reqwest = "debug"
    #[config(default = { "tome": "debug" })]
    pub(crate) filters: Filters,

    /// Additional log file. `${cmd}` is replaced by the subcommand, e.g.
    /// "/var/log/tome-${cmd}.log" turns into "/var/log/tome-serve.log".
    pub(crate) file: Option<std::path::PathBuf>,

    /// Whether to log to stdout.
    #[config(default = true)]
    pub(crate) stdout: bool,

    /// Log the headers of every incoming HTTP request (at trace level).
    #[config(default = false)]
    pub(crate) log_http_headers: bool,
}

/// The `filters` map, parsed into a `Targets` filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(Targets);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;

    fn try_from(map: HashMap<String, String>) -> Result<Self, Self::Error> {
        let mut targets = Targets::new();
        for (prefix, level) in map {
            let level = level.parse::<LevelFilter>()
                .map_err(|_| format!("invalid log level '{level}' for '{prefix}'"))?;
            targets = targets.with_target(prefix, level);
        }
        Ok(Self(targets))
    }
}

/// Installs the global subscriber. Must only be called once.
pub(crate) fn init(config: &LogConfig, args: &Args, cmd: &str) -> Result<()> {
    let stdout = config.stdout.then(|| {
        fmt::layer()
            .with_timer(LocalTime)
            .with_ansi(args.stdout_color() != ColorChoice::Never)
            .with_writer(std::io::stdout)
    });

    let file = match &config.file {
        Some(path) => Some(
            fmt::layer()
                .with_timer(LocalTime)
                .with_ansi(args.color == ColorChoice::Always)
                .with_writer(Mutex::new(open_log_file(path, cmd)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(config.filters.0.clone())
        .with(stdout)
        .with(file)
        .try_init()
        .context("failed to install logger")?;

    Ok(())
}

fn open_log_file(template: &Path, cmd: &str) -> Result<std::fs::File> {
    let path = template.to_str()
        .ok_or_else(|| anyhow!("log file path '{}' is not valid UTF-8", template.display()))?
        .replace("${cmd}", cmd);

    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .with_context(|| format!("failed to open log file '{path}'"))?;

    // Blank line between runs of the process.
    file.write_all(b"\n").with_context(|| format!("failed to write to log file '{path}'"))?;
    Ok(file)
}

/// Local time with milliseconds.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}
