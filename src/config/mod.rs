use std::path::{Path, PathBuf};

use confique::Config as _;

use crate::{prelude::*, remote::SpellSourceKind, store::BackendKind};


/// Checked in this order if neither `--config` nor `TOME_CONFIG_PATH` is given.
const DEFAULT_PATHS: &[&str] = &["config.toml", "/etc/tome/config.toml"];

const PATH_ENV: &str = "TOME_CONFIG_PATH";

/// Configuration for Tome.
///
/// Relative paths in here are relative to this file.
#[derive(Debug, confique::Config)]
pub(crate) struct Config {
    #[config(nested)]
    pub(crate) http: crate::http::HttpConfig,

    #[config(nested)]
    pub(crate) db: crate::db::DbConfig,

    #[config(nested)]
    pub(crate) storage: crate::store::StorageConfig,

    /// Where spells are loaded from. Books and authors are always taken from
    /// the store.
    #[config(nested)]
    pub(crate) spells: crate::remote::SpellsConfig,

    #[config(nested)]
    pub(crate) log: crate::logger::LogConfig,
}

impl Config {
    /// Loads the config from `explicit`, or else from the file found by
    /// [`locate`]. Returns the config and the file it was read from.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf)> {
        let path = match explicit {
            Some(path) => path.to_owned(),
            None => locate(std::env::var_os(PATH_ENV).map(PathBuf::from))?,
        };

        let config = Self::load_from(&path)
            .with_context(|| format!("failed to load config from '{}'", path.display()))?;
        Ok((config, path))
    }

    /// Reads and validates a single TOML file.
    pub(crate) fn load_from(path: &Path) -> Result<Self> {
        let mut config = Config::from_file(path)?;
        let dir = path.canonicalize()
            .with_context(|| format!("failed to canonicalize '{}'", path.display()))?
            .parent()
            .map(Path::to_owned)
            .ok_or_else(|| anyhow!("config file '{}' has no parent directory", path.display()))?;

        for p in [&mut config.http.unix_socket, &mut config.log.file].into_iter().flatten() {
            if p.is_relative() {
                *p = dir.join(&p);
            }
        }

        Ok(config)
    }

    /// Settings that work but are probably not what the user wants.
    pub(crate) fn warnings(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.storage.backend == BackendKind::Memory {
            out.push("storage backend is 'memory': all data is lost when Tome stops");
        }
        if self.spells.source == SpellSourceKind::Remote && self.spells.concurrent_requests == 0 {
            out.push("'spells.concurrent_requests' is 0, which is treated as 1");
        }
        out
    }
}

/// Picks the config file: the env variable wins, otherwise the first
/// existing default path.
fn locate(from_env: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = from_env {
        return Ok(path);
    }

    DEFAULT_PATHS.iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!(
            "no config file found (set {PATH_ENV} or pass --config; tried {})",
            DEFAULT_PATHS.join(", "),
        ))
}

/// Writes a config template with all options and their docs, to `target`
/// or stdout.
pub(crate) fn write_template(target: Option<&PathBuf>) -> Result<()> {
    let mut options = confique::toml::FormatOptions::default();
    options.general.nested_field_gap = 2;
    let template = confique::toml::template::<Config>(options);

    match target {
        Some(path) => {
            std::fs::write(path, template)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            info!("Wrote config template to '{}'", path.display());
        }
        None => print!("{template}"),
    }

    Ok(())
}
