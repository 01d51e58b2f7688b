//! CLI command `check`: verifies config, database and remote API without
//! serving anything, e.g. before deploying a new version.

use crate::{
    args::{Args, Shared},
    load_config_and_init_logger,
    config::Config,
    prelude::*,
    db,
    remote::{SpellClient, SpellSourceKind},
    store::BackendKind,
};


pub(crate) async fn run(shared: &Shared, args: &Args) -> Result<()> {
    let config = load_config_and_init_logger(shared, args, "check")
        .context("cannot run checks without a valid config")?;

    info!("Running checks");
    let outcomes = [
        ("Configuration", Ok(())),
        ("Referenced files and directories", check_referenced_files(&config).await),
        ("Database", check_db(&config).await),
        ("Remote spell API", check_remote(&config).await),
    ];
    info!("All checks done");

    // Printed after the log output so it does not get lost.
    println!();
    let mut failures = 0;
    for (label, outcome) in &outcomes {
        match outcome {
            Ok(()) => bunt::println!("  {$green+bold}ok{/$}    {[bold]}", label),
            Err(e) => {
                failures += 1;
                bunt::println!("  {$red+bold}FAIL{/$}  {[bold]}", label);
                for cause in e.chain() {
                    bunt::println!("          {$dimmed}-{/$} {}", cause);
                }
            }
        }
    }
    println!();

    if failures > 0 {
        bail!("{failures} of {} checks failed", outcomes.len());
    }
    bunt::println!("{$green+intense}All checks passed.{/$}");
    Ok(())
}

/// Checks that the parent directories of the log file and unix socket exist.
async fn check_referenced_files(config: &Config) -> Result<()> {
    let paths = [config.log.file.as_ref(), config.http.unix_socket.as_ref()];
    for path in paths.into_iter().flatten() {
        let parent = path.parent()
            .ok_or_else(|| anyhow!("'{}' has no parent directory", path.display()))?;
        debug!("Checking that '{}' is a directory...", parent.display());
        let metadata = tokio::fs::metadata(parent)
            .await
            .with_context(|| format!("could not access '{}'", parent.display()))?;
        if !metadata.is_dir() {
            bail!("'{}' is not a directory", parent.display());
        }
    }

    Ok(())
}

async fn check_db(config: &Config) -> Result<()> {
    if config.storage.backend == BackendKind::Memory {
        info!("Skipping DB check as storage backend is 'memory'");
        return Ok(());
    }

    db::create_pool(&config.db).await?;
    Ok(())
}

async fn check_remote(config: &Config) -> Result<()> {
    if config.spells.source != SpellSourceKind::Remote {
        info!("Skipping remote spell API check as spells are loaded from the store");
        return Ok(());
    }

    let client = SpellClient::new(&config.spells)?;
    client.test_connection().await
}
