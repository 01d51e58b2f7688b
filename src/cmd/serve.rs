//! CLI command `serve`: opens the store and answers GraphQL requests until
//! stopped.

use crate::{
    api,
    config::Config,
    db,
    http,
    prelude::*,
    remote::SpellSource,
    store::{BackendKind, Store},
    version,
};


pub(crate) async fn run(config: Config) -> Result<()> {
    info!("Starting Tome {}", version::identifier());
    trace!("Configuration: {config:#?}");
    for warning in config.warnings() {
        warn!("Config: {warning}");
    }

    let store = open_store(&config).await?;
    let spells = SpellSource::from_config(&config.spells)
        .context("failed to set up spell source")?;

    let context = api::Context { store, spells };
    http::serve(&config.http, config.log.log_http_headers, api::root_node(), context).await
        .context("HTTP server failed")
}

async fn open_store(config: &Config) -> Result<Store> {
    match config.storage.backend {
        BackendKind::Postgres => {
            let pool = db::create_pool(&config.db).await
                .context("failed to connect to PostgreSQL")?;
            db::migrate(&mut *pool.get().await?).await
                .context("failed to migrate database")?;
            Ok(Store::postgres(pool))
        }
        BackendKind::Memory => {
            info!("Keeping all documents in memory");
            Ok(Store::in_memory())
        }
    }
}
