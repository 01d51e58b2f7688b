use std::{
    path::Path,
    sync::atomic::{AtomicU32, Ordering},
};

use deadpool_postgres::Pool;
use tokio_postgres::{Client, NoTls};

use crate::{
    config::Config,
    db::{DbConfig, create_pool, migrate},
    model::Key,
    prelude::*,
    store::Store,
};


/// Path to a Tome config file whose `[db]` section points to a PostgreSQL
/// server on which the user may create databases.
const CONFIG_ENV: &str = "TOME_TEST_CONFIG";

static NEXT_DB: AtomicU32 = AtomicU32::new(0);

async fn conn(config: &DbConfig) -> Result<Client> {
    let (client, connection) = tokio_postgres::config::Config::new()
        .user(&config.user)
        .password(config.password()?)
        .dbname(&config.database)
        .host(&config.host)
        .port(config.port)
        .application_name("Tome DB tests")
        .connect(NoTls)
        .await
        .context("could not connect to DB in test")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            panic!("PG connection error: {e}");
        }
    });

    Ok(client)
}

/// A migrated temporary database, dropped again on drop.
///
/// Only works with the multi threaded Tokio runtime, as `drop` blocks.
pub(super) struct TestDb {
    pool: Pool,
    controller: Client,
    db_name: String,
}

impl TestDb {
    /// Returns `None` if no test database is configured.
    pub(super) async fn with_migrations() -> Result<Option<Self>> {
        let Some(path) = std::env::var_os(CONFIG_ENV) else {
            eprintln!("{CONFIG_ENV} is not set: skipping PostgreSQL test");
            return Ok(None);
        };
        let config = Config::load_from(Path::new(&path))
            .context("failed to load test config")?;

        let controller = conn(&config.db).await?;
        let db_name = format!(
            "tome_test_{}_{}",
            std::process::id(),
            NEXT_DB.fetch_add(1, Ordering::SeqCst),
        );
        controller.execute(&format!("create database {db_name}"), &[]).await
            .context("failed to create temporary test DB")?;

        let pool = create_pool(&DbConfig {
            database: db_name.clone(),
            max_connections: 4,
            ..config.db
        }).await?;
        let out = Self { pool, controller, db_name };

        migrate(&mut *out.pool.get().await?).await
            .context("failed to run migrations on test DB")?;
        Ok(Some(out))
    }

    pub(super) fn store(&self) -> Store {
        Store::postgres(self.pool.clone())
    }

    /// Inserts a document directly, bypassing the store.
    pub(super) async fn insert_raw(&self, table: &str, doc: serde_json::Value) -> Result<Key> {
        let db = self.pool.get().await?;
        let row = db.query_one(
            &*format!("insert into {table} (doc) values ($1) returning id"),
            &[&doc],
        ).await?;
        Ok(row.get::<_, Key>(0))
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        self.pool.close();
        let sql = format!("drop database {} with (force)", self.db_name);
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.controller.execute(&sql, &[]))
        }).unwrap();
    }
}
