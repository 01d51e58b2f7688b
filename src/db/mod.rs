//! PostgreSQL connection handling, migrations and the `db` subcommands.

use deadpool_postgres::{Pool, Runtime};
use secrecy::{ExposeSecret, SecretString};
use tokio_postgres::NoTls;

use crate::prelude::*;


pub(crate) mod cmd;
mod migrations;
pub(crate) mod util;

#[cfg(test)]
mod tests;

pub(crate) use self::migrations::migrate;


#[derive(Debug, confique::Config)]
pub(crate) struct DbConfig {
    #[config(default = "tome")]
    pub(crate) user: String,

    /// Required if `storage.backend` is "postgres".
    pub(crate) password: Option<SecretString>,

    #[config(default = "127.0.0.1")]
    pub(crate) host: String,

    #[config(default = 5432)]
    pub(crate) port: u16,

    /// Name of the database. Tome creates its tables in the `public` schema.
    #[config(default = "tome")]
    pub(crate) database: String,

    /// Upper limit of open connections. Each GraphQL field that touches the
    /// store holds one connection while it runs.
    #[config(default = 16)]
    pub(crate) max_connections: usize,
}

impl DbConfig {
    fn password(&self) -> Result<&str> {
        self.password.as_ref()
            .map(|pw| pw.expose_secret())
            .ok_or_else(|| anyhow!("`db.password` is required for the 'postgres' backend"))
    }

    fn pool_config(&self) -> Result<deadpool_postgres::Config> {
        let mut out = deadpool_postgres::Config::new();
        out.user = Some(self.user.clone());
        out.password = Some(self.password()?.to_owned());
        out.host = Some(self.host.clone());
        out.port = Some(self.port);
        out.dbname = Some(self.database.clone());
        out.application_name = Some("Tome".into());
        out.pool = Some(deadpool_postgres::PoolConfig::new(self.max_connections));
        Ok(out)
    }
}

/// A pooled connection.
pub(crate) type Db = deadpool_postgres::ClientWrapper;


/// Creates a connection pool and makes sure the database is usable by
/// opening one connection.
pub(crate) async fn create_pool(config: &DbConfig) -> Result<Pool> {
    debug!(
        "Connecting to PostgreSQL database '{}' at {}:{} as '{}'",
        config.database,
        config.host,
        config.port,
        config.user,
    );
    let pool = config.pool_config()?.create_pool(Some(Runtime::Tokio1), NoTls)?;

    let client = pool.get().await.context("failed to open connection")?;
    let encoding: String = client
        .query_one("select current_setting('server_encoding')", &[])
        .await
        .context("failed to run test query")?
        .get(0);
    if encoding != "UTF8" {
        bail!("database uses encoding '{encoding}', but Tome only works with UTF8");
    }

    info!("Connected to database '{}'", config.database);
    Ok(pool)
}
