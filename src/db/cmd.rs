use std::{io, os::unix::process::CommandExt, process::Command};

use futures::TryStreamExt;
use tokio_postgres::{GenericClient, IsolationLevel};

use crate::{prelude::*, config::Config, util::Never};
use super::{Db, DbConfig, create_pool};


#[derive(Debug, clap::Subcommand)]
pub(crate) enum DbCommand {
    /// Drops all tables, including all spells, books and authors.
    Clear,

    /// Applies missing migrations. `serve` does this on startup as well.
    Migrate,

    /// Opens `psql` connected to the configured database.
    Console,

    /// `clear` followed by `migrate`.
    Reset,
}

pub(crate) async fn run(cmd: &DbCommand, config: &Config) -> Result<()> {
    if let DbCommand::Console = cmd {
        return console(&config.db).map(|never| match never {});
    }

    let pool = create_pool(&config.db).await?;
    let mut db = pool.get().await?;
    match cmd {
        DbCommand::Clear => clear(&mut db, &config.db).await,
        DbCommand::Migrate => super::migrate(&mut db).await,
        DbCommand::Reset => {
            clear(&mut db, &config.db).await?;
            super::migrate(&mut db).await
        }
        DbCommand::Console => unreachable!(),
    }
}

/// Drops every table of the `public` schema after the user confirmed it.
async fn clear(db: &mut Db, config: &DbConfig) -> Result<()> {
    let tx = db.build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await?;

    let tables = table_names(&*tx).await?;
    if tables.is_empty() {
        info!("Database '{}' has no tables, nothing to clear", config.database);
        return Ok(());
    }

    let machine = hostname::get().ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "<unknown>".into());
    println!();
    println!("Running on '{machine}', connected to '{}' at '{}'.", config.database, config.host);
    println!("These tables will be dropped:");
    for table in &tables {
        let rows: i64 = tx.query_one(&*format!("select count(*) from {table}"), &[])
            .await?
            .get(0);
        println!("    {table}: {rows} rows");
    }
    println!();
    println!("All data in them is lost. Type 'yes' to continue.");
    crate::cmd::prompt_for_yes()?;

    tx.batch_execute(&format!("drop table {} cascade", tables.join(", "))).await?;
    tx.commit().await.context("failed to commit dropping of tables")?;
    info!("Dropped {} tables", tables.len());

    Ok(())
}

/// Names of all tables in the `public` schema, quoted for use in SQL.
async fn table_names(db: &impl GenericClient) -> Result<Vec<String>> {
    let names = db.query_raw(
            "select quote_ident(table_name) from information_schema.tables \
                where table_schema = 'public' and table_type = 'BASE TABLE' \
                order by table_name",
            dbargs![],
        )
        .await?
        .map_ok(|row| row.get::<_, String>(0))
        .try_collect()
        .await?;
    Ok(names)
}

/// Replaces this process with `psql`. The password is passed via the
/// environment so it does not show up in the process list.
fn console(config: &DbConfig) -> Result<Never> {
    let error = Command::new("psql")
        .env("PGPASSWORD", config.password()?)
        .arg("--host").arg(&config.host)
        .arg("--port").arg(config.port.to_string())
        .arg("--username").arg(&config.user)
        .arg("--dbname").arg(&config.database)
        .exec();

    let hint = match error.kind() {
        io::ErrorKind::NotFound => "`psql` is not installed or not in `PATH`",
        io::ErrorKind::PermissionDenied => "not allowed to execute `psql`",
        _ => "failed to start `psql`",
    };
    Err(error).context(hint)
}
