//! Embedded schema migrations. Each one runs once and is recorded with its
//! script in `__db_migrations`, so later edits to an applied script are
//! detected instead of silently ignored.

use std::time::Duration;

use futures::TryStreamExt;
use tokio_postgres::{IsolationLevel, error::SqlState};

use crate::prelude::*;
use super::Db;


#[derive(Debug)]
struct Migration {
    name: &'static str,
    script: &'static str,
}

/// All migrations in order. The ID of each is its position plus one.
const MIGRATIONS: &[Migration] = &[
    Migration { name: "authors", script: include_str!("migrations/01-authors.sql") },
    Migration { name: "books", script: include_str!("migrations/02-books.sql") },
    Migration { name: "spells", script: include_str!("migrations/03-spells.sql") },
];

/// How often we retry when another Tome process migrates at the same time.
const MAX_ATTEMPTS: u32 = 10;

/// A row of `__db_migrations`.
#[derive(Debug)]
struct Applied {
    id: i64,
    name: String,
    script: String,
}

/// Brings the schema up to date. Fails if the applied migrations do not
/// match the ones built into this binary.
pub(crate) async fn migrate(db: &mut Db) -> Result<()> {
    let mut attempt = 1;
    loop {
        match try_migrate(db).await {
            Ok(0) => {
                info!("Database schema is up to date");
                return Ok(());
            }
            Ok(n) => {
                info!("Applied {n} migrations, database schema is up to date");
                return Ok(());
            }
            Err(e) if attempt < MAX_ATTEMPTS && is_conflict(&e) => {
                warn!("Migration conflicted with a concurrent one (attempt {attempt}), retrying");
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Runs all pending migrations in one serializable transaction. Returns how
/// many were applied.
async fn try_migrate(db: &mut Db) -> Result<usize> {
    let tx = db.build_transaction()
        .isolation_level(IsolationLevel::Serializable)
        .start()
        .await?;

    tx.batch_execute(include_str!("db-migrations.sql")).await
        .context("failed to create table '__db_migrations'")?;
    let applied = tx
        .query_raw("select id, name, script from __db_migrations order by id", dbargs![])
        .await?
        .map_ok(|row| Applied {
            id: row.get("id"),
            name: row.get("name"),
            script: row.get("script"),
        })
        .try_collect::<Vec<_>>()
        .await?;

    let todo = pending(&applied)?;
    for (i, migration) in todo.iter().enumerate() {
        let id = (applied.len() + i + 1) as i64;
        debug!("Applying migration {id} '{}'", migration.name);
        tx.batch_execute(migration.script).await
            .with_context(|| format!("migration {id} '{}' failed", migration.name))?;
        tx.execute(
            "insert into __db_migrations (id, name, script) values ($1, $2, $3)",
            &[&id, &migration.name, &migration.script],
        ).await?;
    }

    tx.commit().await?;
    Ok(todo.len())
}

/// Checks the applied migrations against ours and returns the ones still to
/// run.
fn pending(applied: &[Applied]) -> Result<&'static [Migration]> {
    for (i, row) in applied.iter().enumerate() {
        let expected_id = i as i64 + 1;
        if row.id != expected_id {
            bail!("applied migrations have a gap: expected ID {expected_id}, found {}", row.id);
        }

        let Some(ours) = MIGRATIONS.get(i) else {
            bail!(
                "database has migration {} '{}' which this version of Tome does not know. \
                    Was it migrated by a newer version?",
                row.id,
                row.name,
            );
        };
        if ours.script != row.script {
            debug!("Applied script of migration {}:\n{}", row.id, row.script);
            bail!("script of applied migration {} '{}' was changed since", row.id, row.name);
        }
    }

    Ok(&MIGRATIONS[applied.len()..])
}

/// Whether the error was caused by a concurrent transaction, i.e. the
/// migration can simply be retried.
fn is_conflict(e: &anyhow::Error) -> bool {
    e.chain()
        .filter_map(|cause| cause.downcast_ref::<tokio_postgres::Error>())
        .filter_map(|e| e.code())
        .any(|code| *code == SqlState::T_R_SERIALIZATION_FAILURE || *code == SqlState::UNIQUE_VIOLATION)
}
