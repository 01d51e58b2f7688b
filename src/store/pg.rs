use deadpool_postgres::Pool;
use futures::TryStreamExt;
use tokio_postgres::Row;

use crate::{model::Key, prelude::*};
use super::{Document, Filter, Kind, Stored, StoreError};


/// Backend storing each kind in its own table with a `jsonb` document column.
/// The tables are created by the DB migrations.
pub(super) struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub(super) fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub(super) async fn find_by_id(&self, kind: Kind, key: Key) -> Result<Option<Stored>, StoreError> {
        let db = self.pool.get().await?;
        let sql = format!("select id, doc from {} where id = $1", kind.collection());
        let statement = db.prepare_cached(&sql).await?;
        db.query_opt(&statement, &[&key]).await?
            .map(|row| from_row(kind, row))
            .transpose()
    }

    pub(super) async fn find(&self, kind: Kind, filter: &Filter) -> Result<Vec<Stored>, StoreError> {
        let db = self.pool.get().await?;
        let table = kind.collection();
        let rows: Vec<Row> = match filter {
            Filter::All => {
                let sql = format!("select id, doc from {table} order by id");
                let statement = db.prepare_cached(&sql).await?;
                db.query_raw(&statement, dbargs![]).await?.try_collect().await?
            }
            Filter::Eq { field, value } => {
                // The field name is inlined (it's a `&'static str` from our
                // code) so that expression indices like `idx_books_author`
                // can be used.
                let sql = format!("select id, doc from {table} where doc->>'{field}' = $1 order by id");
                let statement = db.prepare_cached(&sql).await?;
                db.query_raw(&statement, dbargs![value]).await?.try_collect().await?
            }
            Filter::Contains { field, needle } => {
                // `strpos` does a literal, case-sensitive search. Unlike
                // `like`, it does not treat `%` and `_` in `needle` specially.
                let sql = format!(
                    "select id, doc from {table} where strpos(doc->>'{field}', $1) > 0 order by id",
                );
                let statement = db.prepare_cached(&sql).await?;
                db.query_raw(&statement, dbargs![needle]).await?.try_collect().await?
            }
        };

        rows.into_iter().map(|row| from_row(kind, row)).collect()
    }

    pub(super) async fn save(&self, kind: Kind, doc: Document) -> Result<Stored, StoreError> {
        let db = self.pool.get().await?;
        let sql = format!("insert into {} (doc) values ($1) returning id, doc", kind.collection());
        let statement = db.prepare_cached(&sql).await?;
        let row = db.query_one(&statement, &[&serde_json::Value::Object(doc)]).await?;
        from_row(kind, row)
    }
}

fn from_row(kind: Kind, row: Row) -> Result<Stored, StoreError> {
    let key = row.try_get::<_, Key>("id")?;
    match row.try_get::<_, serde_json::Value>("doc")? {
        serde_json::Value::Object(doc) => Ok(Stored { key, doc }),
        other => {
            // The migrations add a check constraint, so this is only reachable
            // if someone removed that.
            let source = <serde_json::Error as serde::de::Error>::custom(
                format!("expected JSON object, found {other}"),
            );
            Err(StoreError::Decode { kind, key, source })
        }
    }
}
