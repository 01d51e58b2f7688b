//! The document store holding all spells, books and authors.
//!
//! Documents are schemaless JSON objects, grouped by [`Kind`]. Each document
//! gets a [`Key`] assigned by the backend when it is saved. Everything above
//! this module only talks to [`Store`], which dispatches to the configured
//! backend.

use std::sync::atomic::{AtomicU64, Ordering};

use deadpool_postgres::Pool;
use serde::{de::DeserializeOwned, Serialize};

use crate::{model::Key, prelude::*};

mod memory;
mod pg;

use self::{memory::MemoryStore, pg::PgStore};


#[derive(Debug, confique::Config)]
pub(crate) struct StorageConfig {
    /// Where documents are stored.
    ///
    /// - "postgres": in the PostgreSQL database configured in `[db]`.
    /// - "memory": in memory of this process. Everything is lost on restart!
    ///   Only useful for development.
    #[config(default = "postgres")]
    pub(crate) backend: BackendKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum BackendKind {
    Postgres,
    Memory,
}

/// The different kinds of documents. Each kind lives in its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Kind {
    Spell,
    Book,
    Author,
}

impl Kind {
    /// Name of the collection (i.e. the DB table) holding this kind.
    pub(crate) fn collection(self) -> &'static str {
        match self {
            Kind::Spell => "spells",
            Kind::Book => "books",
            Kind::Author => "authors",
        }
    }
}

/// A document body: the JSON object without its key.
pub(crate) type Document = serde_json::Map<String, serde_json::Value>;

/// Restricts which documents are returned by [`Store::find`]. Fields always
/// refer to top-level string fields of the document.
#[derive(Debug, Clone)]
pub(crate) enum Filter {
    All,

    /// The field is exactly equal to `value`.
    Eq { field: &'static str, value: String },

    /// The field contains `needle` as literal, case-sensitive substring.
    Contains { field: &'static str, needle: String },
}

impl Filter {
    fn matches(&self, doc: &Document) -> bool {
        let field_str = |field: &str| doc.get(field).and_then(|v| v.as_str());
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => field_str(field) == Some(value.as_str()),
            Filter::Contains { field, needle } => {
                field_str(field).is_some_and(|s| s.contains(needle.as_str()))
            }
        }
    }
}

/// A document as returned by the store, together with its key.
#[derive(Debug, Clone)]
pub(crate) struct Stored {
    pub(crate) key: Key,
    pub(crate) doc: Document,
}

impl Stored {
    /// Deserializes this document into a record type. The key is made
    /// available to the record as string field `id`.
    pub(crate) fn into_record<T: Record>(self) -> Result<T, StoreError> {
        let Self { key, mut doc } = self;
        doc.insert("id".into(), key.to_string().into());
        serde_json::from_value(doc.into())
            .map_err(|source| StoreError::Decode { kind: T::KIND, key, source })
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("malformed ID '{0}'")]
    MalformedId(String),

    #[error("failed to obtain database connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    #[error("stored {kind:?} document {key} is invalid: {source}")]
    Decode {
        kind: Kind,
        key: Key,
        source: serde_json::Error,
    },

    #[error("document could not be serialized as JSON object")]
    Encode,
}

/// A typed view on documents of one kind.
pub(crate) trait Record: DeserializeOwned {
    const KIND: Kind;

    /// The data required to create a new record of this type.
    type New: Serialize + Sync;
}


/// Handle to the configured storage backend.
pub(crate) struct Store {
    backend: Backend,
    num_calls: AtomicU64,
}

enum Backend {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl Store {
    pub(crate) fn postgres(pool: Pool) -> Self {
        Self::new(Backend::Postgres(PgStore::new(pool)))
    }

    pub(crate) fn in_memory() -> Self {
        Self::new(Backend::Memory(MemoryStore::default()))
    }

    fn new(backend: Backend) -> Self {
        Self { backend, num_calls: AtomicU64::new(0) }
    }

    /// Number of calls to `find_by_id`, `find` and `save` so far.
    pub(crate) fn num_calls(&self) -> u64 {
        self.num_calls.load(Ordering::SeqCst)
    }

    fn increase_num_calls(&self) {
        self.num_calls.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the document of the given kind with the given ID, or `None` if
    /// no such document exists. IDs that are not valid keys result in
    /// `StoreError::MalformedId`.
    pub(crate) async fn find_by_id(&self, kind: Kind, id: &str) -> Result<Option<Stored>, StoreError> {
        trace!("Store: find {} by ID '{}'", kind.collection(), id);
        self.increase_num_calls();

        let key = id.parse::<Key>().map_err(|_| StoreError::MalformedId(id.to_owned()))?;
        match &self.backend {
            Backend::Postgres(pg) => pg.find_by_id(kind, key).await,
            Backend::Memory(mem) => Ok(mem.find_by_id(kind, key)),
        }
    }

    /// Returns all documents of the given kind matching `filter`, ordered by
    /// key.
    pub(crate) async fn find(&self, kind: Kind, filter: &Filter) -> Result<Vec<Stored>, StoreError> {
        trace!("Store: find {} with {:?}", kind.collection(), filter);
        self.increase_num_calls();

        match &self.backend {
            Backend::Postgres(pg) => pg.find(kind, filter).await,
            Backend::Memory(mem) => Ok(mem.find(kind, filter)),
        }
    }

    /// Stores a new document and returns it together with its newly assigned
    /// key.
    pub(crate) async fn save(&self, kind: Kind, doc: Document) -> Result<Stored, StoreError> {
        trace!("Store: save new document in {}", kind.collection());
        self.increase_num_calls();

        match &self.backend {
            Backend::Postgres(pg) => pg.save(kind, doc).await,
            Backend::Memory(mem) => Ok(mem.save(kind, doc)),
        }
    }

    pub(crate) async fn load_by_id<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.find_by_id(T::KIND, id).await?
            .map(Stored::into_record)
            .transpose()
    }

    pub(crate) async fn load<T: Record>(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.find(T::KIND, filter).await?
            .into_iter()
            .map(Stored::into_record)
            .collect()
    }

    pub(crate) async fn insert<T: Record>(&self, new: &T::New) -> Result<T, StoreError> {
        let doc = match serde_json::to_value(new) {
            Ok(serde_json::Value::Object(doc)) => doc,
            _ => return Err(StoreError::Encode),
        };
        self.save(T::KIND, doc).await?.into_record()
    }
}
