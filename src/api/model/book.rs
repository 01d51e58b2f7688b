use juniper::{graphql_object, ID};
use serde::{Deserialize, Serialize};

use crate::{
    api::{Context, err::ApiResult},
    store::{Filter, Kind, Record, StoreError},
};
use super::author::Author;


#[derive(Debug, Deserialize)]
pub(crate) struct Book {
    id: String,
    name: Option<String>,
    pages: Option<i32>,

    /// Opaque reference to an author. Not checked on insert, so it might not
    /// refer to any existing author.
    #[serde(rename = "authorID")]
    author_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewBook {
    pub(crate) name: String,
    pub(crate) pages: i32,
    #[serde(rename = "authorID")]
    pub(crate) author_id: String,
}

impl Record for Book {
    const KIND: Kind = Kind::Book;
    type New = NewBook;
}

#[graphql_object(context = Context)]
impl Book {
    fn id(&self) -> ID {
        ID::from(self.id.clone())
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn pages(&self) -> Option<i32> {
        self.pages
    }

    /// The ID of the referenced author, whether or not that author exists.
    #[graphql(name = "authorID")]
    fn author_id(&self) -> Option<ID> {
        self.author_id.clone().map(ID::from)
    }

    /// The author of this book, or `null` if the referenced author does not
    /// exist.
    async fn author(&self, context: &Context) -> ApiResult<Option<Author>> {
        let Some(author_id) = &self.author_id else {
            return Ok(None);
        };

        match context.store.load_by_id(author_id).await {
            Ok(author) => Ok(author),
            // A reference that can never match any author is just a dangling one.
            Err(StoreError::MalformedId(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Book {
    pub(crate) async fn load_by_id(id: ID, context: &Context) -> ApiResult<Option<Self>> {
        Ok(context.store.load_by_id(&id).await?)
    }

    pub(crate) async fn load_all(context: &Context) -> ApiResult<Vec<Self>> {
        Ok(context.store.load(&Filter::All).await?)
    }

    /// Books written by the given author, ordered by ID.
    pub(crate) async fn load_by_author(author_id: &str, context: &Context) -> ApiResult<Vec<Self>> {
        let filter = Filter::Eq { field: "authorID", value: author_id.to_owned() };
        Ok(context.store.load(&filter).await?)
    }

    pub(crate) async fn add(book: NewBook, context: &Context) -> ApiResult<Self> {
        Ok(context.store.insert::<Self>(&book).await?)
    }
}
