use juniper::{graphql_object, ID};
use serde::{Deserialize, Serialize};

use crate::{
    api::{Context, err::ApiResult},
    store::{Filter, Kind, Record},
};
use super::book::Book;


#[derive(Debug, Deserialize)]
pub(crate) struct Author {
    id: String,
    name: Option<String>,
    age: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewAuthor {
    pub(crate) name: String,
    pub(crate) age: i32,
}

impl Record for Author {
    const KIND: Kind = Kind::Author;
    type New = NewAuthor;
}

#[graphql_object(context = Context)]
impl Author {
    fn id(&self) -> ID {
        ID::from(self.id.clone())
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn age(&self) -> Option<i32> {
        self.age
    }

    /// All books whose `authorID` is the ID of this author.
    async fn book(&self, context: &Context) -> ApiResult<Vec<Book>> {
        Book::load_by_author(&self.id, context).await
    }
}

impl Author {
    pub(crate) async fn load_by_id(id: ID, context: &Context) -> ApiResult<Option<Self>> {
        Ok(context.store.load_by_id(&id).await?)
    }

    pub(crate) async fn load_all(context: &Context) -> ApiResult<Vec<Self>> {
        Ok(context.store.load(&Filter::All).await?)
    }

    pub(crate) async fn add(author: NewAuthor, context: &Context) -> ApiResult<Self> {
        Ok(context.store.insert::<Self>(&author).await?)
    }
}
