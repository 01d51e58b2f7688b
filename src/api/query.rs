use juniper::{graphql_object, ID};

use super::{
    Context,
    err::ApiResult,
    model::{
        author::Author,
        book::Book,
        spell::Spell,
    },
};


/// The root query object.
pub(crate) struct Query;

#[graphql_object(context = Context)]
impl Query {
    /// Returns the spell with the given ID, or `null` if it does not exist or
    /// no ID is given.
    async fn spell(id: Option<ID>, context: &Context) -> ApiResult<Option<Spell>> {
        match id {
            Some(id) => Spell::load_by_id(id, context).await,
            None => Ok(None),
        }
    }

    /// Returns all spells. If `name` is given, only spells whose name contains
    /// it (case-sensitive) are returned.
    async fn spells(name: Option<String>, context: &Context) -> ApiResult<Vec<Spell>> {
        Spell::load_all(name, context).await
    }

    /// Returns the book with the given ID, or `null` if it does not exist or
    /// no ID is given.
    async fn book(id: Option<ID>, context: &Context) -> ApiResult<Option<Book>> {
        match id {
            Some(id) => Book::load_by_id(id, context).await,
            None => Ok(None),
        }
    }

    async fn books(context: &Context) -> ApiResult<Vec<Book>> {
        Book::load_all(context).await
    }

    /// Returns the author with the given ID, or `null` if it does not exist or
    /// no ID is given.
    async fn author(id: Option<ID>, context: &Context) -> ApiResult<Option<Author>> {
        match id {
            Some(id) => Author::load_by_id(id, context).await,
            None => Ok(None),
        }
    }

    async fn authors(context: &Context) -> ApiResult<Vec<Author>> {
        Author::load_all(context).await
    }
}
