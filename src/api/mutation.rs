use juniper::{graphql_object, ID};

use super::{
    Context,
    err::ApiResult,
    model::{
        author::{Author, NewAuthor},
        book::{Book, NewBook},
        spell::{NewSpell, Spell},
    },
};


/// The root mutation object.
pub(crate) struct Mutation;

#[graphql_object(context = Context)]
impl Mutation {
    /// Adds a new spell. Fails if spells are loaded from a remote API.
    #[allow(clippy::too_many_arguments)]
    async fn add_spell(
        name: String,
        description: String,
        higher_level: String,
        page: String,
        range: String,
        components: String,
        material: String,
        ritual: String,
        duration: String,
        concentration: String,
        casting_time: String,
        level: String,
        school: String,
        class: String,
        archetype: String,
        domains: String,
        patrons: String,
        oaths: String,
        context: &Context,
    ) -> ApiResult<Spell> {
        let spell = NewSpell {
            name,
            description,
            higher_level,
            page,
            range,
            components,
            material,
            ritual,
            duration,
            concentration,
            casting_time,
            level,
            school,
            class,
            archetype,
            domains,
            patrons,
            oaths,
        };
        Spell::add(spell, context).await
    }

    async fn add_author(name: String, age: i32, context: &Context) -> ApiResult<Author> {
        Author::add(NewAuthor { name, age }, context).await
    }

    /// Adds a new book. `authorID` is not checked: it does not need to refer
    /// to an existing author.
    async fn add_book(
        name: String,
        pages: i32,
        #[graphql(name = "authorID")]
        author_id: ID,
        context: &Context,
    ) -> ApiResult<Book> {
        let book = NewBook { name, pages, author_id: author_id.to_string() };
        Book::add(book, context).await
    }
}
