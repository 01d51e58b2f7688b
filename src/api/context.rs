use crate::{remote::SpellSource, store::Store};


/// The context that is accessible to every resolver in our API. It is created
/// once at startup and shared by all requests.
pub(crate) struct Context {
    pub(crate) store: Store,
    pub(crate) spells: SpellSource,
}

impl juniper::Context for Context {}
