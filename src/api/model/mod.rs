//! The record types exposed via GraphQL.

pub(crate) mod author;
pub(crate) mod book;
pub(crate) mod spell;
