//! Items that define the domain data model and are shared between the
//! storage layer and the API.

mod key;

pub(crate) use self::key::Key;
