//! The error type returned by all resolvers.
//!
//! A failing resolver only nulls its own field. Clients can tell failures
//! apart by the `kind` in the error extensions and, for some invalid inputs,
//! by an additional machine readable `key`.

use juniper::{FieldError, IntoFieldError, ScalarValue, graphql_value};

use crate::{prelude::*, store::StoreError};


pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) msg: String,
    pub(crate) kind: ApiErrorKind,
    pub(crate) key: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    /// The client passed something we cannot work with, e.g. a malformed ID.
    InvalidInput,

    /// The store failed. Nothing the client can fix.
    InternalServerError,

    /// The remote spell API could not be reached or sent garbage.
    UpstreamUnavailable,
}

impl ApiErrorKind {
    fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::InvalidInput => "Invalid input",
            Self::InternalServerError => "Internal server error",
            Self::UpstreamUnavailable => "Spell API unavailable",
        }
    }
}

impl ApiError {
    /// Invalid input, tagged with `key` so clients can react to this case.
    pub(crate) fn invalid_input(key: &'static str, msg: impl Into<String>) -> Self {
        Self { msg: msg.into(), kind: ApiErrorKind::InvalidInput, key: Some(key) }
    }

    /// Wraps a failure of the remote spell API. The full chain is logged
    /// and also sent to the client.
    pub(crate) fn upstream(src: anyhow::Error) -> Self {
        error!("Request to remote spell API failed: {src:#}");
        Self {
            msg: format!("{src:#}"),
            kind: ApiErrorKind::UpstreamUnavailable,
            key: None,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(src: StoreError) -> Self {
        if let StoreError::MalformedId(_) = src {
            return Self::invalid_input("malformed-id", src.to_string());
        }

        // This is the last place where the details are still around.
        error!("Store operation failed: {src}");
        debug!("Store error details: {src:#?}");
        Self {
            msg: format!("store error: {src}"),
            kind: ApiErrorKind::InternalServerError,
            key: None,
        }
    }
}

impl<S: ScalarValue> IntoFieldError<S> for ApiError {
    fn into_field_error(self) -> FieldError<S> {
        let code = self.kind.code();
        let extensions = match self.key {
            Some(key) => graphql_value!({ "kind": (code), "key": (key) }),
            None => graphql_value!({ "kind": (code) }),
        };

        FieldError::new(format!("{}: {}", self.kind.label(), self.msg), extensions)
    }
}
