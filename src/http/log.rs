//! This module contains a bunch of small inline modules to make it possible to
//! easily filter out individual log messages with our filter system.

use crate::prelude::*;
use super::Request;


pub(crate) mod req {
    use super::*;

    pub(crate) fn log(req: &Request) {
        trace!(
            method = ?req.method(),
            path = req.uri().path_and_query().map_or("", |pq| pq.as_str()),
            "Incoming HTTP request",
        );
    }
}

pub(crate) mod headers {
    use super::*;

    pub(crate) fn log(req: &Request) {
        if tracing::enabled!(tracing::Level::TRACE) {
            let mut out = String::new();
            for (name, value) in req.headers() {
                use std::fmt::Write;
                let _ = write!(out, "\n  {}: {}", name, String::from_utf8_lossy(value.as_bytes()));
            }
            trace!("HTTP Headers: {}", out);
        }
    }
}
