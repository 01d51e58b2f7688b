//! Proxying spells from a third-party REST API instead of the document store.
//!
//! The API is expected to behave like the D&D 5e API
//! (<https://www.dnd5eapi.co>): `GET spells` returns a list of references and
//! `GET spells/{index}` returns a single spell.

use std::{fmt, str::FromStr};

use serde::Deserialize;
use url::{Host, Url};

use crate::prelude::*;

mod client;

pub(crate) use self::client::{NamedRef, RemoteSpell, SpellClient};


#[derive(Debug, confique::Config)]
pub(crate) struct SpellsConfig {
    /// Where spells are loaded from.
    ///
    /// - "store": the configured document store, like books and authors.
    /// - "remote": the REST API at `remote_url`. In this mode, spells are
    ///   read-only and the `addSpell` mutation always fails.
    #[config(default = "store")]
    pub(crate) source: SpellSourceKind,

    /// Base URL of the spell API. Only used if `source = "remote"`. Has to be
    /// HTTPS unless the host is local. To use HTTP anyway, append
    /// "#allow-insecure" to the URL.
    #[config(default = "https://www.dnd5eapi.co/api/")]
    pub(crate) remote_url: BaseUrl,

    /// HTTP proxy used for all requests to `remote_url`, e.g.
    /// "http://proxy.my-org.example:80". By default, no proxy is used.
    pub(crate) proxy: Option<String>,

    /// Maximum number of requests that are sent concurrently when loading
    /// the details of all spells.
    #[config(default = 8)]
    pub(crate) concurrent_requests: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum SpellSourceKind {
    Store,
    Remote,
}

/// Where the API loads spells from.
pub(crate) enum SpellSource {
    Store,
    Remote(SpellClient),
}

impl SpellSource {
    pub(crate) fn from_config(config: &SpellsConfig) -> Result<Self> {
        match config.source {
            SpellSourceKind::Store => Ok(Self::Store),
            SpellSourceKind::Remote => {
                info!("Spells are proxied from '{}'", config.remote_url);
                SpellClient::new(config).map(Self::Remote)
            }
        }
    }
}


/// Base URL of the remote API. Parsing makes sure it is HTTPS (or HTTP to
/// a loopback host, or explicitly allowed with `#allow-insecure`), has no
/// query, credentials or fragment, and ends with `/`.
#[derive(Clone, Deserialize)]
#[serde(try_from = "String")]
pub(crate) struct BaseUrl(Url);

const ALLOW_INSECURE: &str = "allow-insecure";

impl BaseUrl {
    pub(crate) fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl fmt::Debug for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BaseUrl({:?})", self.0.as_str())
    }
}

impl FromStr for BaseUrl {
    type Err = anyhow::Error;

    fn from_str(src: &str) -> Result<Self> {
        let mut url = Url::parse(src).with_context(|| format!("'{src}' is not a valid URL"))?;
        if url.cannot_be_a_base() || url.host().is_none() {
            bail!("'{src}' has no host");
        }

        let insecure_allowed = match url.fragment() {
            None => false,
            Some(ALLOW_INSECURE) => true,
            Some(other) => bail!("unexpected fragment '#{other}' (only '#{ALLOW_INSECURE}' is allowed)"),
        };
        match url.scheme() {
            "https" => {}
            "http" if insecure_allowed || is_loopback(&url) => {}
            "http" => bail!(
                "refusing unencrypted HTTP to '{}'. Use HTTPS, or append '#{ALLOW_INSECURE}' \
                    to the URL if you are sure",
                url.host_str().unwrap_or_default(),
            ),
            other => bail!("unsupported URL scheme '{other}'"),
        }
        if url.query().is_some() {
            bail!("base URL must not have a query");
        }
        if !url.username().is_empty() || url.password().is_some() {
            bail!("base URL must not contain credentials");
        }

        // Otherwise joining relative paths would replace the last segment.
        url.set_fragment(None);
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self(url))
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = anyhow::Error;

    fn try_from(src: String) -> Result<Self> {
        src.parse()
    }
}

/// Whether the host is a loopback IP or "localhost". Only meant to catch
/// configuration mistakes, so no DNS lookup is done.
fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        Some(Host::Domain(domain)) => domain == "localhost",
        None => false,
    }
}
