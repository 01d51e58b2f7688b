use std::time::Instant;

use futures::{StreamExt as _, TryStreamExt as _};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use url::Url;

use crate::prelude::*;
use super::{BaseUrl, SpellsConfig};


/// Sends requests to the remote spell API.
pub(crate) struct SpellClient {
    http_client: reqwest::Client,
    base: BaseUrl,
    concurrent_requests: usize,
}

impl SpellClient {
    pub(crate) fn new(config: &SpellsConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("tome/", env!("CARGO_PKG_VERSION")));
        builder = match &config.proxy {
            Some(proxy) => {
                let proxy = reqwest::Proxy::all(proxy)
                    .with_context(|| format!("invalid proxy '{proxy}'"))?;
                builder.proxy(proxy)
            }
            // Without this, `reqwest` would pick up proxies from env variables.
            None => builder.no_proxy(),
        };

        Ok(Self {
            http_client: builder.build().context("failed to build HTTP client")?,
            base: config.remote_url.clone(),
            concurrent_requests: config.concurrent_requests.max(1).into(),
        })
    }

    /// Fetches a single spell by its index (e.g. "acid-arrow"). Returns `None`
    /// if the API answers with 404 or if `index` is empty.
    pub(crate) async fn spell_by_index(&self, index: &str) -> Result<Option<RemoteSpell>> {
        // An empty segment would turn this into a request for the spell list.
        if index.is_empty() {
            return Ok(None);
        }

        let mut url = self.base.as_url().clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("base URL '{}' cannot have path segments", self.base))?
            .pop_if_empty()
            .push("spells")
            .push(index);

        self.get_json(url).await
    }

    /// Fetches the full data of all spells, or only those whose name contains
    /// `name_filter` (case-sensitive). The list is fetched first, then the
    /// details of each listed spell, in the order of the list.
    pub(crate) async fn all_spells(&self, name_filter: Option<&str>) -> Result<Vec<RemoteSpell>> {
        let before = Instant::now();
        let list_url = self.resolve("spells")?;
        let list = self.get_json::<SpellList>(list_url.clone()).await?
            .ok_or_else(|| anyhow!("spell list not found (404 from '{list_url}')"))?;

        let urls = list.results.into_iter()
            .filter(|entry| name_filter.map_or(true, |needle| entry.name.contains(needle)))
            .map(|entry| self.resolve(&entry.url))
            .collect::<Result<Vec<_>>>()?;
        let count = urls.len();

        let spells = futures::stream::iter(urls)
            .map(|url| async move {
                self.get_json::<RemoteSpell>(url.clone()).await?
                    .ok_or_else(|| anyhow!("listed spell not found (404 from '{url}')"))
            })
            .buffered(self.concurrent_requests)
            .try_collect::<Vec<_>>()
            .await?;

        debug!("Fetched {count} spells from remote API in {:.2?}", before.elapsed());
        Ok(spells)
    }

    /// Fetches the spell list once to make sure the API is reachable and
    /// returns data we understand.
    pub(crate) async fn test_connection(&self) -> Result<()> {
        let url = self.resolve("spells")?;
        let list = self.get_json::<SpellList>(url.clone()).await?
            .ok_or_else(|| anyhow!("spell list not found (404 from '{url}')"))?;
        info!("Remote spell API at '{}' lists {} spells", self.base, list.results.len());
        Ok(())
    }

    /// Resolves an absolute or relative URL against the base URL. Absolute
    /// paths like `/api/spells/x` (as returned in the spell list) replace the
    /// base path.
    fn resolve(&self, url: &str) -> Result<Url> {
        self.base.as_url().join(url).with_context(|| format!("invalid URL '{url}'"))
    }

    /// Sends a GET request and deserializes the JSON response. `404` results
    /// in `Ok(None)`, all other non-success status codes are errors.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        trace!("Sending request to remote spell API: GET {url}");
        let response = self.http_client.get(url.clone())
            .send()
            .await
            .with_context(|| format!("HTTP request failed (to '{url}')"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            trace!("Remote spell API answered 404 for '{url}'");
            return Ok(None);
        }
        if !status.is_success() {
            bail!("remote spell API replied with unexpected status {status} (to '{url}')");
        }

        let body = response.bytes()
            .await
            .with_context(|| format!("failed to download body (from '{url}')"))?;
        serde_json::from_slice(&body)
            .with_context(|| format!("failed to deserialize response from '{url}'"))
            .map(Some)
    }
}


#[derive(Debug, Deserialize)]
struct SpellList {
    results: Vec<SpellListEntry>,
}

#[derive(Debug, Deserialize)]
struct SpellListEntry {
    name: String,
    url: String,
}

/// A spell as returned by the remote API. Only the fields we expose are
/// deserialized.
#[derive(Debug, Deserialize)]
pub(crate) struct RemoteSpell {
    pub(crate) index: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) desc: Vec<String>,
    #[serde(default)]
    pub(crate) higher_level: Vec<String>,
    pub(crate) page: Option<String>,
    pub(crate) range: Option<String>,
    #[serde(default)]
    pub(crate) components: Vec<String>,
    pub(crate) material: Option<String>,
    pub(crate) ritual: Option<bool>,
    pub(crate) duration: Option<String>,
    pub(crate) concentration: Option<bool>,
    pub(crate) casting_time: Option<String>,
    pub(crate) level: Option<i64>,
    pub(crate) school: Option<NamedRef>,
    #[serde(default)]
    pub(crate) classes: Vec<NamedRef>,
    #[serde(default)]
    pub(crate) subclasses: Vec<NamedRef>,
}

/// Reference to another API resource, e.g. `{ "index": "evocation", "name": "Evocation", ... }`.
#[derive(Debug, Deserialize)]
pub(crate) struct NamedRef {
    pub(crate) name: String,
}
