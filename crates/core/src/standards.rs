use crate::config::Settings;
use crate::error::SearchError;
use crate::models::{SearchOutcome, StandardReference};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

pub const STANDARD_SITES: [&str; 4] = ["ieeexplore.ieee.org", "iec.ch", "sni.or.id", "nema.org"];

const MISSING_TITLE: &str = "No title";

/// One entry of a search engine's `organic_results` array.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct OrganicResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[async_trait]
pub trait SearchBackend {
    async fn organic_results(&self, query: &str) -> Result<Vec<OrganicResult>, SearchError>;
}

pub struct SerpApiClient {
    client: Client,
    endpoint: Url,
    engine: String,
    api_key: String,
}

impl SerpApiClient {
    pub fn new(settings: &Settings, api_key: impl Into<String>) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::builder().timeout(settings.search.timeout).build()?,
            endpoint: Url::parse(&settings.search.endpoint)?,
            engine: settings.search.engine.clone(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SearchBackend for SerpApiClient {
    async fn organic_results(&self, query: &str) -> Result<Vec<OrganicResult>, SearchError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("q", query),
                ("engine", self.engine.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SearchError::BackendResponse {
                backend: "serpapi".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let page: SearchPage = serde_json::from_str(&body)?;
        Ok(page.organic_results)
    }
}

pub fn site_restricted_query(keyword: &str) -> String {
    let sites = STANDARD_SITES
        .iter()
        .map(|site| format!("site:{site}"))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("{keyword} {sites}")
}

pub fn generic_query(keyword: &str) -> String {
    format!("standardization related to {keyword}")
}

/// Standards lookup; `None` backend means no credential was configured.
pub struct StandardsSearch<B = SerpApiClient> {
    backend: Option<B>,
}

impl StandardsSearch {
    pub fn from_settings(settings: &Settings) -> Result<Self, SearchError> {
        let backend = settings
            .serpapi_api_key
            .as_deref()
            .map(|key| SerpApiClient::new(settings, key))
            .transpose()?;
        Ok(Self { backend })
    }
}

impl<B> StandardsSearch<B>
where
    B: SearchBackend + Send + Sync,
{
    pub fn new(backend: Option<B>) -> Self {
        Self { backend }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Runs both queries; any failure discards everything collected so far.
    pub async fn search(&self, keyword: &str) -> SearchOutcome {
        let Some(backend) = &self.backend else {
            info!("search api key not configured, skipping standards search");
            return SearchOutcome::Unconfigured;
        };

        let keyword = keyword.trim();
        if keyword.is_empty() {
            return SearchOutcome::Empty;
        }

        let mut collected = Vec::new();
        for query in [site_restricted_query(keyword), generic_query(keyword)] {
            debug!(%query, "querying standards search");
            match backend.organic_results(&query).await {
                Ok(results) => collected.extend(results),
                Err(error) => {
                    warn!(%error, "standards search failed");
                    return SearchOutcome::Failed(error);
                }
            }
        }

        let references = dedupe_by_link(collected);
        if references.is_empty() {
            SearchOutcome::Empty
        } else {
            SearchOutcome::Found(references)
        }
    }
}

/// Keeps the first result per non-empty link, in first-seen order.
pub fn dedupe_by_link(results: impl IntoIterator<Item = OrganicResult>) -> Vec<StandardReference> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter_map(|result| {
            let link = result.link.filter(|link| !link.trim().is_empty())?;
            if !seen.insert(link.clone()) {
                return None;
            }
            Some(StandardReference {
                title: result.title.unwrap_or_else(|| MISSING_TITLE.to_string()),
                snippet: result.snippet.unwrap_or_default(),
                link,
            })
        })
        .collect()
}
