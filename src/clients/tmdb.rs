//! TMDB (The Movie Database) v3 client.
//!
//! Optional upstream fields are resolved into typed `Option`s here, at the
//! API boundary, so the rest of the pipeline never shape-checks raw JSON.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::TmdbConfig;

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("TMDB returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TmdbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct PagedResults<T> {
    results: Vec<T>,
}

/// One row of a list endpoint (trending, discover, recommendations, search).
/// Only the ID is load-bearing; the name is kept for log context.
#[derive(Debug, Clone, Deserialize)]
pub struct TvListing {
    pub id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TvDetails {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub credits: Credits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Network {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Genre {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastMember {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrewMember {
    pub name: String,
    pub job: String,
}

/// Upstream TV catalog provider.
///
/// The ingest pipeline only talks to this trait so tests can substitute a
/// scripted catalog for the real API.
#[async_trait]
pub trait TvCatalog: Send + Sync {
    async fn trending_today(&self) -> Result<Vec<TvListing>, TmdbError>;

    async fn popular(&self) -> Result<Vec<TvListing>, TmdbError>;

    async fn recommendations(&self, show_id: i64) -> Result<Vec<TvListing>, TmdbError>;

    async fn search(&self, query: &str) -> Result<Vec<TvListing>, TmdbError>;

    /// Full detail record including extended credits.
    async fn details(&self, show_id: i64) -> Result<TvDetails, TmdbError>;
}

#[derive(Clone)]
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    language: String,
    client: Client,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(config.request_timeout_seconds)))
            .build()?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, TmdbError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "TMDB request");

        let mut all_params = vec![("api_key", self.api_key.as_str())];
        all_params.extend_from_slice(params);

        let response = self.client.get(&url).query(&all_params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TmdbError::Api { status, body });
        }

        Ok(response.json().await?)
    }

    async fn get_listings(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<TvListing>, TmdbError> {
        let page: PagedResults<TvListing> = self.get_json(path, params).await?;
        Ok(page.results)
    }
}

#[async_trait]
impl TvCatalog for TmdbClient {
    async fn trending_today(&self) -> Result<Vec<TvListing>, TmdbError> {
        self.get_listings("/trending/tv/day", &[]).await
    }

    async fn popular(&self) -> Result<Vec<TvListing>, TmdbError> {
        self.get_listings("/discover/tv", &[("sort_by", "popularity.desc")])
            .await
    }

    async fn recommendations(&self, show_id: i64) -> Result<Vec<TvListing>, TmdbError> {
        self.get_listings(
            &format!("/tv/{show_id}/recommendations"),
            &[("language", self.language.as_str()), ("page", "1")],
        )
        .await
    }

    async fn search(&self, query: &str) -> Result<Vec<TvListing>, TmdbError> {
        self.get_listings("/search/tv", &[("query", query)]).await
    }

    async fn details(&self, show_id: i64) -> Result<TvDetails, TmdbError> {
        self.get_json(
            &format!("/tv/{show_id}"),
            &[
                ("language", self.language.as_str()),
                ("append_to_response", "credits"),
            ],
        )
        .await
    }
}
