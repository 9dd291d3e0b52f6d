//! Catalog ingest pipeline: fetch an upstream list, split it into known and
//! unseen shows, pull detail records for the unseen ones, normalize them and
//! merge the result into the store.
//!
//! Each cycle is one linear fallible sequence. The only fan-out is the detail
//! fetch; everything else runs sequentially. No step retries on its own, the
//! next scheduled cycle is the retry mechanism.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clients::tmdb::{CastMember, CrewMember};
use crate::clients::{TmdbError, TvCatalog, TvDetails};
use crate::db::Store;
use crate::models::Show;

/// Recommendation lists are trimmed to the top entries before ingestion.
const RECOMMENDED_LIMIT: usize = 6;
/// Search results are trimmed harder, they are noisier.
const SEARCH_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("TMDB {endpoint} request failed: {source}")]
    Upstream {
        endpoint: &'static str,
        #[source]
        source: TmdbError,
    },

    #[error("store error: {0}")]
    Store(String),
}

impl IngestError {
    fn upstream(endpoint: &'static str) -> impl FnOnce(TmdbError) -> Self {
        move |source| Self::Upstream { endpoint, source }
    }

    fn store(err: anyhow::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Result of partitioning an upstream ID list against the store.
///
/// Every distinct input ID lands in exactly one of the two sides.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub existing: Vec<i64>,
    pub new_shows: Vec<i64>,
}

/// What one reconciliation cycle did to the store.
#[derive(Debug, Serialize)]
pub struct CycleOutcome {
    /// IDs from the upstream list that were already persisted.
    pub existing: Vec<i64>,
    /// Newly normalized and inserted records.
    pub inserted: Vec<Show>,
}

/// Orchestrates reconciliation cycles against one upstream catalog and one
/// store. Both collaborators are injected so tests can script the catalog
/// and run against an in-memory store.
pub struct IngestService {
    catalog: Arc<dyn TvCatalog>,
    store: Store,
    image_base_url: String,
}

impl IngestService {
    pub fn new(catalog: Arc<dyn TvCatalog>, store: Store, image_base_url: impl Into<String>) -> Self {
        Self {
            catalog,
            store,
            image_base_url: image_base_url.into(),
        }
    }

    /// Ingests today's trending list and resets the trending snapshot to it.
    pub async fn run_trending_cycle(&self) -> Result<CycleOutcome, IngestError> {
        let listings = self
            .catalog
            .trending_today()
            .await
            .map_err(IngestError::upstream("/trending/tv/day"))?;

        let ids = listing_ids(&listings, usize::MAX);
        let outcome = self.reconcile(&ids, true).await?;
        info!(
            list = "trending",
            existing = outcome.existing.len(),
            inserted = outcome.inserted.len(),
            "trending cycle complete"
        );
        Ok(outcome)
    }

    /// Ingests the popularity-sorted discover list. Shares the trending
    /// snapshot with the trending cycle: whichever ran last defines it.
    pub async fn run_popular_cycle(&self) -> Result<CycleOutcome, IngestError> {
        let listings = self
            .catalog
            .popular()
            .await
            .map_err(IngestError::upstream("/discover/tv"))?;

        let ids = listing_ids(&listings, usize::MAX);
        let outcome = self.reconcile(&ids, true).await?;
        info!(
            list = "popular",
            existing = outcome.existing.len(),
            inserted = outcome.inserted.len(),
            "popular cycle complete"
        );
        Ok(outcome)
    }

    /// Ingests the top recommendations for `source_id` and cross-references
    /// the full ID union onto the source show's record. The cross-reference
    /// is written before the detail fetch so it lands even when that fails.
    pub async fn run_recommended_cycle(&self, source_id: i64) -> Result<CycleOutcome, IngestError> {
        let listings = self
            .catalog
            .recommendations(source_id)
            .await
            .map_err(IngestError::upstream("/tv/{id}/recommendations"))?;

        let ids = listing_ids(&listings, RECOMMENDED_LIMIT);
        let split = self.classify(&ids).await;

        let union: Vec<i64> = split
            .existing
            .iter()
            .chain(split.new_shows.iter())
            .copied()
            .collect();
        self.store
            .set_show_recommendations(source_id, &union)
            .await
            .map_err(IngestError::store)?;

        let details = self.fetch_details(&split.new_shows).await?;
        let inserted = self.apply(details, &split.existing, false).await?;

        info!(
            list = "recommended",
            source_id,
            existing = split.existing.len(),
            inserted = inserted.len(),
            "recommended cycle complete"
        );
        Ok(CycleOutcome {
            existing: split.existing,
            inserted,
        })
    }

    /// Ingests the top search results for `query`. No trending snapshot.
    pub async fn run_search_cycle(&self, query: &str) -> Result<CycleOutcome, IngestError> {
        let listings = self
            .catalog
            .search(query)
            .await
            .map_err(IngestError::upstream("/search/tv"))?;

        let ids = listing_ids(&listings, SEARCH_LIMIT);
        let split = self.classify(&ids).await;
        let details = self.fetch_details(&split.new_shows).await?;
        let inserted = self.apply(details, &split.existing, false).await?;

        info!(
            list = "search",
            query,
            existing = split.existing.len(),
            inserted = inserted.len(),
            "search cycle complete"
        );
        Ok(CycleOutcome {
            existing: split.existing,
            inserted,
        })
    }

    async fn reconcile(&self, ids: &[i64], snapshot: bool) -> Result<CycleOutcome, IngestError> {
        let split = self.classify(ids).await;
        let details = self.fetch_details(&split.new_shows).await?;
        let inserted = self.apply(details, &split.existing, snapshot).await?;
        Ok(CycleOutcome {
            existing: split.existing,
            inserted,
        })
    }

    /// Partitions candidate IDs into known and unseen with a single
    /// membership query. A failed read degrades to "all unseen" rather than
    /// aborting; the store-side upsert absorbs the resulting re-inserts.
    pub async fn classify(&self, ids: &[i64]) -> Classification {
        let unique = dedupe(ids);

        let known = match self.store.known_show_ids(&unique).await {
            Ok(known) => known,
            Err(e) => {
                warn!(error = %e, "existence check failed, treating batch as unseen");
                HashSet::new()
            }
        };

        let mut split = Classification::default();
        for id in unique {
            if known.contains(&id) {
                split.existing.push(id);
            } else {
                split.new_shows.push(id);
            }
        }
        split
    }

    /// Fetches detail records for every distinct ID concurrently.
    ///
    /// Empty input returns immediately without touching the network. A single
    /// failed request fails the whole batch; there are no partial results.
    pub async fn fetch_details(&self, ids: &[i64]) -> Result<Vec<TvDetails>, IngestError> {
        let unique = dedupe(ids);
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let requests = unique.iter().map(|&id| self.catalog.details(id));
        try_join_all(requests)
            .await
            .map_err(IngestError::upstream("/tv/{id}"))
    }

    /// Normalizes and persists a batch of detail payloads, then updates the
    /// trending snapshot when this cycle carries one.
    ///
    /// The snapshot is one conditional update (`trending = member-of(set)`)
    /// covering the cycle's existing IDs plus whatever was just inserted, so
    /// there is no window where the trending view is empty.
    async fn apply(
        &self,
        details: Vec<TvDetails>,
        existing: &[i64],
        snapshot: bool,
    ) -> Result<Vec<Show>, IngestError> {
        let mut shows = Vec::with_capacity(details.len());
        for detail in details {
            match normalize(&detail, &self.image_base_url, snapshot) {
                Some(show) => shows.push(show),
                None => debug!(show_id = detail.id, "skipping show without poster path"),
            }
        }

        self.store
            .insert_shows(&shows)
            .await
            .map_err(IngestError::store)?;

        if snapshot {
            let members: Vec<i64> = existing
                .iter()
                .copied()
                .chain(shows.iter().map(|s| s.id))
                .collect();
            let rows = self
                .store
                .set_trending_membership(&members)
                .await
                .map_err(IngestError::store)?;
            debug!(members = members.len(), rows, "trending snapshot updated");
        }

        Ok(shows)
    }
}

/// Order-preserving dedupe; two list entries with the same ID collapse into
/// one candidate.
fn dedupe(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn listing_ids(listings: &[crate::clients::TvListing], limit: usize) -> Vec<i64> {
    listings.iter().take(limit).map(|l| l.id).collect()
}

/// Maps a raw detail payload into a [`Show`].
///
/// Returns `None` when the payload carries no poster path; such shows are
/// dropped rather than inserted with an empty image. A zero popularity or
/// rating is treated as absent, matching what the provider sends for
/// unscored shows.
#[must_use]
pub fn normalize(details: &TvDetails, image_base_url: &str, trending: bool) -> Option<Show> {
    let poster = details.poster_path.as_deref()?;

    Some(Show {
        id: details.id,
        title: details.name.clone(),
        description: details
            .overview
            .clone()
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| "N/A".to_string()),
        image_path: format!("{image_base_url}{poster}"),
        popularity: details.popularity.filter(|p| *p != 0.0),
        rating: details.vote_average.filter(|r| *r != 0.0),
        network: details.networks.first().map(|n| n.name.clone()),
        genre: details
            .genres
            .first()
            .map(|g| g.name.clone())
            .unwrap_or_default(),
        actors: top_cast(&details.credits.cast),
        director: resolve_director(&details.credits.crew),
        trending,
        recommendations: None,
    })
}

/// Up to 3 principal cast names, in billing order.
#[must_use]
pub fn top_cast(cast: &[CastMember]) -> Vec<String> {
    cast.iter().take(3).map(|c| c.name.clone()).collect()
}

/// First crew member credited as Director, falling back to the first
/// Executive Producer, falling back to an empty string.
#[must_use]
pub fn resolve_director(crew: &[CrewMember]) -> String {
    crew.iter()
        .find(|c| c.job == "Director")
        .or_else(|| crew.iter().find(|c| c.job == "Executive Producer"))
        .map(|c| c.name.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::tmdb::{Credits, Genre, Network};

    const IMAGE_BASE: &str = "http://image.tmdb.org/t/p/original";

    fn details(id: i64) -> TvDetails {
        TvDetails {
            id,
            name: format!("Show {id}"),
            overview: Some("A show.".to_string()),
            poster_path: Some(format!("/poster-{id}.jpg")),
            popularity: Some(42.5),
            vote_average: Some(8.1),
            networks: vec![Network {
                name: "HBO".to_string(),
            }],
            genres: vec![
                Genre {
                    name: "Drama".to_string(),
                },
                Genre {
                    name: "Crime".to_string(),
                },
            ],
            credits: Credits::default(),
        }
    }

    fn cast(names: &[&str]) -> Vec<CastMember> {
        names
            .iter()
            .map(|n| CastMember {
                name: (*n).to_string(),
            })
            .collect()
    }

    fn crew(entries: &[(&str, &str)]) -> Vec<CrewMember> {
        entries
            .iter()
            .map(|(name, job)| CrewMember {
                name: (*name).to_string(),
                job: (*job).to_string(),
            })
            .collect()
    }

    #[test]
    fn dedupe_preserves_first_occurrence_order() {
        assert_eq!(dedupe(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert_eq!(dedupe(&[]), Vec::<i64>::new());
    }

    #[test]
    fn normalize_maps_fields() {
        let show = normalize(&details(7), IMAGE_BASE, true).unwrap();
        assert_eq!(show.id, 7);
        assert_eq!(show.title, "Show 7");
        assert_eq!(show.description, "A show.");
        assert_eq!(
            show.image_path,
            "http://image.tmdb.org/t/p/original/poster-7.jpg"
        );
        assert_eq!(show.popularity, Some(42.5));
        assert_eq!(show.rating, Some(8.1));
        assert_eq!(show.network.as_deref(), Some("HBO"));
        assert_eq!(show.genre, "Drama");
        assert!(show.trending);
    }

    #[test]
    fn normalize_drops_show_without_poster() {
        let mut d = details(7);
        d.poster_path = None;
        assert!(normalize(&d, IMAGE_BASE, false).is_none());
    }

    #[test]
    fn normalize_defaults_missing_overview() {
        let mut d = details(7);
        d.overview = None;
        assert_eq!(normalize(&d, IMAGE_BASE, false).unwrap().description, "N/A");

        d.overview = Some(String::new());
        assert_eq!(normalize(&d, IMAGE_BASE, false).unwrap().description, "N/A");
    }

    #[test]
    fn normalize_treats_zero_scores_as_absent() {
        let mut d = details(7);
        d.popularity = Some(0.0);
        d.vote_average = Some(0.0);
        let show = normalize(&d, IMAGE_BASE, false).unwrap();
        assert_eq!(show.popularity, None);
        assert_eq!(show.rating, None);
    }

    #[test]
    fn normalize_handles_empty_networks_and_genres() {
        let mut d = details(7);
        d.networks.clear();
        d.genres.clear();
        let show = normalize(&d, IMAGE_BASE, false).unwrap();
        assert_eq!(show.network, None);
        assert_eq!(show.genre, "");
    }

    #[test]
    fn top_cast_keeps_first_three_in_order() {
        let five = cast(&["A", "B", "C", "D", "E"]);
        assert_eq!(top_cast(&five), vec!["A", "B", "C"]);

        let one = cast(&["Solo"]);
        assert_eq!(top_cast(&one), vec!["Solo"]);

        assert!(top_cast(&[]).is_empty());
    }

    #[test]
    fn director_falls_back_to_executive_producer() {
        let c = crew(&[("A", "Writer"), ("B", "Executive Producer")]);
        assert_eq!(resolve_director(&c), "B");
    }

    #[test]
    fn director_prefers_director_credit() {
        let c = crew(&[("C", "Director"), ("B", "Executive Producer")]);
        assert_eq!(resolve_director(&c), "C");
    }

    #[test]
    fn director_defaults_to_empty() {
        assert_eq!(resolve_director(&[]), "");
        let c = crew(&[("A", "Writer")]);
        assert_eq!(resolve_director(&c), "");
    }
}
