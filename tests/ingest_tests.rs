//! Integration tests for the ingest pipeline: scripted catalog, real store
//! (in-memory SQLite).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use trendarr::clients::tmdb::{
    Credits, CrewMember, Genre, Network, TmdbError, TvCatalog, TvDetails, TvListing,
};
use trendarr::db::Store;
use trendarr::models::Show;
use trendarr::services::{IngestError, IngestService};

const IMAGE_BASE: &str = "http://image.tmdb.org/t/p/original";

#[derive(Default)]
struct MockCatalog {
    trending: Vec<TvListing>,
    popular: Vec<TvListing>,
    recommended: Vec<TvListing>,
    search: Vec<TvListing>,
    details: HashMap<i64, TvDetails>,
    detail_calls: Mutex<Vec<i64>>,
}

impl MockCatalog {
    fn detail_calls(&self) -> Vec<i64> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TvCatalog for MockCatalog {
    async fn trending_today(&self) -> Result<Vec<TvListing>, TmdbError> {
        Ok(self.trending.clone())
    }

    async fn popular(&self) -> Result<Vec<TvListing>, TmdbError> {
        Ok(self.popular.clone())
    }

    async fn recommendations(&self, _show_id: i64) -> Result<Vec<TvListing>, TmdbError> {
        Ok(self.recommended.clone())
    }

    async fn search(&self, _query: &str) -> Result<Vec<TvListing>, TmdbError> {
        Ok(self.search.clone())
    }

    async fn details(&self, show_id: i64) -> Result<TvDetails, TmdbError> {
        self.detail_calls.lock().unwrap().push(show_id);
        self.details.get(&show_id).cloned().ok_or(TmdbError::Api {
            status: 404,
            body: format!("show {show_id} not scripted"),
        })
    }
}

fn listing(id: i64) -> TvListing {
    TvListing {
        id,
        name: Some(format!("Show {id}")),
    }
}

fn detail(id: i64) -> TvDetails {
    TvDetails {
        id,
        name: format!("Show {id}"),
        overview: Some(format!("Overview of show {id}")),
        poster_path: Some(format!("/poster-{id}.jpg")),
        popularity: Some(10.0 + id as f64),
        vote_average: Some(7.5),
        networks: vec![Network {
            name: "AMC".to_string(),
        }],
        genres: vec![Genre {
            name: "Drama".to_string(),
        }],
        credits: Credits {
            cast: vec![],
            crew: vec![CrewMember {
                name: "Jane Doe".to_string(),
                job: "Director".to_string(),
            }],
        },
    }
}

fn stored_show(id: i64) -> Show {
    Show {
        id,
        title: format!("Show {id}"),
        description: format!("Overview of show {id}"),
        image_path: format!("{IMAGE_BASE}/poster-{id}.jpg"),
        popularity: Some(10.0 + id as f64),
        rating: Some(7.5),
        network: Some("AMC".to_string()),
        genre: "Drama".to_string(),
        actors: vec![],
        director: "Jane Doe".to_string(),
        trending: false,
        recommendations: None,
    }
}

async fn mem_store() -> Store {
    Store::with_pool_options("sqlite::memory:", 1, 1)
        .await
        .expect("failed to open in-memory store")
}

fn service(catalog: Arc<MockCatalog>, store: Store) -> IngestService {
    IngestService::new(catalog, store, IMAGE_BASE)
}

#[tokio::test]
async fn trending_cycle_fetches_details_only_for_new_shows() {
    let store = mem_store().await;
    store.insert_shows(&[stored_show(10)]).await.unwrap();

    let catalog = Arc::new(MockCatalog {
        trending: vec![listing(10), listing(20)],
        details: HashMap::from([(20, detail(20))]),
        ..Default::default()
    });
    let ingest = service(Arc::clone(&catalog), store.clone());

    let outcome = ingest.run_trending_cycle().await.unwrap();

    assert_eq!(catalog.detail_calls(), vec![20]);
    assert_eq!(outcome.existing, vec![10]);
    assert_eq!(outcome.inserted.len(), 1);
    assert_eq!(outcome.inserted[0].id, 20);

    let mut trending: Vec<i64> = store
        .trending_shows()
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    trending.sort_unstable();
    assert_eq!(trending, vec![10, 20]);

    assert_eq!(store.all_shows().await.unwrap().len(), 2);
}

#[tokio::test]
async fn trending_cycle_is_idempotent_for_unchanged_upstream() {
    let store = mem_store().await;
    let catalog = Arc::new(MockCatalog {
        trending: vec![listing(10), listing(20)],
        details: HashMap::from([(10, detail(10)), (20, detail(20))]),
        ..Default::default()
    });
    let ingest = service(Arc::clone(&catalog), store.clone());

    ingest.run_trending_cycle().await.unwrap();
    assert_eq!(catalog.detail_calls().len(), 2);

    let outcome = ingest.run_trending_cycle().await.unwrap();

    // Both IDs classify as existing the second time: no new fetches, no
    // duplicate rows, same trending set.
    assert_eq!(catalog.detail_calls().len(), 2);
    assert!(outcome.inserted.is_empty());
    assert_eq!(outcome.existing.len(), 2);
    assert_eq!(store.all_shows().await.unwrap().len(), 2);

    let mut trending: Vec<i64> = store
        .trending_shows()
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    trending.sort_unstable();
    assert_eq!(trending, vec![10, 20]);
}

#[tokio::test]
async fn trending_snapshot_drops_stale_members() {
    let store = mem_store().await;

    let mut stale = stored_show(5);
    stale.trending = true;
    store.insert_shows(&[stale]).await.unwrap();
    store.set_trending_membership(&[5]).await.unwrap();

    let catalog = Arc::new(MockCatalog {
        trending: vec![listing(20)],
        details: HashMap::from([(20, detail(20))]),
        ..Default::default()
    });
    let ingest = service(catalog, store.clone());

    ingest.run_trending_cycle().await.unwrap();

    let trending: Vec<i64> = store
        .trending_shows()
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(trending, vec![20]);
}

#[tokio::test]
async fn detail_fetcher_dedupes_requests() {
    let store = mem_store().await;
    let catalog = Arc::new(MockCatalog {
        details: HashMap::from([(7, detail(7)), (8, detail(8))]),
        ..Default::default()
    });
    let ingest = service(Arc::clone(&catalog), store);

    let details = ingest.fetch_details(&[7, 7, 8, 7]).await.unwrap();

    assert_eq!(details.len(), 2);
    assert_eq!(catalog.detail_calls(), vec![7, 8]);
}

#[tokio::test]
async fn detail_fetcher_short_circuits_on_empty_input() {
    let store = mem_store().await;
    let catalog = Arc::new(MockCatalog::default());
    let ingest = service(Arc::clone(&catalog), store);

    let details = ingest.fetch_details(&[]).await.unwrap();

    assert!(details.is_empty());
    assert!(catalog.detail_calls().is_empty());
}

#[tokio::test]
async fn one_failed_detail_fails_the_whole_batch() {
    let store = mem_store().await;
    let catalog = Arc::new(MockCatalog {
        trending: vec![listing(30), listing(31)],
        // 31 is not scripted, its detail request fails.
        details: HashMap::from([(30, detail(30))]),
        ..Default::default()
    });
    let ingest = service(catalog, store.clone());

    let err = ingest.run_trending_cycle().await.unwrap_err();
    assert!(matches!(err, IngestError::Upstream { .. }));

    // No partial writes from the aborted cycle.
    assert!(store.all_shows().await.unwrap().is_empty());
}

#[tokio::test]
async fn classifier_partitions_input_exactly() {
    let store = mem_store().await;
    store
        .insert_shows(&[stored_show(1), stored_show(2)])
        .await
        .unwrap();
    let ingest = service(Arc::new(MockCatalog::default()), store);

    let split = ingest.classify(&[2, 3, 1, 3]).await;

    assert_eq!(split.existing, vec![2, 1]);
    assert_eq!(split.new_shows, vec![3]);
}

#[tokio::test]
async fn recommended_cycle_cross_references_source_show() {
    let store = mem_store().await;
    store
        .insert_shows(&[stored_show(99), stored_show(10)])
        .await
        .unwrap();

    // 8 recommendations; only the top 6 are considered.
    let catalog = Arc::new(MockCatalog {
        recommended: (1..=8)
            .map(|n| listing(n * 10))
            .collect(),
        details: HashMap::from([
            (20, detail(20)),
            (30, detail(30)),
            (40, detail(40)),
            (50, detail(50)),
            (60, detail(60)),
        ]),
        ..Default::default()
    });
    let ingest = service(Arc::clone(&catalog), store.clone());

    let outcome = ingest.run_recommended_cycle(99).await.unwrap();

    assert_eq!(outcome.existing, vec![10]);
    assert_eq!(outcome.inserted.len(), 5);

    let source = store.get_show(99).await.unwrap().unwrap();
    assert_eq!(source.recommendations, Some(vec![10, 20, 30, 40, 50, 60]));

    // Recommendation ingestion never touches the trending snapshot.
    assert!(store.trending_shows().await.unwrap().is_empty());
}

#[tokio::test]
async fn search_cycle_truncates_and_skips_posterless_payloads() {
    let store = mem_store().await;

    let mut posterless = detail(300);
    posterless.poster_path = None;

    let catalog = Arc::new(MockCatalog {
        search: vec![
            listing(100),
            listing(200),
            listing(300),
            listing(400),
            listing(500),
            listing(600),
        ],
        details: HashMap::from([
            (100, detail(100)),
            (200, detail(200)),
            (300, posterless),
            (400, detail(400)),
            (500, detail(500)),
        ]),
        ..Default::default()
    });
    let ingest = service(Arc::clone(&catalog), store.clone());

    let outcome = ingest.run_search_cycle("breaking").await.unwrap();

    // Top 5 of 6 results fetched; the posterless payload is dropped, not an
    // error.
    assert_eq!(catalog.detail_calls().len(), 5);
    assert_eq!(outcome.inserted.len(), 4);
    assert!(outcome.inserted.iter().all(|s| s.id != 300));
    assert_eq!(store.all_shows().await.unwrap().len(), 4);
    assert!(store.trending_shows().await.unwrap().is_empty());
}

#[tokio::test]
async fn reingesting_an_id_updates_instead_of_duplicating() {
    let store = mem_store().await;

    let mut first = stored_show(77);
    first.title = "Old Title".to_string();
    store.insert_shows(&[first]).await.unwrap();

    store.insert_shows(&[stored_show(77)]).await.unwrap();

    let shows = store.all_shows().await.unwrap();
    assert_eq!(shows.len(), 1);
    assert_eq!(shows[0].title, "Show 77");
}

#[tokio::test]
async fn demo_favorites_reset_only_touches_demo_accounts() {
    let store = mem_store().await;

    store.ensure_user("demo", true).await.unwrap();
    store.ensure_user("alice", false).await.unwrap();
    store.add_favorite("demo", 10).await.unwrap();
    store.add_favorite("demo", 20).await.unwrap();
    store.add_favorite("alice", 10).await.unwrap();

    assert!(store.reset_demo_favorites("demo").await.unwrap());
    assert!(store.user_favorites("demo").await.unwrap().is_empty());

    assert!(!store.reset_demo_favorites("alice").await.unwrap());
    assert_eq!(store.user_favorites("alice").await.unwrap(), vec![10]);
}
