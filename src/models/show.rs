use serde::Serialize;

/// A normalized TV show as produced by the ingest pipeline.
///
/// Repositories handle the mapping to and from the persisted row, where the
/// list fields are stored as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Show {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_path: String,
    pub popularity: Option<f64>,
    pub rating: Option<f64>,
    pub network: Option<String>,
    pub genre: String,
    /// Up to 3 principal cast names, in billing order.
    pub actors: Vec<String>,
    pub director: String,
    pub trending: bool,
    pub recommendations: Option<Vec<i64>>,
}
