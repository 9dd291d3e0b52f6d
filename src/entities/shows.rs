use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "shows")]
pub struct Model {
    /// TMDB show ID, the natural key against the provider.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    pub title: String,

    /// "N/A" when the provider supplied no overview.
    pub description: String,

    pub image_path: String,

    pub popularity: Option<f64>,

    pub rating: Option<f64>,

    pub network: Option<String>,

    pub genre: String,

    /// JSON array of up to 3 principal cast names, in billing order.
    pub actors: String,

    pub director: String,

    /// Membership in the most recent trending/popular cycle result set.
    pub trending: bool,

    /// JSON array of show IDs written by the recommended cycle.
    pub recommendations: Option<String>,

    pub created_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
