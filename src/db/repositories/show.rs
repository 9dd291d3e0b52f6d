use crate::entities::{prelude::*, shows};
use crate::models::Show;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
};
use std::collections::HashSet;

pub struct ShowRepository {
    conn: DatabaseConnection,
}

impl ShowRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model_to_show(model: shows::Model) -> Show {
        Show {
            id: model.id,
            title: model.title,
            description: model.description,
            image_path: model.image_path,
            popularity: model.popularity,
            rating: model.rating,
            network: model.network,
            genre: model.genre,
            actors: serde_json::from_str(&model.actors).unwrap_or_default(),
            director: model.director,
            trending: model.trending,
            recommendations: model
                .recommendations
                .and_then(|r| serde_json::from_str(&r).ok()),
        }
    }

    fn map_show_to_active_model(show: &Show) -> shows::ActiveModel {
        shows::ActiveModel {
            id: Set(show.id),
            title: Set(show.title.clone()),
            description: Set(show.description.clone()),
            image_path: Set(show.image_path.clone()),
            popularity: Set(show.popularity),
            rating: Set(show.rating),
            network: Set(show.network.clone()),
            genre: Set(show.genre.clone()),
            actors: Set(serde_json::to_string(&show.actors).unwrap_or_else(|_| "[]".to_string())),
            director: Set(show.director.clone()),
            trending: Set(show.trending),
            recommendations: Set(show
                .recommendations
                .as_ref()
                .and_then(|r| serde_json::to_string(r).ok())),
            created_at: Set(Some(chrono::Utc::now().to_rfc3339())),
        }
    }

    /// Returns the subset of `ids` already persisted, as one membership query.
    pub async fn known_ids(&self, ids: &[i64]) -> anyhow::Result<HashSet<i64>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<i64> = Shows::find()
            .select_only()
            .column(shows::Column::Id)
            .filter(shows::Column::Id.is_in(ids.to_vec()))
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().collect())
    }

    /// Bulk upsert keyed on the external ID. A duplicate insert updates the
    /// row in place instead of failing, which keeps degraded existence checks
    /// harmless.
    pub async fn insert_many(&self, shows_to_add: &[Show]) -> anyhow::Result<()> {
        if shows_to_add.is_empty() {
            return Ok(());
        }

        let models: Vec<shows::ActiveModel> =
            shows_to_add.iter().map(Self::map_show_to_active_model).collect();

        Shows::insert_many(models)
            .on_conflict(
                OnConflict::column(shows::Column::Id)
                    .update_columns([
                        shows::Column::Title,
                        shows::Column::Description,
                        shows::Column::ImagePath,
                        shows::Column::Popularity,
                        shows::Column::Rating,
                        shows::Column::Network,
                        shows::Column::Genre,
                        shows::Column::Actors,
                        shows::Column::Director,
                        shows::Column::Trending,
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;

        Ok(())
    }

    /// One server-side conditional update: `trending = id IN (members)`.
    /// Replaces a clear-then-set two-step so a concurrent reader never sees
    /// an empty trending view. An empty member set clears every flag.
    pub async fn set_trending_membership(&self, members: &[i64]) -> anyhow::Result<u64> {
        let membership = Expr::col(shows::Column::Id).is_in(members.to_vec());

        let result = Shows::update_many()
            .col_expr(shows::Column::Trending, membership.into())
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }

    /// Writes the recommended-IDs cross-reference onto the source show.
    pub async fn set_recommendations(&self, source_id: i64, ids: &[i64]) -> anyhow::Result<()> {
        let payload = serde_json::to_string(ids)?;

        Shows::update_many()
            .col_expr(shows::Column::Recommendations, Expr::value(payload))
            .filter(shows::Column::Id.eq(source_id))
            .exec(&self.conn)
            .await?;

        Ok(())
    }

    pub async fn get(&self, id: i64) -> anyhow::Result<Option<Show>> {
        let model = Shows::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(Self::map_model_to_show))
    }

    pub async fn all(&self) -> anyhow::Result<Vec<Show>> {
        let models = Shows::find().all(&self.conn).await?;
        Ok(models.into_iter().map(Self::map_model_to_show).collect())
    }

    pub async fn trending(&self) -> anyhow::Result<Vec<Show>> {
        let models = Shows::find()
            .filter(shows::Column::Trending.eq(true))
            .all(&self.conn)
            .await?;
        Ok(models.into_iter().map(Self::map_model_to_show).collect())
    }
}
