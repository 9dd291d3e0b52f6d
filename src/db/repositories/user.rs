use crate::entities::{prelude::*, users};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Creates the account with empty favorites if it does not exist yet.
    pub async fn ensure_user(&self, username: &str, is_demo: bool) -> anyhow::Result<()> {
        let existing = Users::find_by_id(username).one(&self.conn).await?;
        if existing.is_some() {
            return Ok(());
        }

        let model = users::ActiveModel {
            username: Set(username.to_string()),
            favorites: Set("[]".to_string()),
            is_demo: Set(is_demo),
            created_at: Set(Some(chrono::Utc::now().to_rfc3339())),
        };
        Users::insert(model).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn favorites(&self, username: &str) -> anyhow::Result<Vec<i64>> {
        let user = Users::find_by_id(username).one(&self.conn).await?;
        Ok(user
            .map(|u| serde_json::from_str(&u.favorites).unwrap_or_default())
            .unwrap_or_default())
    }

    /// Adds a show to the account's favorites, set semantics.
    pub async fn add_favorite(&self, username: &str, show_id: i64) -> anyhow::Result<()> {
        let Some(user) = Users::find_by_id(username).one(&self.conn).await? else {
            anyhow::bail!("user '{username}' not found");
        };

        let mut favorites: Vec<i64> = serde_json::from_str(&user.favorites).unwrap_or_default();
        if !favorites.contains(&show_id) {
            favorites.push(show_id);
        }

        let mut model: users::ActiveModel = user.into();
        model.favorites = Set(serde_json::to_string(&favorites)?);
        Users::update(model).exec(&self.conn).await?;
        Ok(())
    }

    /// Wipes the favorites of a demo account. Returns false when no demo
    /// account matched.
    pub async fn reset_demo_favorites(&self, username: &str) -> anyhow::Result<bool> {
        let result = Users::update_many()
            .col_expr(
                users::Column::Favorites,
                sea_orm::sea_query::Expr::value("[]"),
            )
            .filter(users::Column::Username.eq(username))
            .filter(users::Column::IsDemo.eq(true))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
