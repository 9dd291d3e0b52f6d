use crate::models::Show;
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

use repositories::show::ShowRepository;
use repositories::user::UserRepository;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn show_repo(&self) -> ShowRepository {
        ShowRepository::new(self.conn.clone())
    }

    fn user_repo(&self) -> UserRepository {
        UserRepository::new(self.conn.clone())
    }

    pub async fn known_show_ids(&self, ids: &[i64]) -> Result<HashSet<i64>> {
        self.show_repo().known_ids(ids).await
    }

    pub async fn insert_shows(&self, shows: &[Show]) -> Result<()> {
        self.show_repo().insert_many(shows).await
    }

    pub async fn set_trending_membership(&self, members: &[i64]) -> Result<u64> {
        self.show_repo().set_trending_membership(members).await
    }

    pub async fn set_show_recommendations(&self, source_id: i64, ids: &[i64]) -> Result<()> {
        self.show_repo().set_recommendations(source_id, ids).await
    }

    pub async fn get_show(&self, id: i64) -> Result<Option<Show>> {
        self.show_repo().get(id).await
    }

    pub async fn all_shows(&self) -> Result<Vec<Show>> {
        self.show_repo().all().await
    }

    pub async fn trending_shows(&self) -> Result<Vec<Show>> {
        self.show_repo().trending().await
    }

    pub async fn ensure_user(&self, username: &str, is_demo: bool) -> Result<()> {
        self.user_repo().ensure_user(username, is_demo).await
    }

    pub async fn user_favorites(&self, username: &str) -> Result<Vec<i64>> {
        self.user_repo().favorites(username).await
    }

    pub async fn add_favorite(&self, username: &str, show_id: i64) -> Result<()> {
        self.user_repo().add_favorite(username, show_id).await
    }

    pub async fn reset_demo_favorites(&self, username: &str) -> Result<bool> {
        self.user_repo().reset_demo_favorites(username).await
    }
}
