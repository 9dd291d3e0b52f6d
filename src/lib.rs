pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod models;
pub mod services;

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use clients::{TmdbClient, TvCatalog};
pub use config::Config;
use db::Store;
use services::{CycleOutcome, IngestService, Scheduler};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Daemon) | None => {
            config.validate()?;
            run_daemon(config).await
        }

        Some(Commands::Ingest) => {
            config.validate()?;
            run_single_ingest(&config).await
        }

        Some(Commands::Trending) => {
            config.validate()?;
            let (_, ingest) = build_ingest(&config).await?;
            print_outcome(&ingest.run_trending_cycle().await?)
        }

        Some(Commands::Popular) => {
            config.validate()?;
            let (_, ingest) = build_ingest(&config).await?;
            print_outcome(&ingest.run_popular_cycle().await?)
        }

        Some(Commands::Recommend { id }) => {
            config.validate()?;
            let (_, ingest) = build_ingest(&config).await?;
            print_outcome(&ingest.run_recommended_cycle(id).await?)
        }

        Some(Commands::Search { query }) => {
            config.validate()?;
            let query = query.join(" ");
            let (_, ingest) = build_ingest(&config).await?;
            print_outcome(&ingest.run_search_cycle(&query).await?)
        }

        Some(Commands::List) => cmd_list(&config).await,
    }
}

async fn build_ingest(config: &Config) -> anyhow::Result<(Store, Arc<IngestService>)> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let catalog: Arc<dyn TvCatalog> = Arc::new(TmdbClient::new(&config.tmdb)?);
    let ingest = Arc::new(IngestService::new(
        catalog,
        store.clone(),
        config.tmdb.image_base_url.clone(),
    ));

    Ok((store, ingest))
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    info!(
        "trendarr v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let (store, ingest) = build_ingest(&config).await?;

    if config.demo.enabled {
        store.ensure_user(&config.demo.username, true).await?;
    }

    let scheduler = Arc::new(Scheduler::new(
        ingest,
        store,
        config.scheduler.clone(),
        config.demo.clone(),
    ));

    let scheduler_handle = {
        let sched = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = sched.start().await {
                error!("Scheduler error: {}", e);
            }
        })
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    scheduler.stop().await;
    scheduler_handle.abort();
    info!("Daemon stopped");

    Ok(())
}

async fn run_single_ingest(config: &Config) -> anyhow::Result<()> {
    let (store, ingest) = build_ingest(config).await?;

    let trending = ingest.run_trending_cycle().await?;
    println!(
        "trending: {} existing, {} inserted",
        trending.existing.len(),
        trending.inserted.len()
    );

    let popular = ingest.run_popular_cycle().await?;
    println!(
        "popular: {} existing, {} inserted",
        popular.existing.len(),
        popular.inserted.len()
    );

    if config.demo.enabled && store.reset_demo_favorites(&config.demo.username).await? {
        println!("demo favorites reset for '{}'", config.demo.username);
    }

    Ok(())
}

async fn cmd_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let shows = store.all_shows().await?;
    if shows.is_empty() {
        println!("No shows stored yet. Run 'trendarr ingest' first.");
        return Ok(());
    }

    for show in &shows {
        let marker = if show.trending { "*" } else { " " };
        println!("{} {:>8}  {}", marker, show.id, show.title);
    }
    println!("{} shows ({} trending)", shows.len(), shows.iter().filter(|s| s.trending).count());

    Ok(())
}

fn print_outcome(outcome: &CycleOutcome) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}
