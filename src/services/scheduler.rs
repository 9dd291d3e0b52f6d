use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::{DemoConfig, SchedulerConfig};
use crate::db::Store;
use crate::services::IngestService;

/// Drives the recurring jobs: the catalog ingest (trending then popular
/// cycles) and the demo account favorites reset. The two run on independent
/// cadences and nothing serializes overlapping runs; the store's idempotent
/// writes keep concurrent cycles convergent.
pub struct Scheduler {
    ingest: Arc<IngestService>,
    store: Store,
    config: SchedulerConfig,
    demo: DemoConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    pub fn new(
        ingest: Arc<IngestService>,
        store: Store,
        config: SchedulerConfig,
        demo: DemoConfig,
    ) -> Self {
        Self {
            ingest,
            store,
            config,
            demo,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        if let Some(cron_expr) = &self.config.cron_expression {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let ingest_for_job = Arc::clone(&self.ingest);
        let running = Arc::clone(&self.running);
        let ingest_job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let ingest = Arc::clone(&ingest_for_job);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                run_ingest_job(&ingest).await;
            })
        })?;
        sched.add(ingest_job).await?;

        info!("Scheduler running with cron: {}", cron_expr);

        if self.demo.enabled {
            let reset_hours = self.config.demo_reset_interval_hours.max(1);
            let reset_cron = if reset_hours >= 24 {
                // Run once a day at midnight if >= 24 hours
                "0 0 0 * * *".to_string()
            } else {
                format!("0 0 */{reset_hours} * * *")
            };

            let store = self.store.clone();
            let username = self.demo.username.clone();
            let reset_job = Job::new_async(&reset_cron, move |_uuid, _lock| {
                let store = store.clone();
                let username = username.clone();
                Box::pin(async move {
                    run_demo_reset_job(&store, &username).await;
                })
            })?;
            sched.add(reset_job).await?;

            info!("Demo favorites reset scheduled: {}", reset_cron);
        }

        sched.start().await?;

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let ingest_hours = self.config.ingest_interval_hours.max(1);
        let reset_hours = self.config.demo_reset_interval_hours.max(1);

        info!(
            "Scheduler running: Ingest every {}h, Demo reset every {}h",
            ingest_hours, reset_hours
        );

        let mut ingest_interval = interval(Duration::from_secs(u64::from(ingest_hours) * 60 * 60));

        let mut reset_interval = interval(Duration::from_secs(u64::from(reset_hours) * 60 * 60));

        loop {
            tokio::select! {
                _ = ingest_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    run_ingest_job(&self.ingest).await;
                }
                _ = reset_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    if self.demo.enabled {
                        run_demo_reset_job(&self.store, &self.demo.username).await;
                    }
                }
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn run_once(&self) -> Result<()> {
        info!("Running manual ingest...");

        self.ingest.run_trending_cycle().await?;
        self.ingest.run_popular_cycle().await?;

        if self.demo.enabled {
            self.store.reset_demo_favorites(&self.demo.username).await?;
        }

        Ok(())
    }
}

async fn run_ingest_job(ingest: &IngestService) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = "ingest_catalog", "Starting scheduled catalog ingest");

    if let Err(e) = ingest.run_trending_cycle().await {
        error!(event = "job_failed", job_name = "ingest_trending", error = %e, "Scheduled trending cycle failed");
    }

    if let Err(e) = ingest.run_popular_cycle().await {
        error!(event = "job_failed", job_name = "ingest_popular", error = %e, "Scheduled popular cycle failed");
    }

    info!(
        event = "job_finished",
        job_name = "ingest_catalog",
        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Scheduled catalog ingest finished"
    );
}

async fn run_demo_reset_job(store: &Store, username: &str) {
    match store.reset_demo_favorites(username).await {
        Ok(true) => info!(event = "job_finished", job_name = "demo_reset", username, "Demo favorites reset"),
        Ok(false) => info!(event = "job_finished", job_name = "demo_reset", username, "No demo account to reset"),
        Err(e) => error!(event = "job_failed", job_name = "demo_reset", error = %e, "Demo favorites reset failed"),
    }
}
