//! Collector registry for scheduling collection windows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::collector::{CollectorError, Schedule, Transport, WindowedCollector};
use crate::storage::{RecordStore, WindowRecord, save_record};

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Metadata about a registered job.
#[derive(Debug, Clone)]
pub struct JobInfo {
    /// Job UUID.
    pub id: uuid::Uuid,
    /// Tracked site identifier.
    pub name: String,
    /// Schedule description.
    pub schedule: String,
}

/// Registry for running collection windows on a schedule.
///
/// Uses `tokio-cron-scheduler` for job scheduling. Every window gets a child
/// of the registry's cancellation token, so shutdown stops in-flight windows
/// instead of waiting them out.
pub struct CollectorRegistry {
    scheduler: JobScheduler,
    jobs: Arc<RwLock<HashMap<uuid::Uuid, JobInfo>>>,
    store: Arc<dyn RecordStore>,
    prefix: String,
    cancel: CancellationToken,
}

impl CollectorRegistry {
    /// Create a new collector registry writing records under `prefix`.
    pub async fn new(
        store: Arc<dyn RecordStore>,
        prefix: impl Into<String>,
    ) -> Result<Self, CollectorError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;

        Ok(Self {
            scheduler,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            store,
            prefix: prefix.into(),
            cancel: CancellationToken::new(),
        })
    }

    /// Token cancelled when the registry shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field(
                "job_count",
                &self.jobs.try_read().map(|j| j.len()).unwrap_or(0),
            )
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl CollectorRegistry {
    /// Register a collector to run one window per schedule tick.
    pub async fn spawn<T: Transport>(
        &self,
        collector: WindowedCollector<T>,
        schedule: Schedule,
    ) -> Result<uuid::Uuid, CollectorError> {
        let name = collector.config().target_uid.clone();
        let schedule_desc = schedule.to_string();

        let job = self.create_job(Arc::new(collector), &name, &schedule)?;
        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;

        self.jobs.write().await.insert(
            job_id,
            JobInfo {
                id: job_id,
                name: name.clone(),
                schedule: schedule_desc.clone(),
            },
        );

        tracing::info!(collector = %name, job_id = %job_id, schedule = %schedule_desc, "Collector registered");
        Ok(job_id)
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), CollectorError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;
        tracing::info!("Collector scheduler started");
        Ok(())
    }

    /// List all registered jobs.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        self.jobs.read().await.values().cloned().collect()
    }

    /// Get the number of registered jobs.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Gracefully shutdown the scheduler with default timeout.
    pub async fn shutdown(self) -> Result<(), CollectorError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown with custom timeout.
    ///
    /// In-flight windows are cancelled first; their cycles end with
    /// [`CollectorError::Cancelled`] and store nothing.
    pub async fn shutdown_with_timeout(mut self, timeout: Duration) -> Result<(), CollectorError> {
        self.cancel.cancel();

        let job_count = self.jobs.read().await.len();
        let shutdown_result = tokio::time::timeout(timeout, async {
            self.scheduler
                .shutdown()
                .await
                .map_err(|e| CollectorError::Scheduler(e.to_string()))
        })
        .await;

        match shutdown_result {
            Ok(Ok(())) => {
                tracing::info!(job_count, "Collector scheduler shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(job_count, error = %e, "Collector scheduler shutdown failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(job_count, "Collector scheduler shutdown timed out");
                Ok(())
            }
        }
    }

    /// Remove a specific collector job by ID.
    pub async fn remove(&self, job_id: &uuid::Uuid) -> Result<(), CollectorError> {
        self.scheduler
            .remove(job_id)
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;

        let removed = self.jobs.write().await.remove(job_id);
        tracing::info!(job_id = %job_id, collector = ?removed.map(|j| j.name), "Collector removed");
        Ok(())
    }

    // --- Private helpers ---

    fn create_job<T: Transport>(
        &self,
        collector: Arc<WindowedCollector<T>>,
        name: &str,
        schedule: &Schedule,
    ) -> Result<Job, CollectorError> {
        let name = name.to_owned();
        let store = Arc::clone(&self.store);
        let prefix = self.prefix.clone();
        let cancel = self.cancel.clone();

        let callback = move |_: uuid::Uuid, _: JobScheduler| {
            let (collector, store, prefix, name) = (
                Arc::clone(&collector),
                Arc::clone(&store),
                prefix.clone(),
                name.clone(),
            );
            let cancel = cancel.child_token();
            Box::pin(async move {
                let start = std::time::Instant::now();
                match run_cycle(&collector, store.as_ref(), &prefix, &cancel).await {
                    Ok(Some(key)) => {
                        tracing::info!(collector = %name, key = %key, duration_ms = start.elapsed().as_millis(), "Window stored");
                    }
                    Ok(None) => {
                        tracing::debug!(collector = %name, "Window produced no record");
                    }
                    Err(CollectorError::Cancelled) => {
                        tracing::info!(collector = %name, "Window cancelled by shutdown");
                    }
                    Err(e) => {
                        tracing::error!(collector = %name, error = %e, "Collection failed");
                    }
                }
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        };

        match schedule {
            Schedule::Interval(d) => Job::new_repeated_async(*d, callback),
            Schedule::Cron(expr) => Job::new_cron_job_async(expr.as_str(), callback),
        }
        .map_err(|e| CollectorError::Scheduler(e.to_string()))
    }
}

/// Run one window, then summarize and persist it.
///
/// Returns the stored key, or `None` if the window collected no readings.
pub async fn run_cycle<T: Transport>(
    collector: &WindowedCollector<T>,
    store: &dyn RecordStore,
    prefix: &str,
    cancel: &CancellationToken,
) -> Result<Option<String>, CollectorError> {
    let result = collector.collect(cancel).await?;

    let Some(record) = WindowRecord::from_result(&result) else {
        tracing::warn!(site = %result.window.target_id, "No updates received in window; nothing stored");
        return Ok(None);
    };

    let key = save_record(store, prefix, &record).await?;
    let stats = &record.statistics;
    tracing::info!(
        key = %key,
        count = stats.count,
        min = stats.min,
        max = stats.max,
        avg = %format_args!("{:.1}", stats.mean),
        median = stats.median,
        "Window summary saved"
    );
    Ok(Some(key))
}
