//! Job executor.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use webmux_models::{JobAnnouncement, JobId};
use webmux_queue::{AnnouncementStream, NotificationBus};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::lifecycle::JobPipeline;
use crate::metrics;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Ids of jobs currently owned by this process.
#[derive(Clone, Default)]
struct InFlight(Arc<Mutex<HashSet<JobId>>>);

impl InFlight {
    /// Claim `job_id`; `None` when it is already being processed.
    fn claim(&self, job_id: &JobId) -> Option<InFlightGuard> {
        let mut ids = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(job_id.clone()) {
            return None;
        }
        metrics::set_jobs_in_flight(ids.len());
        Some(InFlightGuard {
            set: self.clone(),
            job_id: job_id.clone(),
        })
    }

    fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Releases the claim on drop, including when the job task panics.
struct InFlightGuard {
    set: InFlight,
    job_id: JobId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.set.0.lock().unwrap_or_else(|e| e.into_inner());
        ids.remove(&self.job_id);
        metrics::set_jobs_in_flight(ids.len());
    }
}

/// Consumes job announcements and runs each job on its own task.
///
/// At most `max_concurrent_jobs` jobs run at once; further announcements
/// wait for a permit.
pub struct JobExecutor {
    config: WorkerConfig,
    channel: String,
    bus: Arc<dyn NotificationBus>,
    pipeline: Arc<JobPipeline>,
    job_semaphore: Arc<Semaphore>,
    in_flight: InFlight,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(
        config: WorkerConfig,
        channel: impl Into<String>,
        bus: Arc<dyn NotificationBus>,
        pipeline: JobPipeline,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            channel: channel.into(),
            bus,
            pipeline: Arc::new(pipeline),
            job_semaphore,
            in_flight: InFlight::default(),
            shutdown,
        }
    }

    /// Run until `shutdown` is called, then drain in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            channel = %self.channel,
            "Starting job executor with {} max concurrent jobs",
            self.config.max_concurrent_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut backoff = INITIAL_BACKOFF;

        'subscriptions: while !*shutdown_rx.borrow() {
            let subscribed = tokio::select! {
                _ = shutdown_rx.changed() => break 'subscriptions,
                result = self.bus.subscribe(&self.channel) => result,
            };

            match subscribed {
                Ok(stream) => {
                    backoff = INITIAL_BACKOFF;
                    if self.consume(stream, &mut shutdown_rx).await? {
                        break 'subscriptions;
                    }
                    warn!(channel = %self.channel, "Announcement stream ended, resubscribing");
                }
                Err(e) => {
                    error!(channel = %self.channel, "Failed to subscribe: {}", e);
                }
            }

            metrics::record_resubscribe();
            tokio::select! {
                _ = shutdown_rx.changed() => break 'subscriptions,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.resubscribe_max_backoff);
        }

        info!("Waiting for {} in-flight jobs to complete...", self.in_flight.len());
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "Shutdown timeout reached with {} jobs still running",
                self.in_flight.len()
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Drain one subscription. Returns `true` when stopped by shutdown.
    async fn consume(
        &self,
        mut stream: AnnouncementStream,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> WorkerResult<bool> {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping executor");
                    return Ok(true);
                }
                next = stream.next() => match next {
                    Some(announcement) => self.dispatch(announcement).await?,
                    None => return Ok(false),
                },
            }
        }
    }

    /// Spawn a task for one announcement once a permit is free.
    pub async fn dispatch(&self, announcement: JobAnnouncement) -> WorkerResult<()> {
        let Some(guard) = self.in_flight.claim(&announcement.job_id) else {
            debug!(job_id = %announcement.job_id, "Job already in flight, ignoring duplicate announcement");
            return Ok(());
        };

        let permit = self
            .job_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::config_error("job semaphore closed"))?;

        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            let outcome = pipeline.process(&announcement).await;
            debug!(job_id = %announcement.job_id, ?outcome, "Job finished");
        });

        Ok(())
    }

    /// Wait for all in-flight jobs to complete.
    pub async fn wait_for_jobs(&self) {
        loop {
            let available = self.job_semaphore.available_permits();
            if available == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
