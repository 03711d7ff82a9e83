//! Job lifecycle controller.
//!
//! Drives one announced job through
//! `processing -> {completed, failed}`:
//!
//! 1. reload the record and mark it `processing`
//! 2. create the scratch directory `{root}/{jobId}`
//! 3. resolve the WebM stream pair
//! 4. download audio and video concurrently
//! 5. remux into scratch and move the result to `outputs/`
//! 6. mark `completed` with `outputPath` and `filename`
//!
//! A failure in steps 2-5 marks the job `failed`. The scratch directory is
//! removed whatever the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use webmux_locator::MediaLocator;
use webmux_media::{move_file, Muxer, StreamRetriever};
use webmux_models::{
    output_relative_path, user_filename, Job, JobAnnouncement, JobId, JobPatch, JobStatus,
    VideoId,
};
use webmux_queue::{JobStore, StatusUpdate};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::scratch::{
    is_valid_scratch_name, ScratchDir, StorageLayout, AUDIO_FILE, MERGED_FILE, VIDEO_FILE,
};

/// Why a job was not processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No record exists for the announced id.
    Missing,
    /// The record already reached a terminal status.
    Terminal(JobStatus),
}

impl SkipReason {
    fn label(&self) -> &'static str {
        match self {
            SkipReason::Missing => "missing",
            SkipReason::Terminal(_) => "terminal",
        }
    }
}

/// Final result of processing one announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { output_path: String, filename: String },
    Failed {
        /// Stage label of the error (`scratch`, `resolve`, `download`, ...)
        stage: &'static str,
        error: String,
    },
    Skipped(SkipReason),
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// Output of a successful pipeline run, before it is recorded.
struct Produced {
    /// Absolute location of the output file
    location: PathBuf,
    /// `outputPath` as recorded, relative to the mount root
    output_path: String,
    filename: String,
}

/// Collaborators and layout shared by every job.
#[derive(Clone)]
pub struct JobPipeline {
    store: Arc<dyn JobStore>,
    locator: Arc<dyn MediaLocator>,
    retriever: Arc<dyn StreamRetriever>,
    muxer: Arc<dyn Muxer>,
    layout: StorageLayout,
}

impl JobPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        locator: Arc<dyn MediaLocator>,
        retriever: Arc<dyn StreamRetriever>,
        muxer: Arc<dyn Muxer>,
        layout: StorageLayout,
    ) -> Self {
        Self {
            store,
            locator,
            retriever,
            muxer,
            layout,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Process one announcement to a terminal outcome.
    ///
    /// Never returns an error: every failure is recorded on the job (when
    /// the store allows it) and reported through `JobOutcome`.
    pub async fn process(&self, announcement: &JobAnnouncement) -> JobOutcome {
        let logger = JobLogger::new(&announcement.job_id, &announcement.video_id);
        let span = logger.create_span();
        self.process_inner(announcement, &logger)
            .instrument(span)
            .await
    }

    async fn process_inner(&self, announcement: &JobAnnouncement, logger: &JobLogger) -> JobOutcome {
        let job_id = &announcement.job_id;

        let job = match self.claim(job_id).await {
            Ok(Ok(job)) => job,
            Ok(Err(reason)) => {
                logger.log_skip(match &reason {
                    SkipReason::Missing => "record not found",
                    SkipReason::Terminal(_) => "record already terminal",
                });
                metrics::record_job_skipped(reason.label());
                return JobOutcome::Skipped(reason);
            }
            Err(e) => return self.fail(job_id, logger, e).await,
        };

        logger.log_start();
        metrics::record_job_started();
        let started = Instant::now();

        // Announcements are not authoritative; the stored video id wins.
        let video_id = job.video_id.clone();

        if !is_valid_scratch_name(job_id.as_str()) {
            let err = WorkerError::scratch_setup(format!(
                "job id {:?} cannot name a scratch directory",
                job_id.as_str()
            ));
            return self.fail(job_id, logger, err).await;
        }

        let scratch_path = self.layout.scratch_dir(job_id);
        let scratch = match ScratchDir::create(&scratch_path).await {
            Ok(scratch) => scratch,
            Err(e) => {
                webmux_media::remove_dir_best_effort(&scratch_path).await;
                let err = WorkerError::scratch_setup(format!("{}: {}", scratch_path.display(), e));
                return self.fail(job_id, logger, err).await;
            }
        };

        let result = self.run_stages(job_id, &video_id, &scratch, logger).await;

        let outcome = match result {
            Ok(produced) => self.complete(job_id, logger, produced, started).await,
            Err(e) => self.fail(job_id, logger, e).await,
        };

        if !scratch.cleanup().await {
            logger.log_warning("scratch directory could not be fully removed");
        }

        outcome
    }

    /// Load the record and move it to `processing`.
    async fn claim(&self, job_id: &JobId) -> WorkerResult<Result<Job, SkipReason>> {
        match self.store.get(job_id).await? {
            None => return Ok(Err(SkipReason::Missing)),
            Some(job) if job.is_terminal() => return Ok(Err(SkipReason::Terminal(job.status))),
            Some(_) => {}
        }

        match self
            .store
            .update_status(job_id, JobStatus::Processing, JobPatch::empty())
            .await?
        {
            StatusUpdate::Applied(job) => Ok(Ok(job)),
            StatusUpdate::Missing => Ok(Err(SkipReason::Missing)),
            StatusUpdate::Rejected(job) => Ok(Err(SkipReason::Terminal(job.status))),
        }
    }

    async fn run_stages(
        &self,
        job_id: &JobId,
        video_id: &VideoId,
        scratch: &ScratchDir,
        logger: &JobLogger,
    ) -> WorkerResult<Produced> {
        logger.log_stage("resolve", "Resolving stream URLs");
        let stage = Instant::now();
        let media = self.locator.resolve(video_id).await?;
        metrics::record_stage_duration("resolve", stage.elapsed().as_secs_f64());

        logger.log_stage("download", "Downloading audio and video");
        let stage = Instant::now();
        let audio_path = scratch.file(AUDIO_FILE);
        let video_path = scratch.file(VIDEO_FILE);

        let (audio_bytes, video_bytes) = tokio::try_join!(
            async {
                self.retriever
                    .fetch(&media.audio_url, &audio_path)
                    .await
                    .map_err(|e| WorkerError::retrieval("audio", e))
            },
            async {
                self.retriever
                    .fetch(&media.video_url, &video_path)
                    .await
                    .map_err(|e| WorkerError::retrieval("video", e))
            },
        )?;
        metrics::record_stage_duration("download", stage.elapsed().as_secs_f64());
        metrics::record_download_bytes("audio", audio_bytes);
        metrics::record_download_bytes("video", video_bytes);

        logger.log_stage("mux", "Combining streams");
        let stage = Instant::now();
        let merged = scratch.file(MERGED_FILE);
        self.muxer
            .mux(&video_path, &audio_path, &merged)
            .await
            .map_err(WorkerError::Mux)?;

        let location = self.layout.output_path(job_id, video_id);
        move_file(&merged, &location).await.map_err(WorkerError::Mux)?;
        metrics::record_stage_duration("mux", stage.elapsed().as_secs_f64());

        Ok(Produced {
            location,
            output_path: output_relative_path(job_id, video_id),
            filename: user_filename(&media.title, video_id),
        })
    }

    async fn complete(
        &self,
        job_id: &JobId,
        logger: &JobLogger,
        produced: Produced,
        started: Instant,
    ) -> JobOutcome {
        let patch = JobPatch::completed(produced.output_path.clone(), produced.filename.clone());

        match self
            .store
            .update_status(job_id, JobStatus::Completed, patch)
            .await
        {
            Ok(StatusUpdate::Applied(_)) => {
                logger.log_completion(&produced.filename, started.elapsed().as_secs_f64());
                metrics::record_job_completed();
                JobOutcome::Completed {
                    output_path: produced.output_path,
                    filename: produced.filename,
                }
            }
            Ok(StatusUpdate::Missing) => {
                logger.log_warning("record removed while processing; discarding output");
                discard_output(&produced.location).await;
                metrics::record_job_skipped(SkipReason::Missing.label());
                JobOutcome::Skipped(SkipReason::Missing)
            }
            Ok(StatusUpdate::Rejected(job)) => {
                logger.log_warning("record became terminal while processing; discarding output");
                discard_output(&produced.location).await;
                let reason = SkipReason::Terminal(job.status);
                metrics::record_job_skipped(reason.label());
                JobOutcome::Skipped(reason)
            }
            Err(e) => {
                discard_output(&produced.location).await;
                self.fail(job_id, logger, WorkerError::Store(e)).await
            }
        }
    }

    /// Record a failure. Store errors here are logged and otherwise ignored.
    async fn fail(&self, job_id: &JobId, logger: &JobLogger, err: WorkerError) -> JobOutcome {
        let message = err.to_string();
        let stage = err.stage();
        logger.log_failure(stage, &message);
        metrics::record_job_failed(stage);

        match self
            .store
            .update_status(job_id, JobStatus::Failed, JobPatch::failed(message.clone()))
            .await
        {
            Ok(StatusUpdate::Applied(_)) | Ok(StatusUpdate::Missing) => {}
            Ok(StatusUpdate::Rejected(job)) => {
                logger.log_warning(&format!("failure not recorded, record is {}", job.status));
            }
            Err(e) => logger.log_warning(&format!("failed to record failure: {}", e)),
        }

        JobOutcome::Failed {
            stage,
            error: message,
        }
    }
}

async fn discard_output(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Failed to remove orphaned output {}: {}", path.display(), e);
    }
}
