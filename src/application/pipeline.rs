//! Upload -> frames -> archive -> remote store, with the status state machine.

use crate::application::cleanup::{CleanupHandle, CleanupJob};
use crate::domain::archive::Archiver;
use crate::domain::frames::{FrameExtractor, DEFAULT_INTERVAL_SECONDS};
use crate::domain::validation::{FileValidator, ValidationError};
use crate::domain::video::{VideoRecord, VideoStatus, VideoSummary};
use crate::domain::workspace::RunWorkspace;
use crate::ports::command::{CommandRunner, ToolError};
use crate::ports::repository::{RepositoryError, VideoRepository};
use crate::ports::storage::{ByteStream, RemoteStore, StorageError};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::{error, info, instrument, warn};

/// Steps a single run goes through. Only used for logging; the durable
/// status is `VideoStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Processing,
    ExtractingFrames,
    Archiving,
    Uploading,
    Ready,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Processing => "processing",
            PipelineStage::ExtractingFrames => "extracting_frames",
            PipelineStage::Archiving => "archiving",
            PipelineStage::Uploading => "uploading",
            PipelineStage::Ready => "ready",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("frame extraction failed: {0}")]
    Extraction(#[source] ToolError),

    #[error("archiving failed: {0}")]
    Archive(#[source] ToolError),

    #[error("upload failed: {0}")]
    Upload(#[source] StorageError),

    #[error("metadata store error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("video not found")]
    NotFound,

    #[error("video not ready to download")]
    NotReady,

    #[error("metadata store error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl QueryError {
    /// Both unknown/foreign videos and unfinished ones look like "not found" to callers.
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::NotFound | QueryError::NotReady)
    }
}

/// An upload spooled to local disk, as handed over by the HTTP layer.
#[derive(Debug)]
pub struct UploadedVideo {
    pub file_name: String,
    pub file: File,
}

impl UploadedVideo {
    pub fn new(file_name: impl Into<String>, file: File) -> Self {
        Self {
            file_name: file_name.into(),
            file,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub scratch_dir: PathBuf,
    pub ffmpeg_bin: String,
    pub zip_bin: String,
    pub frame_interval_secs: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("./scratch"),
            ffmpeg_bin: String::from("ffmpeg"),
            zip_bin: String::from("zip"),
            frame_interval_secs: DEFAULT_INTERVAL_SECONDS,
        }
    }
}

/// Operations exposed to inbound adapters.
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Runs the whole pipeline; returns once the archive is stored remotely
    /// or the record has been marked `error`.
    async fn generate(
        &self,
        upload: UploadedVideo,
        owner_id: &str,
    ) -> Result<VideoRecord, PipelineError>;

    async fn get_videos(&self, owner_id: &str) -> Result<Vec<VideoSummary>, QueryError>;

    async fn download_zip(&self, video_id: &str, owner_id: &str)
        -> Result<ByteStream, QueryError>;
}

pub struct PipelineService<R, S, C> {
    repo: R,
    store: S,
    runner: C,
    cleanup: CleanupHandle,
    validator: FileValidator,
    extractor: FrameExtractor,
    archiver: Archiver,
    scratch_dir: PathBuf,
}

impl<R, S, C> PipelineService<R, S, C>
where
    R: VideoRepository,
    S: RemoteStore,
    C: CommandRunner,
{
    pub fn new(
        repo: R,
        store: S,
        runner: C,
        cleanup: CleanupHandle,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            repo,
            store,
            runner,
            cleanup,
            validator: FileValidator::default(),
            extractor: FrameExtractor::new(settings.ffmpeg_bin, settings.frame_interval_secs),
            archiver: Archiver::new(settings.zip_bin),
            scratch_dir: settings.scratch_dir,
        }
    }

    /// Copies the validated upload into a fresh run workspace.
    async fn stage_upload(
        &self,
        upload: &mut UploadedVideo,
        record: &VideoRecord,
    ) -> Result<RunWorkspace, std::io::Error> {
        let workspace = RunWorkspace::create(&self.scratch_dir, &record.id).await?;
        let copied = async {
            let mut dst = BufWriter::new(File::create(workspace.video_path()).await?);
            let bytes = tokio::io::copy(&mut upload.file, &mut dst).await?;
            tokio::io::AsyncWriteExt::flush(&mut dst).await?;
            Ok::<_, std::io::Error>(bytes)
        }
        .await;

        match copied {
            Ok(bytes) => {
                info!(video_id = %record.id, file_name = %upload.file_name, bytes, "upload staged");
                Ok(workspace)
            }
            Err(e) => {
                self.schedule_cleanup(&workspace).await;
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        record: &VideoRecord,
        workspace: &RunWorkspace,
    ) -> Result<(), PipelineError> {
        log_stage(&record.id, PipelineStage::ExtractingFrames);
        self.extractor
            .extract(&self.runner, workspace)
            .await
            .map_err(PipelineError::Extraction)?;

        log_stage(&record.id, PipelineStage::Archiving);
        let archive = self
            .archiver
            .archive(&self.runner, workspace)
            .await
            .map_err(PipelineError::Archive)?;

        log_stage(&record.id, PipelineStage::Uploading);
        self.store
            .upload(&archive, &record.archive_key())
            .await
            .map_err(PipelineError::Upload)?;

        Ok(())
    }

    /// Marks the record failed and releases the workspace.
    async fn fail(&self, record: &VideoRecord, workspace: &RunWorkspace, err: &PipelineError) {
        log_stage(&record.id, PipelineStage::Failed);
        error!(video_id = %record.id, owner_id = %record.owner_id, error = %err, "pipeline failed");

        if let Err(e) = self.repo.update_status(&record.id, VideoStatus::Error).await {
            // left in `processing`; the reconciler will pick it up
            error!(video_id = %record.id, error = %e, "failed to mark video as error");
        }
        self.schedule_cleanup(workspace).await;
    }

    async fn schedule_cleanup(&self, workspace: &RunWorkspace) {
        self.cleanup
            .schedule(CleanupJob::new(
                workspace.video_id(),
                vec![workspace.dir().to_path_buf()],
            ))
            .await;
    }
}

#[async_trait]
impl<R, S, C> VideoService for PipelineService<R, S, C>
where
    R: VideoRepository,
    S: RemoteStore,
    C: CommandRunner,
{
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name))]
    async fn generate(
        &self,
        mut upload: UploadedVideo,
        owner_id: &str,
    ) -> Result<VideoRecord, PipelineError> {
        if let Err(e) = self
            .validator
            .validate(&upload.file_name, &mut upload.file)
            .await
        {
            warn!(error = %e, "upload rejected");
            return Err(e.into());
        }

        let record = VideoRecord::new(owner_id);
        log_stage(&record.id, PipelineStage::Received);

        let workspace = self.stage_upload(&mut upload, &record).await?;

        if let Err(e) = self.repo.save(&record).await {
            error!(video_id = %record.id, error = %e, "failed to persist video record");
            self.schedule_cleanup(&workspace).await;
            return Err(e.into());
        }
        log_stage(&record.id, PipelineStage::Processing);

        if let Err(e) = self.process(&record, &workspace).await {
            self.fail(&record, &workspace, &e).await;
            return Err(e);
        }

        let updated = self
            .repo
            .update_status(&record.id, VideoStatus::ReadyToDownload)
            .await;
        self.schedule_cleanup(&workspace).await;
        let ready = updated.map_err(|e| {
            error!(video_id = %record.id, error = %e, "archive stored but status update failed");
            PipelineError::from(e)
        })?;

        log_stage(&ready.id, PipelineStage::Ready);
        Ok(ready)
    }

    async fn get_videos(&self, owner_id: &str) -> Result<Vec<VideoSummary>, QueryError> {
        let records = self.repo.find_by_owner_id(owner_id).await?;
        Ok(records.iter().map(VideoSummary::from).collect())
    }

    #[instrument(skip(self))]
    async fn download_zip(
        &self,
        video_id: &str,
        owner_id: &str,
    ) -> Result<ByteStream, QueryError> {
        let record = self
            .repo
            .find_by_id(video_id)
            .await?
            .ok_or(QueryError::NotFound)?;

        if record.owner_id != owner_id {
            return Err(QueryError::NotFound);
        }
        if record.status != VideoStatus::ReadyToDownload {
            return Err(QueryError::NotReady);
        }

        Ok(self.store.download(&record.archive_key()).await?)
    }
}

fn log_stage(video_id: &str, stage: PipelineStage) {
    info!(video_id, stage = %stage, "pipeline stage");
}
