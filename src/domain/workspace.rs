//! Per-run scratch directories.
//!
//! Every pipeline run owns `{scratch_root}/{video_id}/`, so frames and
//! archives of concurrent runs never share a namespace.

use crate::domain::video::asset_file_name;
use std::io;
use std::path::{Path, PathBuf};

pub const FRAME_PREFIX: &str = "frame_";
pub const FRAME_EXTENSION: &str = "png";
/// Output pattern handed to the frame extraction tool.
pub const FRAME_OUTPUT_PATTERN: &str = "frame_%04d.png";

#[derive(Debug, Clone)]
pub struct RunWorkspace {
    video_id: String,
    dir: PathBuf,
}

impl RunWorkspace {
    pub fn new(scratch_root: &Path, video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            dir: scratch_root.join(video_id),
        }
    }

    pub async fn create(scratch_root: &Path, video_id: &str) -> io::Result<Self> {
        let workspace = Self::new(scratch_root, video_id);
        tokio::fs::create_dir_all(&workspace.dir).await?;
        Ok(workspace)
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{id}.mp4`
    pub fn video_path(&self) -> PathBuf {
        self.dir.join(asset_file_name(&self.video_id))
    }

    pub fn frame_output_pattern(&self) -> PathBuf {
        self.dir.join(FRAME_OUTPUT_PATTERN)
    }

    /// `output_{id}.zip`
    pub fn archive_path(&self) -> PathBuf {
        self.dir.join(format!("output_{}.zip", self.video_id))
    }
}
