use crate::domain::workspace::{RunWorkspace, FRAME_EXTENSION, FRAME_PREFIX};
use crate::ports::command::{check_output, CommandRunner, ToolError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const DEFAULT_INTERVAL_SECONDS: u32 = 4;

fn frame_name_regex() -> &'static Regex {
    static FRAME_NAME: OnceLock<Regex> = OnceLock::new();
    FRAME_NAME.get_or_init(|| {
        Regex::new(&format!(r"^{}(\d{{4,}})\.{}$", FRAME_PREFIX, FRAME_EXTENSION))
            .expect("frame name pattern is valid")
    })
}

/// Samples one frame every `interval_seconds` through an ffmpeg-compatible tool.
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    program: String,
    interval_seconds: u32,
}

impl FrameExtractor {
    pub fn new(program: impl Into<String>, interval_seconds: u32) -> Self {
        Self {
            program: program.into(),
            interval_seconds: interval_seconds.max(1),
        }
    }

    pub fn interval_seconds(&self) -> u32 {
        self.interval_seconds
    }

    pub fn args(&self, workspace: &RunWorkspace) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            workspace.video_path().to_string_lossy().to_string(),
            "-vf".to_string(),
            format!("fps=1/{}", self.interval_seconds),
            workspace.frame_output_pattern().to_string_lossy().to_string(),
        ]
    }

    /// Returns the produced frames in sequence order. Zero frames is not an error.
    pub async fn extract<C>(
        &self,
        runner: &C,
        workspace: &RunWorkspace,
    ) -> Result<Vec<PathBuf>, ToolError>
    where
        C: CommandRunner + ?Sized,
    {
        let output = runner.run(&self.program, &self.args(workspace)).await?;
        check_output(&self.program, output)?;

        let frames = list_frames(workspace.dir()).await?;
        if frames.is_empty() {
            warn!(video_id = workspace.video_id(), "extraction produced no frames");
        } else {
            debug!(
                video_id = workspace.video_id(),
                frames = frames.len(),
                "frames extracted"
            );
        }
        Ok(frames)
    }
}

/// Frame files directly inside `dir`, in sequence order. The counter
/// outgrows its zero padding past 9999, so names do not sort numerically.
pub async fn list_frames(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(sequence) = frame_name_regex()
            .captures(name)
            .and_then(|caps| caps[1].parse::<u64>().ok())
        else {
            continue;
        };
        if entry.file_type().await?.is_file() {
            frames.push((sequence, entry.path()));
        }
    }
    frames.sort_by_key(|(sequence, _)| *sequence);
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}
