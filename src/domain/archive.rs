use crate::domain::frames::list_frames;
use crate::domain::workspace::RunWorkspace;
use crate::ports::command::{check_output, CommandRunner, ToolError};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// End of central directory record with zero entries: a valid empty zip.
const EMPTY_ZIP: [u8; 22] = [
    0x50, 0x4b, 0x05, 0x06, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Bundles a run's frames into `output_{id}.zip` with a zip-compatible tool.
#[derive(Debug, Clone)]
pub struct Archiver {
    program: String,
}

impl Archiver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn args(&self, archive: &Path, frames: &[PathBuf]) -> Vec<String> {
        let mut args = vec![
            "-j".to_string(),
            "-q".to_string(),
            archive.to_string_lossy().to_string(),
        ];
        args.extend(frames.iter().map(|f| f.to_string_lossy().to_string()));
        args
    }

    pub async fn archive<C>(&self, runner: &C, workspace: &RunWorkspace) -> Result<PathBuf, ToolError>
    where
        C: CommandRunner + ?Sized,
    {
        let frames = list_frames(workspace.dir()).await?;
        let archive = workspace.archive_path();

        if frames.is_empty() {
            // zip refuses to create an archive without members
            warn!(video_id = workspace.video_id(), "archiving zero frames");
            tokio::fs::write(&archive, EMPTY_ZIP).await?;
            return Ok(archive);
        }

        let output = runner.run(&self.program, &self.args(&archive, &frames)).await?;
        check_output(&self.program, output)?;

        if !tokio::fs::try_exists(&archive).await? {
            return Err(ToolError::Failed {
                program: self.program.clone(),
                code: Some(0),
                stderr: format!("{} was not created", archive.display()),
            });
        }

        debug!(
            video_id = workspace.video_id(),
            frames = frames.len(),
            archive = %archive.display(),
            "frames archived"
        );
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::command::{MockCommandRunner, ToolOutput};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_archive_passes_frames_to_tool() {
        let root = tempdir().unwrap();
        let workspace = RunWorkspace::create(root.path(), "vid").await.unwrap();
        std::fs::write(workspace.dir().join("frame_0001.png"), b"a").unwrap();
        std::fs::write(workspace.dir().join("frame_0002.png"), b"b").unwrap();
        std::fs::write(workspace.video_path(), b"video").unwrap();

        let archive_path = workspace.archive_path();
        let frame_one = workspace
            .dir()
            .join("frame_0001.png")
            .to_string_lossy()
            .to_string();
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(move |program, args| {
                program == "zip"
                    && args.len() == 5
                    && args[0] == "-j"
                    && args[3] == frame_one
                    && !args.iter().any(|a| a.ends_with(".mp4"))
            })
            .times(1)
            .returning(move |_, _| {
                std::fs::write(&archive_path, b"PK").unwrap();
                Ok(ToolOutput::ok())
            });

        let archive = Archiver::new("zip").archive(&runner, &workspace).await.unwrap();
        assert_eq!(archive, workspace.archive_path());
    }

    #[tokio::test]
    async fn test_archive_tool_failure() {
        let root = tempdir().unwrap();
        let workspace = RunWorkspace::create(root.path(), "vid").await.unwrap();
        std::fs::write(workspace.dir().join("frame_0001.png"), b"a").unwrap();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| Ok(ToolOutput::failed(15, "zip error: disk full")));

        let err = Archiver::new("zip")
            .archive(&runner, &workspace)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed { code: Some(15), .. }));
    }

    #[tokio::test]
    async fn test_archive_missing_output_is_failure() {
        let root = tempdir().unwrap();
        let workspace = RunWorkspace::create(root.path(), "vid").await.unwrap();
        std::fs::write(workspace.dir().join("frame_0001.png"), b"a").unwrap();

        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| Ok(ToolOutput::ok()));

        let result = Archiver::new("zip").archive(&runner, &workspace).await;
        assert!(matches!(result, Err(ToolError::Failed { .. })));
    }

    #[tokio::test]
    async fn test_empty_frame_set_writes_empty_zip() {
        let root = tempdir().unwrap();
        let workspace = RunWorkspace::create(root.path(), "vid").await.unwrap();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();

        let archive = Archiver::new("zip").archive(&runner, &workspace).await.unwrap();
        assert_eq!(std::fs::read(archive).unwrap(), EMPTY_ZIP.to_vec());
    }
}
