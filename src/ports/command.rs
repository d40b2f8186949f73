use async_trait::async_trait;
use std::time::Duration;

/// What the pipeline needs to know about a finished external tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs an external program to completion.
///
/// Extraction and archiving only talk to external tools through this trait so
/// either can be swapped for an in-process library later.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ToolError>;
}

/// Turns a non-successful run into `ToolError::Failed`.
pub fn check_output(program: &str, output: ToolOutput) -> Result<ToolOutput, ToolError> {
    if output.success {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            program: program.to_string(),
            code: output.code,
            stderr: output.stderr,
        })
    }
}
