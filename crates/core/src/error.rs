use std::path::PathBuf;
use thiserror::Error;

pub type FlashResult<T> = Result<T, FlashError>;

/// Failures that can stop the build / discover / confirm / flash pipeline.
#[derive(Debug, Error)]
pub enum FlashError {
    /// A checked external invocation exited non-zero (or could not be spawned).
    #[error("command failed: {command}")]
    CommandExecution {
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Enumeration produced nothing the operator is allowed to pick.
    #[error("{0}")]
    Discovery(String),

    /// The build step reported success but the image is absent or empty.
    #[error("image not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("aborted: {0}")]
    UserAbort(String),

    #[error("unsupported OS: {0}")]
    UnsupportedPlatform(String),

    /// The build target has no removable-media boot file name.
    #[error("unsupported build target: {0}")]
    UnsupportedTarget(String),

    #[error("verification failed for {target}: {detail}")]
    VerifyMismatch { target: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlashError {
    /// Process exit code the binary terminates with for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            FlashError::Discovery(_) | FlashError::UnsupportedPlatform(_) => 2,
            FlashError::UserAbort(_) => 3,
            FlashError::CommandExecution { .. }
            | FlashError::MissingArtifact(_)
            | FlashError::UnsupportedTarget(_)
            | FlashError::VerifyMismatch { .. }
            | FlashError::Io(_)
            | FlashError::Json(_) => 1,
        }
    }
}
