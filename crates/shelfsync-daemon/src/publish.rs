//! Post-store publish step.
//!
//! Rendering and uploading the static page happen outside this process; the
//! daemon only runs a configured command once a new catalog is in place.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to start publish command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("publish command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

pub type PublishFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>>;

/// Invoked after every successful catalog replace.
pub trait PublishHook: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    fn publish(&self) -> PublishFuture<'_>;
}

/// Runs `sh -c <command>` in the data directory.
#[derive(Debug, Clone)]
pub struct CommandHook {
    command: String,
    working_dir: PathBuf,
}

impl CommandHook {
    #[must_use]
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
        }
    }
}

impl PublishHook for CommandHook {
    fn name(&self) -> &str {
        "command"
    }

    fn publish(&self) -> PublishFuture<'_> {
        Box::pin(async move {
            let output = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(&self.command)
                .current_dir(&self.working_dir)
                .kill_on_drop(true)
                .output()
                .await?;

            if output.status.success() {
                return Ok(());
            }
            Err(PublishError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        })
    }
}

/// Used when no publish command is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl PublishHook for NoopHook {
    fn name(&self) -> &str {
        "noop"
    }

    fn publish(&self) -> PublishFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

/// `CommandHook` when a command is configured, `NoopHook` otherwise.
#[must_use]
pub fn hook_from_config(config: &shelfsync_core::AppConfig) -> Box<dyn PublishHook> {
    match config.publish_command.as_deref().map(str::trim) {
        Some(command) if !command.is_empty() => {
            Box::new(CommandHook::new(command, config.data_dir.clone()))
        }
        _ => Box::new(NoopHook),
    }
}
