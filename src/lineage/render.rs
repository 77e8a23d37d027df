// lineage/render.rs
// Drives the external Graphviz executable that turns a DOT file into an image.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

pub const DEFAULT_DOT_EXECUTABLE: &str = "dot";
pub const DEFAULT_IMAGE_FORMAT: &str = "png";
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Graphviz executable '{executable}' not found. Cannot render graph. Please install Graphviz (or pass --dot-executable).")]
    ToolMissing { executable: String },

    #[error("Graphviz failed (exit code {code:?}): {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Graphviz did not finish within {} seconds", .limit.as_secs())]
    TimedOut { limit: Duration },

    #[error("I/O error while rendering graph: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, RenderError::ToolMissing { .. })
    }
}

#[async_trait]
pub trait GraphRenderer: Send + Sync {
    /// Renders the description file and returns the image path.
    async fn render(&self, description_path: &Path) -> Result<PathBuf, RenderError>;
}

/// Runs `dot -T<format> -o <description>.<format> <description>`.
#[derive(Debug, Clone)]
pub struct DotRenderer {
    executable: String,
    format: String,
    timeout: Duration,
}

impl DotRenderer {
    pub fn new(executable: impl Into<String>, format: impl Into<String>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            format: format.into(),
            timeout,
        }
    }

    pub fn image_path_for(&self, description_path: &Path) -> PathBuf {
        let mut path = OsString::from(description_path.as_os_str());
        path.push(".");
        path.push(&self.format);
        PathBuf::from(path)
    }
}

#[async_trait]
impl GraphRenderer for DotRenderer {
    async fn render(&self, description_path: &Path) -> Result<PathBuf, RenderError> {
        let image_path = self.image_path_for(description_path);
        debug!(executable = %self.executable, image = %image_path.display(), "Running Graphviz");

        let child = Command::new(&self.executable)
            .arg(format!("-T{}", self.format))
            .arg("-o")
            .arg(&image_path)
            .arg(description_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true) // a timed-out renderer is killed when the future is dropped
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RenderError::ToolMissing {
                    executable: self.executable.clone(),
                },
                _ => RenderError::Io(e),
            })?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::TimedOut { limit: self.timeout })??;

        if !output.status.success() {
            return Err(RenderError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(image_path)
    }
}
