//! External renderer adapter.
//!
//! The renderer is a black-box executable given a scene file, a render
//! target, and a frame number. Two invocation modes cover the common
//! integrations: a generated script piped to the child's stdin (Modo-style
//! `modo_cl`), or plain command-line arguments (Houdini-style
//! `hython scene target frame`). A non-zero exit fails the job.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Error type for renderer invocations.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("renderer execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error talking to renderer: {0}")]
    Io(#[from] std::io::Error),
}

/// A pluggable renderer invocation.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render a single frame of `scene` using render target `target`.
    async fn render_frame(&self, scene: &Path, target: &str, frame: i64)
        -> Result<(), RenderError>;
}

/// How the scene, target, and frame reach the renderer executable.
enum Invocation {
    /// Substitute into a script template and pipe it to stdin.
    /// Placeholders: `{scene}`, `{target}`, `{frame}`.
    Script(String),
    /// Append `scene target frame` as command-line arguments.
    Args,
}

/// Renderer that spawns an external executable per frame.
pub struct CommandRenderer {
    executable: String,
    invocation: Invocation,
}

impl CommandRenderer {
    /// Script mode: the template is rendered per frame and written to the
    /// child's stdin.
    pub fn with_script(executable: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            invocation: Invocation::Script(template.into()),
        }
    }

    /// Argument mode: the child receives `scene target frame` as argv.
    pub fn with_args(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            invocation: Invocation::Args,
        }
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render_frame(
        &self,
        scene: &Path,
        target: &str,
        frame: i64,
    ) -> Result<(), RenderError> {
        let mut command = tokio::process::Command::new(&self.executable);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = match &self.invocation {
            Invocation::Script(template) => {
                let script = template
                    .replace("{scene}", &scene.to_string_lossy())
                    .replace("{target}", target)
                    .replace("{frame}", &frame.to_string());
                tracing::debug!(executable = %self.executable, script = %script, "Rendering via stdin script");

                let mut child = command
                    .stdin(Stdio::piped())
                    .spawn()
                    .map_err(RenderError::NotFound)?;
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(script.as_bytes()).await?;
                    // Dropping stdin closes the pipe so the child sees EOF.
                }
                child.wait_with_output().await?
            }
            Invocation::Args => {
                tracing::debug!(
                    executable = %self.executable,
                    scene = %scene.display(),
                    target,
                    frame,
                    "Rendering via argv",
                );
                command
                    .arg(scene)
                    .arg(target)
                    .arg(frame.to_string())
                    .output()
                    .await
                    .map_err(RenderError::NotFound)?
            }
        };

        if !output.status.success() {
            return Err(RenderError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}
