use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use dbpack_core::{Error, Result};

/// Turns a written graph description into an image file.
#[async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    /// Render `description` into `image` using `format` (e.g. `png`).
    async fn render(&self, description: &Path, image: &Path, format: &str) -> Result<()>;
}

/// Runs a Graphviz-compatible program: `<program> -T<format> <description> -o <image>`.
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    program: String,
}

impl GraphvizRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for GraphvizRenderer {
    fn default() -> Self {
        Self::new("dot")
    }
}

#[async_trait]
impl Renderer for GraphvizRenderer {
    fn name(&self) -> &str {
        &self.program
    }

    async fn render(&self, description: &Path, image: &Path, format: &str) -> Result<()> {
        tracing::debug!(
            event = "renderer_spawn",
            program = %self.program,
            description = %description.display(),
            image = %image.display()
        );

        let child = Command::new(&self.program)
            .arg(format!("-T{format}"))
            .arg(description)
            .arg("-o")
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                Error::ExternalTool(format!("failed to start '{}': {err}", self.program))
            })?;

        let out = child.wait_with_output().await.map_err(|err| {
            Error::ExternalTool(format!("failed to wait for '{}': {err}", self.program))
        })?;

        if out.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&out.stderr);
        Err(Error::ExternalTool(format!(
            "'{}' exited with {}: {}",
            self.program,
            out.status
                .code()
                .map_or_else(|| "signal".to_string(), |code| format!("code {code}")),
            stderr.trim()
        )))
    }
}
