//! Schema diagrams: a DOT description plus an optional rendered image.
//!
//! The description is always written. Rendering goes through a [`Renderer`]
//! and its failures are recoverable: the outcome carries the error instead of
//! the image.

mod renderer;

pub use renderer::{GraphvizRenderer, Renderer};

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use dbpack_core::{Artifact, ArtifactOrigin, DiagramJob, Error, Result, TableDescriptor};

use crate::atomic::write_bytes_atomic;

pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Graphviz DOT text with one box per table, listing `name:type` per column.
///
/// Relationships are not drawn.
pub fn describe(tables: &[TableDescriptor]) -> String {
    let mut dot = String::from("digraph G {\nnode [shape=box style=filled fillcolor=lightblue];\n");
    for table in tables {
        let mut label = format!("{}\\n", escape(&table.name));
        for column in &table.columns {
            label.push_str(&format!(
                "{}:{}\\n",
                escape(&column.name),
                escape(&column.data_type)
            ));
        }
        dot.push_str(&format!("\"{}\" [label=\"{label}\"];\n", escape(&table.name)));
    }
    dot.push_str("}\n");
    dot
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Result of a diagram job.
#[derive(Debug)]
pub struct DiagramOutcome {
    pub description: Artifact,
    pub image: Option<Artifact>,
    /// Why the image is missing, when rendering failed.
    pub render_error: Option<String>,
}

impl DiagramOutcome {
    pub fn rendered(&self) -> bool {
        self.image.is_some()
    }
}

/// Writes descriptions and drives a [`Renderer`] under a timeout.
pub struct DiagramGenerator<R> {
    renderer: R,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<R: Renderer> DiagramGenerator<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            timeout: DEFAULT_RENDER_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abort in-flight renders when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write the description for `tables`, then try to render it.
    ///
    /// Only failures to write the description are returned as errors.
    pub async fn generate(&self, tables: &[TableDescriptor], job: &DiagramJob) -> Result<DiagramOutcome> {
        let text = describe(tables);
        write_bytes_atomic(&job.description_path, text.as_bytes())?;
        let description = Artifact::new(
            file_name(&job.description_path)?,
            text.into_bytes(),
            ArtifactOrigin::Diagram(job.clone()),
        );
        tracing::info!(
            event = "diagram_described",
            tables = tables.len(),
            path = %job.description_path.display()
        );

        // A stale image from an earlier run must not pass for this one.
        match std::fs::remove_file(&job.image_path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        match self.render(job).await {
            Ok(image) => {
                tracing::info!(
                    event = "diagram_rendered",
                    renderer = self.renderer.name(),
                    bytes = image.len(),
                    path = %job.image_path.display()
                );
                Ok(DiagramOutcome {
                    description,
                    image: Some(image),
                    render_error: None,
                })
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!(
                    event = "render_failed",
                    renderer = self.renderer.name(),
                    error = %err
                );
                Ok(DiagramOutcome {
                    description,
                    image: None,
                    render_error: Some(err.to_string()),
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn render(&self, job: &DiagramJob) -> Result<Artifact> {
        let render = self
            .renderer
            .render(&job.description_path, &job.image_path, &job.image_format);
        tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(Error::ExternalTool(format!(
                    "render with '{}' cancelled",
                    self.renderer.name()
                )));
            }
            result = tokio::time::timeout(self.timeout, render) => match result {
                Ok(inner) => inner?,
                Err(_) => {
                    return Err(Error::ExternalTool(format!(
                        "render with '{}' timed out after {}s",
                        self.renderer.name(),
                        self.timeout.as_secs_f64()
                    )));
                }
            },
        }

        let bytes = std::fs::read(&job.image_path).map_err(|err| {
            Error::ExternalTool(format!(
                "renderer produced no image at '{}': {err}",
                job.image_path.display()
            ))
        })?;
        Ok(Artifact::new(
            file_name(&job.image_path)?,
            bytes,
            ArtifactOrigin::Diagram(job.clone()),
        ))
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no file name in '{}'", path.display()),
            ))
        })
}
