//! Job orchestration: export, visualize and the full dashboard run.

use std::path::{Path, PathBuf};

use dbpack_core::{
    Artifact, ArtifactOrigin, DiagramJob, Error, ExportFormat, ExportJob, Result,
};
use dbpack_introspect::{SchemaInspector, SqliteSource};

use crate::atomic::write_bytes_atomic;
use crate::diagram::{DiagramGenerator, DiagramOutcome, Renderer};
use crate::encoder::encoder_for;
use crate::errors::EncodeError;
use crate::package::{PackageItem, PackageSummary, Packager};
use crate::report::{ArchiveReport, DiagramReport, JobReport, PipelineReport};

/// What a finished export produced.
#[derive(Debug)]
pub struct ExportOutcome {
    pub artifact: Artifact,
    pub report: JobReport,
}

/// Stream `job.table` through the job's encoder and write the result to
/// `job.destination`.
pub async fn export_table(source: &mut SqliteSource, job: &ExportJob) -> Result<ExportOutcome> {
    tracing::info!(
        event = "export_started",
        table = %job.table,
        format = %job.format,
        destination = %job.destination.display()
    );

    let mut cursor = source.open_cursor(&job.table).await?;
    let mut encoder = encoder_for(job.format);
    encoder
        .begin_stream(cursor.columns())
        .map_err(|err| encoding_error(job, err))?;
    while let Some(row) = cursor.next_row().await? {
        encoder
            .write_row(&row)
            .map_err(|err| encoding_error(job, err))?;
    }
    let rows = cursor.close();
    let bytes = encoder.finish().map_err(|err| encoding_error(job, err))?;

    write_bytes_atomic(&job.destination, &bytes)
        .map_err(|err| encoding_error(job, EncodeError::Io(err)))?;
    let report = JobReport::succeeded(job, rows, bytes.len() as u64);
    tracing::info!(
        event = "export_finished",
        table = %job.table,
        format = %job.format,
        rows,
        bytes = bytes.len()
    );

    let name = job
        .destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.{}", job.table, job.format.extension()));
    Ok(ExportOutcome {
        artifact: Artifact::new(name, bytes, ArtifactOrigin::Export(job.clone())),
        report,
    })
}

fn encoding_error(job: &ExportJob, err: EncodeError) -> Error {
    Error::Encoding {
        table: job.table.clone(),
        format: job.format.to_string(),
        message: err.to_string(),
    }
}

/// Describe every visible table and hand the result to `generator`.
pub async fn visualize<R: Renderer>(
    source: &mut SqliteSource,
    generator: &DiagramGenerator<R>,
    job: &DiagramJob,
) -> Result<DiagramOutcome> {
    let tables = source.describe_all().await?;
    generator.generate(&tables, job).await
}

/// Settings for [`dashboard`].
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub run_id: String,
    /// Directory receiving per-table exports and the diagram.
    pub out_dir: PathBuf,
    pub archive_path: PathBuf,
    pub format: ExportFormat,
    pub image_format: String,
}

impl DashboardOptions {
    pub fn new(run_id: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        let out_dir = out_dir.into();
        Self {
            run_id: run_id.into(),
            archive_path: out_dir.join("dashboard.zip"),
            out_dir,
            format: ExportFormat::Tabular,
            image_format: "png".to_string(),
        }
    }

    pub fn diagram_job(&self) -> DiagramJob {
        DiagramJob::in_dir(&self.out_dir, "schema", &self.image_format)
    }
}

/// A dashboard run: the report is kept even when packaging fails.
#[derive(Debug)]
pub struct DashboardRun {
    pub report: PipelineReport,
    pub outcome: Result<PackageSummary>,
}

/// Stats for every table, one export per table, the schema diagram, then
/// one archive holding every export plus the image when it was rendered.
///
/// A failed export is recorded and leaves its file missing, which makes
/// packaging fail. Connection errors abort the run.
pub async fn dashboard<R: Renderer>(
    source: &mut SqliteSource,
    generator: &DiagramGenerator<R>,
    opts: &DashboardOptions,
) -> Result<DashboardRun> {
    let mut report = PipelineReport::new(opts.run_id.clone());
    let tables = source.list_tables().await?;
    tracing::info!(event = "dashboard_started", run_id = %opts.run_id, tables = tables.len());

    for table in &tables {
        match source.table_stats(table).await {
            Ok(stats) => report.stats.push(stats),
            Err(err @ Error::Connection(_)) => return Err(err),
            Err(err) => {
                tracing::warn!(event = "stats_failed", table = %table, error = %err);
                report.warnings.push(format!("stats for '{table}' failed: {err}"));
            }
        }
    }

    let mut items = Vec::with_capacity(tables.len() + 1);
    for table in &tables {
        let job = ExportJob::in_dir(table.as_str(), opts.format, &opts.out_dir);
        remove_stale(&job.destination).map_err(|err| encoding_error(&job, EncodeError::Io(err)))?;
        items.push(PackageItem::File(job.destination.clone()));

        match export_table(source, &job).await {
            Ok(outcome) => report.record_job(outcome.report),
            Err(err @ Error::Connection(_)) => return Err(err),
            Err(err) => {
                tracing::error!(event = "export_failed", job = %job.label(), error = %err);
                report.record_job(JobReport::failed(&job, err.to_string()));
            }
        }
    }

    let diagram_job = opts.diagram_job();
    let diagram = visualize(source, generator, &diagram_job).await?;
    report.record_diagram(DiagramReport {
        description_path: diagram_job.description_path.clone(),
        image_path: diagram.image.as_ref().map(|_| diagram_job.image_path.clone()),
        renderer: generator.renderer().name().to_string(),
        render_error: diagram.render_error.clone(),
    });
    if let Some(image) = diagram.image {
        items.push(PackageItem::Artifact(image));
    }

    let outcome = match Packager::new().package(&items, &opts.archive_path) {
        Ok(summary) => {
            report.record_archive(ArchiveReport {
                path: summary.path.clone(),
                entries: summary.entries.clone(),
                error: None,
            });
            Ok(summary)
        }
        Err(err) => {
            tracing::error!(
                event = "packaging_failed",
                path = %opts.archive_path.display(),
                error = %err
            );
            report.record_archive(ArchiveReport {
                path: opts.archive_path.clone(),
                entries: Vec::new(),
                error: Some(err.to_string()),
            });
            Err(err.into())
        }
    };

    tracing::info!(
        event = "dashboard_finished",
        run_id = %opts.run_id,
        failed_jobs = report.failed_jobs().count(),
        packaged = outcome.is_ok()
    );
    Ok(DashboardRun { report, outcome })
}

fn remove_stale(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
