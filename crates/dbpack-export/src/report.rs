use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use dbpack_core::{ExportFormat, ExportJob, TableStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
}

/// Outcome of a single export job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub table: String,
    pub format: ExportFormat,
    pub destination: PathBuf,
    pub status: JobStatus,
    pub rows: u64,
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobReport {
    pub fn succeeded(job: &ExportJob, rows: u64, bytes: u64) -> Self {
        Self {
            table: job.table.clone(),
            format: job.format,
            destination: job.destination.clone(),
            status: JobStatus::Succeeded,
            rows,
            bytes,
            error: None,
        }
    }

    pub fn failed(job: &ExportJob, error: impl Into<String>) -> Self {
        Self {
            table: job.table.clone(),
            format: job.format,
            destination: job.destination.clone(),
            status: JobStatus::Failed,
            rows: 0,
            bytes: 0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramReport {
    pub description_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    pub renderer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveReport {
    pub path: PathBuf,
    pub entries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a pipeline run did, in the order it happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub stats: Vec<TableStats>,
    pub jobs: Vec<JobReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram: Option<DiagramReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveReport>,
    /// Recovered failures worth surfacing to the user.
    pub warnings: Vec<String>,
}

impl PipelineReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            stats: Vec::new(),
            jobs: Vec::new(),
            diagram: None,
            archive: None,
            warnings: Vec::new(),
        }
    }

    pub fn record_job(&mut self, job: JobReport) {
        self.jobs.push(job);
    }

    pub fn record_diagram(&mut self, diagram: DiagramReport) {
        if let Some(error) = &diagram.render_error {
            self.warnings.push(format!("diagram not rendered: {error}"));
        }
        self.diagram = Some(diagram);
    }

    pub fn record_archive(&mut self, archive: ArchiveReport) {
        self.archive = Some(archive);
    }

    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|job| job.status == JobStatus::Failed)
    }

    pub fn rows_exported(&self) -> u64 {
        self.jobs.iter().map(|job| job.rows).sum()
    }
}
