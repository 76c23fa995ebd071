use std::fs::{OpenOptions, create_dir_all};
use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use dbpack_core::{CatalogSnapshot, RedactedConnection};
use dbpack_export::PipelineReport;
use dbpack_export::atomic::write_json_atomic;

use super::RegistryResult;

/// Serializable options for runs.
#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub include_views: bool,
    pub include_system_tables: bool,
    pub ignore_tables: Vec<String>,
    pub renderer: String,
    pub image_format: String,
    pub render_timeout_secs: u64,
    pub out_dir: PathBuf,
    pub archive: Option<PathBuf>,
}

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub command: String,
    pub engine: String,
    pub schema_version: String,
    pub run_dir: PathBuf,
    pub options: RunOptions,
    pub connection: RedactedConnection,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub command: String,
    pub engine: String,
    pub schema_version: String,
    pub options: RunOptions,
    pub connection: RedactedConnection,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub schema_path: PathBuf,
    pub logs_path: PathBuf,
    pub report_path: PathBuf,
}

/// Create `<run_dir>/<timestamp>__run_<id>/` with its `config.json` and an
/// empty `logs.ndjson`.
pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        command: ctx.command.clone(),
        engine: ctx.engine.clone(),
        schema_version: ctx.schema_version.clone(),
        options: ctx.options.clone(),
        connection: ctx.connection.clone(),
        git: collect_git_info(),
    };
    write_json_atomic(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.ndjson");
    OpenOptions::new().create(true).append(true).open(&logs_path)?;

    Ok(RunPaths {
        schema_path: root.join("schema.json"),
        report_path: root.join("report.json"),
        logs_path,
        root,
    })
}

pub fn write_schema(paths: &RunPaths, snapshot: &CatalogSnapshot) -> RegistryResult<()> {
    write_json_atomic(&paths.schema_path, snapshot)?;
    Ok(())
}

pub fn write_report(paths: &RunPaths, report: &PipelineReport) -> RegistryResult<()> {
    write_json_atomic(&paths.report_path, report)?;
    Ok(())
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context(run_dir: PathBuf) -> RunContext {
        RunContext {
            run_id: "abc".to_string(),
            started_at: Utc
                .with_ymd_and_hms(2026, 3, 1, 12, 30, 5)
                .single()
                .expect("valid timestamp"),
            command: "tables".to_string(),
            engine: "sqlite".to_string(),
            schema_version: dbpack_core::SCHEMA_VERSION.to_string(),
            run_dir,
            options: RunOptions {
                include_views: false,
                include_system_tables: false,
                ignore_tables: Vec::new(),
                renderer: "dot".to_string(),
                image_format: "png".to_string(),
                render_timeout_secs: 30,
                out_dir: PathBuf::from("out"),
                archive: None,
            },
            connection: dbpack_core::redact_connection_string("sqlite://shop.db?password=hunter2"),
        }
    }

    #[test]
    fn run_directory_holds_config_and_log_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = start_run(&context(dir.path().to_path_buf())).expect("start run");

        assert_eq!(
            paths.root,
            dir.path().join("2026-03-01T12-30-05Z__run_abc")
        );
        assert!(paths.logs_path.exists());

        let config = std::fs::read_to_string(paths.root.join("config.json")).expect("config");
        let value: serde_json::Value = serde_json::from_str(&config).expect("json");
        assert_eq!(value["command"], "tables");
        assert_eq!(value["options"]["renderer"], "dot");
        assert!(!config.contains("hunter2"));
    }
}
