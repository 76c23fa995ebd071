use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dbpack_core::{Error, ExportFormat, ExportJob};
use dbpack_export::{
    DashboardOptions, DiagramGenerator, GraphvizRenderer, JobStatus, Renderer, dashboard,
    export_table, visualize,
};
use dbpack_introspect::{IntrospectOptions, SqliteSource};
use sqlx::{Connection, SqliteConnection};
use tokio_util::sync::CancellationToken;

const FIXTURE: &str = r#"
create table users (
  id INTEGER primary key,
  name TEXT not null,
  email TEXT
);
create table orders (
  id INTEGER primary key,
  user_id INTEGER not null,
  total REAL
);
insert into users (name, email) values ('User1', 'user1@example.com');
insert into users (name, email) values ('User2', null);
insert into users (name, email) values ('User3', 'user3@example.com');
insert into users (name, email) values ('User4', null);
insert into users (name, email) values ('User5', 'user5@example.com');
insert into orders (user_id, total) values (1, 12.5);
"#;

async fn source_from(sql: &str) -> Result<SqliteSource> {
    let mut conn = SqliteConnection::connect("sqlite::memory:")
        .await
        .context("opening in-memory sqlite")?;
    sqlx::raw_sql(sql)
        .execute(&mut conn)
        .await
        .context("loading fixture")?;
    Ok(SqliteSource::from_connection(conn, IntrospectOptions::default()))
}

async fn source() -> Result<SqliteSource> {
    source_from(FIXTURE).await
}

/// Writes a fixed payload where the image should go.
struct StubRenderer;

#[async_trait]
impl Renderer for StubRenderer {
    fn name(&self) -> &str {
        "stub"
    }

    async fn render(&self, _description: &Path, image: &Path, _format: &str) -> dbpack_core::Result<()> {
        std::fs::write(image, b"PNG").map_err(Error::Io)
    }
}

/// Never finishes on its own.
struct StalledRenderer;

#[async_trait]
impl Renderer for StalledRenderer {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn render(&self, _description: &Path, _image: &Path, _format: &str) -> dbpack_core::Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

fn archive_entries(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut names = Vec::new();
    for i in 0..archive.len() {
        names.push(archive.by_index(i)?.name().to_string());
    }
    Ok(names)
}

#[tokio::test]
async fn exports_users_in_every_format() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut source = source().await?;

    let csv_job = ExportJob::in_dir("users", ExportFormat::Tabular, dir.path());
    let outcome = export_table(&mut source, &csv_job).await?;
    let text = std::fs::read_to_string(&csv_job.destination)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "id,name,email");
    assert_eq!(outcome.report.rows, 5);
    assert_eq!(outcome.artifact.name(), "users.csv");
    assert_eq!(outcome.artifact.bytes(), text.as_bytes());

    let json_job = ExportJob::in_dir("users", ExportFormat::Document, dir.path());
    export_table(&mut source, &json_job).await?;
    let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&json_job.destination)?)?;
    let items = value.as_array().context("json array")?;
    assert_eq!(items.len(), 5);
    assert!(items[1]["email"].is_null());
    let keys: Vec<&String> = items[0].as_object().context("object")?.keys().collect();
    assert_eq!(keys, vec!["id", "name", "email"]);

    let xlsx_job = ExportJob::in_dir("users", ExportFormat::Spreadsheet, dir.path());
    export_table(&mut source, &xlsx_job).await?;
    let mut archive = zip::ZipArchive::new(std::fs::File::open(&xlsx_job.destination)?)?;
    let mut sheet = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")?
        .read_to_string(&mut sheet)?;
    assert!(sheet.contains(r#"<c r="A1" t="inlineStr"><is><t>id</t></is></c>"#));
    assert!(sheet.contains(r#"<c r="B1" t="inlineStr"><is><t>name</t></is></c>"#));
    assert!(sheet.contains(r#"<c r="C1" t="inlineStr"><is><t>email</t></is></c>"#));
    Ok(())
}

#[tokio::test]
async fn exporting_an_unknown_table_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut source = source().await?;
    let job = ExportJob::in_dir("ghosts", ExportFormat::Tabular, dir.path());
    let err = export_table(&mut source, &job).await.unwrap_err();
    assert!(matches!(err, Error::TableNotFound(ref name) if name == "ghosts"));
    assert!(!job.destination.exists());
    Ok(())
}

#[tokio::test]
async fn encoder_rejections_name_the_table() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut source = source_from(
        "create table notes (body text); insert into notes values ('bell' || char(7));",
    )
    .await?;
    let job = ExportJob::in_dir("notes", ExportFormat::Spreadsheet, dir.path());
    let err = export_table(&mut source, &job).await.unwrap_err();
    assert!(matches!(err, Error::Encoding { ref table, ref format, .. } if table == "notes" && format == "xlsx"));
    Ok(())
}

#[tokio::test]
async fn write_failures_name_the_table() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"plain file")?;
    let mut source = source().await?;

    let job = ExportJob::new("users", ExportFormat::Tabular, blocker.join("users.csv"));
    let err = export_table(&mut source, &job).await.unwrap_err();
    assert!(matches!(err, Error::Encoding { ref table, ref format, .. } if table == "users" && format == "csv"));
    assert!(err.to_string().contains("users"), "{err}");
    Ok(())
}

#[tokio::test]
async fn dashboard_stale_file_failure_names_the_table() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("users.csv"))?;
    let mut source = source().await?;
    let generator = DiagramGenerator::new(StubRenderer);
    let opts = DashboardOptions::new("run_test", dir.path());

    let err = dashboard(&mut source, &generator, &opts).await.err().context("dashboard error")?;
    assert!(matches!(err, Error::Encoding { ref table, .. } if table == "users"));
    Ok(())
}

#[tokio::test]
async fn missing_renderer_is_not_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut source = source().await?;
    let generator = DiagramGenerator::new(GraphvizRenderer::new("dbpack-missing-dot"));
    let job = dbpack_core::DiagramJob::in_dir(dir.path(), "schema", "png");

    let outcome = visualize(&mut source, &generator, &job).await?;
    assert!(outcome.image.is_none());
    assert!(outcome.render_error.is_some());
    let dot = std::fs::read_to_string(&job.description_path)?;
    assert!(dot.contains("\"users\" [label=\"users\\nid:INTEGER\\nname:TEXT\\nemail:TEXT\\n\"];"));
    assert!(!dot.contains("->"));
    Ok(())
}

#[tokio::test]
async fn stalled_renderer_times_out() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut source = source().await?;
    let generator = DiagramGenerator::new(StalledRenderer).with_timeout(Duration::from_millis(50));
    let job = dbpack_core::DiagramJob::in_dir(dir.path(), "schema", "png");

    let outcome = visualize(&mut source, &generator, &job).await?;
    let error = outcome.render_error.context("render error recorded")?;
    assert!(error.contains("timed out"), "{error}");
    assert!(job.description_path.exists());
    Ok(())
}

#[tokio::test]
async fn cancelled_render_is_recovered() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut source = source().await?;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let generator = DiagramGenerator::new(StalledRenderer).with_cancellation(cancel);
    let job = dbpack_core::DiagramJob::in_dir(dir.path(), "schema", "png");

    let outcome = visualize(&mut source, &generator, &job).await?;
    let error = outcome.render_error.context("render error recorded")?;
    assert!(error.contains("cancelled"), "{error}");
    Ok(())
}

#[tokio::test]
async fn dashboard_packages_every_export_and_the_image() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut source = source().await?;
    let generator = DiagramGenerator::new(StubRenderer);
    let opts = DashboardOptions::new("run_test", dir.path());

    let run = dashboard(&mut source, &generator, &opts).await?;
    let summary = run.outcome?;
    assert_eq!(summary.entry_count(), 3);
    assert_eq!(
        archive_entries(&opts.archive_path)?,
        vec!["users.csv", "orders.csv", "schema.png"]
    );

    assert_eq!(run.report.stats.len(), 2);
    assert_eq!(run.report.stats[0].rows, 5);
    assert_eq!(run.report.stats[0].columns[2].nulls, 2);
    assert!(run.report.jobs.iter().all(|job| job.status == JobStatus::Succeeded));
    assert!(run.report.warnings.is_empty());
    Ok(())
}

#[tokio::test]
async fn dashboard_without_renderer_packages_exports_only() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut source = source().await?;
    let generator = DiagramGenerator::new(GraphvizRenderer::new("dbpack-missing-dot"));
    let opts = DashboardOptions::new("run_test", dir.path());

    let run = dashboard(&mut source, &generator, &opts).await?;
    let summary = run.outcome?;
    assert_eq!(summary.entries, vec!["users.csv", "orders.csv"]);
    assert_eq!(run.report.warnings.len(), 1);
    assert!(dir.path().join("schema.dot").exists());
    Ok(())
}

#[tokio::test]
async fn failed_export_makes_packaging_fail() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut source = source_from(
        "create table good (id integer); insert into good values (1);
         create table bad (body text); insert into bad values ('bell' || char(7));",
    )
    .await?;
    let generator = DiagramGenerator::new(StubRenderer);
    let mut opts = DashboardOptions::new("run_test", dir.path());
    opts.format = ExportFormat::Spreadsheet;

    let run = dashboard(&mut source, &generator, &opts).await?;
    let failed: Vec<&str> = run.report.failed_jobs().map(|job| job.table.as_str()).collect();
    assert_eq!(failed, vec!["bad"]);
    assert!(matches!(run.outcome, Err(Error::Packaging(ref message)) if message.contains("bad.xlsx")));
    assert!(!opts.archive_path.exists());
    let archive = run.report.archive.context("archive report")?;
    assert!(archive.error.is_some());
    Ok(())
}
