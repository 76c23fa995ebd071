mod config;
mod registry;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use dbpack_core::{
    DiagramJob, Error as CoreError, ExportFormat, ExportJob, SCHEMA_VERSION, redact_connection_string,
    validate_catalog,
};
use dbpack_export::{
    DashboardOptions, DiagramGenerator, DiagramReport, GraphvizRenderer, PipelineReport, Renderer,
    dashboard, export_table, visualize,
};
use dbpack_introspect::{SchemaInspector, SqliteSource};
use registry::{RunContext, RunOptions, RunPaths, init_run_logging, start_run, write_report, write_schema};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use config::{ConfigError, Settings};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

#[derive(Parser, Debug)]
#[command(name = "dbpack", version, about = "SQLite export, diagram and dashboard tool")]
struct Cli {
    /// Database connection string, e.g. `sqlite://shop.db`.
    #[arg(long, global = true, value_name = "CONNECTION_STRING")]
    conn: Option<String>,
    /// Config file (defaults to ./dbpack.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long, global = true)]
    run_dir: Option<PathBuf>,
    /// Include views when listing and describing tables.
    #[arg(long, global = true, default_value_t = false)]
    include_views: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List visible tables.
    Tables,
    /// Print columns for one table, or the whole catalog.
    Describe(DescribeArgs),
    /// Row and null counts per table.
    Stats,
    /// Export one table as csv, json or xlsx.
    Export(ExportArgs),
    /// Write the schema diagram and try to render it.
    Visualize(VisualizeArgs),
    /// Stats, a CSV per table, the diagram, and one archive.
    Dashboard(DashboardArgs),
}

#[derive(Args, Debug)]
struct DescribeArgs {
    table: Option<String>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    table: String,
    /// csv, json or xlsx.
    format: ExportFormat,
    destination: PathBuf,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Directory for generated files.
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Graphviz-compatible renderer program.
    #[arg(long)]
    renderer: Option<String>,
    /// Image format passed to the renderer.
    #[arg(long)]
    image_format: Option<String>,
}

#[derive(Args, Debug)]
struct VisualizeArgs {
    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Args, Debug)]
struct DashboardArgs {
    #[command(flatten)]
    render: RenderArgs,
    /// Archive path (defaults to <out-dir>/dashboard.zip).
    #[arg(long)]
    archive: Option<PathBuf>,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Tables => "tables",
            Command::Describe(_) => "describe",
            Command::Stats => "stats",
            Command::Export(_) => "export",
            Command::Visualize(_) => "visualize",
            Command::Dashboard(_) => "dashboard",
        }
    }

    fn render_args(&self) -> Option<&RenderArgs> {
        match self {
            Command::Visualize(args) => Some(&args.render),
            Command::Dashboard(args) => Some(&args.render),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = resolve_settings(&cli)?;
    let conn = settings.connection()?.to_string();
    let engine = detect_engine(&conn)?;

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        command: cli.command.name().to_string(),
        engine: engine.to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        run_dir: settings.output.run_dir.clone(),
        options: RunOptions {
            include_views: settings.introspect.include_views,
            include_system_tables: settings.introspect.include_system_tables,
            ignore_tables: settings.introspect.ignore_tables.clone(),
            renderer: settings.renderer.program.clone(),
            image_format: settings.renderer.format.clone(),
            render_timeout_secs: settings.renderer.timeout_secs,
            out_dir: settings.output.dir.clone(),
            archive: settings.output.archive.clone(),
        },
        connection: redact_connection_string(&conn),
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        command = %run_ctx.command,
        engine = %engine,
        run_dir = %run_paths.root.display()
    );
    let timer = Instant::now();

    let mut source = SqliteSource::connect(&conn, settings.introspect_options()).await?;
    let snapshot = source.snapshot().await?;
    validate_catalog(&snapshot)?;
    write_schema(&run_paths, &snapshot)?;
    tracing::info!(
        event = "schema_written",
        tables = snapshot.tables.len(),
        path = %run_paths.schema_path.display()
    );

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    let result = match cli.command {
        Command::Tables => {
            for table in &snapshot.tables {
                println!("{}", table.name);
            }
            Ok(())
        }
        Command::Describe(args) => match args.table {
            Some(table) => {
                let columns = source.describe_table(&table).await?;
                println!("{}", serde_json::to_string_pretty(&columns)?);
                Ok(())
            }
            None => {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                Ok(())
            }
        },
        Command::Stats => run_stats(&mut source, &snapshot.tables).await,
        Command::Export(args) => run_export(&mut source, &run_id, &run_paths, args).await,
        Command::Visualize(_) => {
            let generator = generator(&settings, cancel);
            run_visualize(&mut source, &generator, &settings, &run_id, &run_paths).await
        }
        Command::Dashboard(_) => {
            let generator = generator(&settings, cancel);
            run_dashboard(&mut source, &generator, &settings, &run_id, &run_paths).await
        }
    };

    source.close().await?;

    let duration_ms = timer.elapsed().as_millis();
    match &result {
        Ok(()) => tracing::info!(event = "run_finished", status = "success", duration_ms = duration_ms),
        Err(err) => tracing::error!(
            event = "run_finished",
            status = "failed",
            duration_ms = duration_ms,
            error = %err
        ),
    }
    result
}

/// File, then environment, then flags.
fn resolve_settings(cli: &Cli) -> Result<Settings, CliError> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply_env(|key| std::env::var(key).ok())?;

    if let Some(conn) = &cli.conn {
        settings.database.url = Some(conn.clone());
    }
    if let Some(run_dir) = &cli.run_dir {
        settings.output.run_dir = run_dir.clone();
    }
    if cli.include_views {
        settings.introspect.include_views = true;
    }
    if let Some(render) = cli.command.render_args() {
        if let Some(out_dir) = &render.out_dir {
            settings.output.dir = out_dir.clone();
        }
        if let Some(program) = &render.renderer {
            settings.renderer.program = program.clone();
        }
        if let Some(format) = &render.image_format {
            settings.renderer.format = format.clone();
        }
    }
    if let Command::Dashboard(args) = &cli.command {
        if let Some(archive) = &args.archive {
            settings.output.archive = Some(archive.clone());
        }
    }
    Ok(settings)
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("sqlite:") {
        Ok("sqlite")
    } else {
        Err(CliError::UnsupportedEngine(
            redact_connection_string(conn).redacted,
        ))
    }
}

fn generator(settings: &Settings, cancel: CancellationToken) -> DiagramGenerator<GraphvizRenderer> {
    DiagramGenerator::new(GraphvizRenderer::new(settings.renderer.program.clone()))
        .with_timeout(settings.render_timeout())
        .with_cancellation(cancel)
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(event = "interrupt_received");
            cancel.cancel();
        }
    });
}

async fn run_stats(
    source: &mut SqliteSource,
    tables: &[dbpack_core::TableDescriptor],
) -> Result<(), CliError> {
    for table in tables {
        let stats = source.table_stats(&table.name).await?;
        println!("{}: {} rows", stats.table, stats.rows);
        for column in &stats.columns {
            println!("  {} {} nulls={}", column.name, column.data_type, column.nulls);
        }
    }
    Ok(())
}

async fn run_export(
    source: &mut SqliteSource,
    run_id: &str,
    run_paths: &RunPaths,
    args: ExportArgs,
) -> Result<(), CliError> {
    let job = ExportJob::new(args.table, args.format, args.destination);
    let outcome = export_table(source, &job).await?;

    let mut report = PipelineReport::new(run_id);
    report.record_job(outcome.report);
    write_report(run_paths, &report)?;

    println!(
        "{} rows from '{}' -> {}",
        report.rows_exported(),
        job.table,
        job.destination.display()
    );
    Ok(())
}

async fn run_visualize<R: Renderer>(
    source: &mut SqliteSource,
    generator: &DiagramGenerator<R>,
    settings: &Settings,
    run_id: &str,
    run_paths: &RunPaths,
) -> Result<(), CliError> {
    let job = DiagramJob::in_dir(&settings.output.dir, "schema", &settings.renderer.format);
    let outcome = visualize(source, generator, &job).await?;

    let mut report = PipelineReport::new(run_id);
    report.record_diagram(DiagramReport {
        description_path: job.description_path.clone(),
        image_path: outcome.image.as_ref().map(|_| job.image_path.clone()),
        renderer: generator.renderer().name().to_string(),
        render_error: outcome.render_error.clone(),
    });
    write_report(run_paths, &report)?;

    println!("description -> {}", job.description_path.display());
    match &outcome.render_error {
        None => println!("image -> {}", job.image_path.display()),
        Some(error) => eprintln!("warning: diagram not rendered: {error}"),
    }
    Ok(())
}

async fn run_dashboard<R: Renderer>(
    source: &mut SqliteSource,
    generator: &DiagramGenerator<R>,
    settings: &Settings,
    run_id: &str,
    run_paths: &RunPaths,
) -> Result<(), CliError> {
    let mut opts = DashboardOptions::new(run_id, settings.output.dir.clone());
    opts.image_format = settings.renderer.format.clone();
    if let Some(archive) = &settings.output.archive {
        opts.archive_path = archive.clone();
    }

    let run = dashboard(source, generator, &opts).await?;
    write_report(run_paths, &run.report)?;
    tracing::info!(event = "report_written", path = %run_paths.report_path.display());

    for warning in &run.report.warnings {
        eprintln!("warning: {warning}");
    }
    for job in run.report.failed_jobs() {
        eprintln!(
            "error: export of '{}' failed: {}",
            job.table,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }

    let summary = run.outcome?;
    println!(
        "{} entries -> {}",
        summary.entry_count(),
        summary.path.display()
    );
    Ok(())
}
