//! TGA - building services design pipeline CLI
//!
//! ## Commands
//!
//! - `run`: Ingest a drawing, generate discipline designs and check compliance
//! - `inspect`: Show the rooms extracted from a drawing
//! - `standards`: List the clauses applicable to a project profile
//! - `sample`: Write a sample drawing and project file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, Level};

use tga_core::fixtures::{sample_office_dxf, sample_office_pdf, SAMPLE_STOREYS};
use tga_core::{
    extract, ingest, write_results_json, BuildingCategory, Discipline, DrawingDocument,
    EmbeddedStandards, FileStandards, PipelineConfig, Project, Region, StandardsRepository,
    StandardsSource,
};
use tga_pipeline::{Orchestrator, PipelineRun, ProgressEvent, RunStatus};

#[derive(Parser)]
#[command(name = "tga")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Building services (TGA) design automation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and machine-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for one drawing
    Run {
        /// Drawing file (.dxf or .pdf)
        #[arg(short, long)]
        drawing: PathBuf,

        /// Project definition (JSON)
        #[arg(short, long)]
        project: PathBuf,

        /// Standards dataset (JSON); the embedded dataset is used if omitted
        #[arg(long, env = "TGA_STANDARDS")]
        standards: Option<PathBuf>,

        /// Output directory for artifacts and reports
        #[arg(short, long, default_value = "tga-out")]
        out: PathBuf,

        /// Pipeline configuration file (JSON)
        #[arg(short, long, env = "TGA_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Ingest a drawing and list the extracted rooms
    Inspect {
        /// Drawing file (.dxf or .pdf)
        #[arg(short, long)]
        drawing: PathBuf,

        /// Pipeline configuration file (JSON)
        #[arg(short, long, env = "TGA_CONFIG")]
        config: Option<PathBuf>,
    },

    /// List applicable standard clauses
    Standards {
        #[arg(short, long, default_value = "germany")]
        region: Region,

        #[arg(short, long, default_value = "office")]
        category: BuildingCategory,

        /// Limit to one discipline (name or two-letter code)
        #[arg(short, long)]
        discipline: Option<Discipline>,

        /// Standards dataset (JSON); the embedded dataset is used if omitted
        #[arg(long, env = "TGA_STANDARDS")]
        standards: Option<PathBuf>,
    },

    /// Write the sample office drawings and a project file
    Sample {
        /// Target directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

/// On-disk project definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ProjectFile {
    name: String,
    category: BuildingCategory,
    total_area_m2: f64,
    floors: u32,
    region: Region,
    disciplines: Vec<Discipline>,
}

impl ProjectFile {
    fn into_project(self) -> Project {
        Project::new(
            self.name,
            self.category,
            self.total_area_m2,
            self.floors,
            self.region,
            self.disciplines,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tga_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            drawing,
            project,
            standards,
            out,
            config,
        } => {
            cmd_run(
                &drawing,
                &project,
                standards.as_deref(),
                &out,
                config.as_deref(),
                cli.json,
            )
            .await
        }
        Commands::Inspect { drawing, config } => {
            cmd_inspect(&drawing, config.as_deref(), cli.json).await
        }
        Commands::Standards {
            region,
            category,
            discipline,
            standards,
        } => cmd_standards(region, category, discipline, standards.as_deref(), cli.json).await,
        Commands::Sample { dir } => cmd_sample(&dir).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?,
        None => PipelineConfig::default(),
    };
    Ok(config.apply_env())
}

async fn load_project(path: &Path) -> Result<Project> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read project file {:?}", path))?;
    let file: ProjectFile = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid project file {:?}", path))?;
    Ok(file.into_project())
}

async fn load_document(path: &Path) -> Result<DrawingDocument> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read drawing {:?}", path))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    Ok(DrawingDocument::from_upload(bytes, file_name)?)
}

fn standards_source(path: Option<&Path>) -> Arc<dyn StandardsSource> {
    match path {
        Some(path) => Arc::new(FileStandards::new(path)),
        None => Arc::new(EmbeddedStandards),
    }
}

fn print_event(event: &ProgressEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
    } else {
        println!("  [{:>3}%] {:<16} {}", event.progress, event.stage, event.status);
    }
}

async fn cmd_run(
    drawing: &Path,
    project_path: &Path,
    standards: Option<&Path>,
    out: &Path,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let project = load_project(project_path).await?;
    let document = load_document(drawing).await?;

    if !json {
        println!("Project: {} ({}, {})", project.name, project.category, project.region);
        println!("Drawing: {:?}", drawing);
        println!();
    }

    let orchestrator =
        Orchestrator::new(config).with_standards_source(standards_source(standards));
    let handle = orchestrator
        .start(project, document)
        .context("Failed to start pipeline run")?;
    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event, json),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "progress output lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let run = handle.wait().await.context("Pipeline run aborted")?;
    let _ = printer.await;

    write_outputs(out, &run).await?;
    if json {
        match &run.report {
            Some(report) => println!("{}", serde_json::to_string_pretty(report)?),
            None => println!("{}", serde_json::to_string_pretty(&run)?),
        }
    } else {
        print_summary(&run, out);
    }

    if run.status == RunStatus::Completed {
        Ok(())
    } else {
        anyhow::bail!("Run {} finished with status {}", run.id, run.status)
    }
}

async fn write_outputs(out: &Path, run: &PipelineRun) -> Result<()> {
    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", out))?;
    for artifact in &run.artifacts {
        let path = out.join(&artifact.file_name);
        tokio::fs::write(&path, &artifact.payload)
            .await
            .with_context(|| format!("Failed to write artifact {:?}", path))?;
    }
    for document in &run.documents {
        let path = out.join(&document.name);
        tokio::fs::write(&path, &document.content)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
    }
    if let Some(report) = &run.report {
        write_results_json(&out.join("results.json"), report)?;
    }
    info!(out = ?out, artifacts = run.artifacts.len(), "outputs written");
    Ok(())
}

fn print_summary(run: &PipelineRun, out: &Path) {
    println!();
    println!("Run ID: {}", run.id);
    println!(
        "Status: {}",
        if run.status == RunStatus::Completed {
            "✓ COMPLETED"
        } else {
            "✗ ERROR"
        }
    );
    if let Some(version) = &run.standards_version {
        println!("Standards: {}", version);
    }
    println!();

    if let Some(report) = &run.report {
        for s in &report.summary {
            let score = s
                .mean_score
                .map(|v| format!("{:.1}", v))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "  {:<18} {}/{} clauses passed, score {}",
                s.discipline.display_name(),
                s.passed,
                s.evaluated,
                score
            );
        }
    }
    match run.project_score {
        Some(score) => println!("\nProject score: {:.1}", score),
        None => println!("\nProject score: n/a"),
    }

    if !run.notices.is_empty() {
        println!("\nNotices:");
        for notice in &run.notices {
            println!("  - {}", notice);
        }
    }
    if !run.errors.is_empty() {
        println!("\nErrors:");
        for error in &run.errors {
            println!("  - {}", error);
        }
    }
    println!("\nOutputs written to {:?}", out);
}

async fn cmd_inspect(drawing: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let document = load_document(drawing).await?;
    let building = tokio::task::spawn_blocking(move || -> Result<_> {
        let geometry = ingest(&document, &config.ingest)?;
        Ok(extract(&geometry, &config.extract)?)
    })
    .await
    .context("Inspection task failed")??;

    if json {
        println!("{}", serde_json::to_string_pretty(&building)?);
        return Ok(());
    }

    for level in &building.levels {
        println!(
            "{} (elevation {:.2} m, storey height {:.2} m)",
            level.name, level.elevation_m, level.storey_height_m
        );
        for room in building.rooms_on_level(level.index) {
            println!(
                "  {:<8} {:<20} {:<14} {:>8.2} m²",
                room.id,
                room.display_name(),
                room.space_type.name(),
                room.area_m2
            );
        }
    }
    println!();
    println!(
        "{} rooms, net floor area {:.2} m², {} adjacencies",
        building.rooms.len(),
        building.net_floor_area_m2(),
        building.adjacency.len()
    );
    Ok(())
}

async fn cmd_standards(
    region: Region,
    category: BuildingCategory,
    discipline: Option<Discipline>,
    standards: Option<&Path>,
    json: bool,
) -> Result<()> {
    let source = standards_source(standards);
    let repository = StandardsRepository::load(source.as_ref())
        .await
        .context("Failed to load standards")?;
    let disciplines = match discipline {
        Some(d) => vec![d],
        None => Discipline::ALL.to_vec(),
    };

    let mut listed = Vec::new();
    for d in disciplines {
        listed.extend(repository.applicable_standards(region, category, d));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    println!(
        "Standards {} for {} in {}: {} clause(s)",
        repository.version(),
        category,
        region,
        listed.len()
    );
    for clause in &listed {
        println!("  {:<24} {}", clause.id, clause.title);
    }
    Ok(())
}

fn sample_project_file() -> ProjectFile {
    ProjectFile {
        name: "Sample Office".to_string(),
        category: BuildingCategory::Office,
        total_area_m2: 1000.0,
        floors: SAMPLE_STOREYS as u32,
        region: Region::Germany,
        disciplines: Discipline::ALL.to_vec(),
    }
}

async fn cmd_sample(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {:?}", dir))?;
    tokio::fs::write(dir.join("sample_office.dxf"), sample_office_dxf()).await?;
    tokio::fs::write(dir.join("sample_office.pdf"), sample_office_pdf()?).await?;
    let project = serde_json::to_string_pretty(&sample_project_file())?;
    tokio::fs::write(dir.join("project.json"), project).await?;

    println!("✓ Sample written to {:?}", dir);
    println!("  tga run --drawing {:?} --project {:?}", dir.join("sample_office.dxf"), dir.join("project.json"));
    Ok(())
}
