mod config;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use taskledger_core::{Database, IterationStore, ProjectStore, RoadmapStore};

#[derive(Parser)]
#[command(name = "tl")]
#[command(about = "Maintenance commands for taskledger project stores")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the project store if needed and bring its schema up to date
    Migrate {
        /// Project name (defaults to the active project)
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Show schema version, project code, active roadmap and current iteration
    Status {
        /// Project name (defaults to the active project)
        #[arg(short, long)]
        project: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Migrate the store, then import one-file-per-task JSON from DIR
    Import {
        /// Directory holding the task files
        dir: PathBuf,

        /// Project name (defaults to the active project)
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Make NAME the active project
    Use { name: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "taskledger=info,taskledger_core=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Migrate { project } => {
            let project = config.resolve_project(project.as_deref())?;
            let path = config.store_path(&project)?;
            let db = Database::open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            let report = db
                .migrate()
                .with_context(|| format!("migrating {}", path.display()))?;
            match report.from {
                Some(from) if report.applied.is_empty() && from == report.to => {
                    tracing::info!(project = %project, version = report.to, "schema already current");
                }
                from => {
                    tracing::info!(
                        project = %project,
                        from = ?from,
                        to = report.to,
                        steps = ?report.applied,
                        "schema migrated"
                    );
                }
            }
        }
        Commands::Status { project, json } => {
            let project = config.resolve_project(project.as_deref())?;
            let path = config.store_path(&project)?;
            if !path.exists() {
                bail!("project '{project}' has no store yet; run `tl migrate --project {project}`");
            }
            let db = Database::open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            let schema = db.migration_status()?;

            let (code, roadmap, iteration) = if schema.is_current() {
                (
                    Some(db.project_code()?),
                    db.active_roadmap()?.map(|r| r.id),
                    db.current_iteration()?.map(|i| i.number),
                )
            } else {
                (None, None, None)
            };

            if json {
                let out = serde_json::json!({
                    "project": project,
                    "path": path,
                    "schema": schema,
                    "project_code": code,
                    "active_roadmap": roadmap,
                    "current_iteration": iteration,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("project:           {project}");
                println!("store:             {}", path.display());
                match schema.version {
                    Some(v) => println!("schema version:    {v} (target {})", schema.target),
                    None => println!("schema version:    empty (target {})", schema.target),
                }
                if !schema.is_current() {
                    println!("pending steps:     {:?}; run `tl migrate`", schema.pending);
                    return Ok(());
                }
                println!("project code:      {}", code.unwrap_or_default());
                println!("active roadmap:    {}", roadmap.as_deref().unwrap_or("none"));
                match iteration {
                    Some(n) => println!("current iteration: {n}"),
                    None => println!("current iteration: none"),
                }
            }
        }
        Commands::Import { dir, project } => {
            let project = config.resolve_project(project.as_deref())?;
            let path = config.store_path(&project)?;
            let db = Database::open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            db.migrate()
                .with_context(|| format!("migrating {}", path.display()))?;
            let report = db
                .import_legacy_tasks(&dir)
                .with_context(|| format!("importing from {}", dir.display()))?;
            for skipped in &report.skipped {
                tracing::warn!(file = %skipped.display(), "not imported");
            }
            tracing::info!(
                project = %project,
                imported = report.imported.len(),
                skipped = report.skipped.len(),
                "legacy import finished"
            );
        }
        Commands::Use { name } => {
            config.set_active_project(&name)?;
            tracing::info!(project = %name, root = %config.root().display(), "active project set");
        }
    }

    Ok(())
}
