// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Repulsor CLI entrypoint.
//!
//! Headless tools for scene definition files; no physics engine is needed.
//!
//! # Usage
//! ```text
//! repulsor validate <FILE>
//! repulsor obstacles <FILE>
//! repulsor scenes <DIR>
//! repulsor settings [--config-dir <DIR>] [--reset]
//! ```
//!
//! Every command accepts `--json` for machine-readable output. The CLI exits
//! with code `0` on success and non-zero on error.

// The CLI is expected to print to stdout.
#![allow(clippy::print_stdout)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use repulsor_app_core::config::ConfigService;
use repulsor_app_core::settings::Settings;
use repulsor_app_core::settings_port::SettingsPort;
use repulsor_config_fs::{FsConfigStore, FsSceneSource};
use repulsor_core::{aggregate, Entity, SceneRegistry};
use repulsor_port::{SceneDefinition, SceneSource};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "repulsor", author, version, about = "Repulsor scene tools")]
struct Cli {
    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a scene file and list its entities.
    Validate {
        /// Scene definition (JSON).
        file: PathBuf,
    },
    /// Show the combined obstacle of every simulated entity.
    Obstacles {
        /// Scene definition (JSON).
        file: PathBuf,
    },
    /// List the scene ids available in a directory.
    Scenes {
        /// Directory holding `<id>.json` files.
        dir: PathBuf,
    },
    /// Print the stored settings, or the defaults when none are stored.
    Settings {
        /// Config directory; defaults to the platform config dir.
        #[arg(long)]
        config_dir: Option<PathBuf>,
        /// Overwrite the stored settings with the defaults first.
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Debug, Serialize)]
struct EntityRow {
    id: i32,
    name: String,
    vertices: usize,
    triangles: usize,
    interactive: bool,
    simulated: bool,
    obstacle_source: bool,
}

impl<M> From<&Entity<M>> for EntityRow {
    fn from(entity: &Entity<M>) -> Self {
        Self {
            id: entity.id().0,
            name: entity.unique_name().to_owned(),
            vertices: entity.vertex_count(),
            triangles: entity.simplices().len(),
            interactive: entity.is_interactive(),
            simulated: entity.is_simulated(),
            obstacle_source: entity.is_obstacle_source(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ObstacleRow {
    owner: String,
    sources: Vec<String>,
    vertices: usize,
    triangles: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Validate { file } => validate(&file, cli.json),
        Command::Obstacles { file } => obstacles(&file, cli.json),
        Command::Scenes { dir } => scenes(dir, cli.json),
        Command::Settings { config_dir, reset } => settings(config_dir, reset, cli.json),
    }
}

/// Reads and validates `file`, returning a registry without engine meshes.
fn load_static(file: &Path) -> Result<SceneRegistry<()>> {
    let definition: SceneDefinition = FsSceneSource::read_file(file)
        .with_context(|| format!("failed to read scene {}", file.display()))?;
    let mut registry = SceneRegistry::new();
    registry
        .load_with(definition, |_| Ok(()))
        .with_context(|| format!("invalid scene {}", file.display()))?;
    debug!(entities = registry.len(), "scene loaded");
    Ok(registry)
}

fn validate(file: &Path, json: bool) -> Result<()> {
    let registry = load_static(file)?;
    let rows: Vec<EntityRow> = registry.entities().iter().map(EntityRow::from).collect();
    let name = registry
        .definition()
        .map(|d| d.name.clone())
        .unwrap_or_default();
    info!(scene = %name, entities = rows.len(), "scene is valid");

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "scene": name, "entities": rows }))?
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Id", "Name", "Vertices", "Triangles", "Flags"]);
    for row in &rows {
        table.add_row(vec![
            row.id.to_string(),
            row.name.clone(),
            row.vertices.to_string(),
            row.triangles.to_string(),
            flags(row),
        ]);
    }
    println!("scene '{name}' is valid ({} entities)", rows.len());
    println!("{table}");
    Ok(())
}

fn flags(row: &EntityRow) -> String {
    [
        (row.interactive, 'I'),
        (row.simulated, 'S'),
        (row.obstacle_source, 'O'),
    ]
    .iter()
    .map(|&(set, c)| if set { c } else { '-' })
    .collect()
}

fn obstacles(file: &Path, json: bool) -> Result<()> {
    let registry = load_static(file)?;
    let mut rows = Vec::new();
    for owner in registry.entities().iter().filter(|e| e.is_simulated()) {
        let geometry = aggregate(owner.id(), registry.entities())?;
        let sources = registry
            .entities()
            .iter()
            .filter(|e| owner.obstacle_sources().selects(owner.id(), *e) && !e.is_geometry_empty())
            .map(|e| e.unique_name().to_owned())
            .collect();
        rows.push(ObstacleRow {
            owner: owner.unique_name().to_owned(),
            sources,
            vertices: geometry.vertices.len(),
            triangles: geometry.simplices.len(),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Owner", "Sources", "Vertices", "Triangles"]);
    for row in &rows {
        let sources = if row.sources.is_empty() {
            "(none)".to_owned()
        } else {
            row.sources.join(", ")
        };
        table.add_row(vec![
            row.owner.clone(),
            sources,
            row.vertices.to_string(),
            row.triangles.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn scenes(dir: PathBuf, json: bool) -> Result<()> {
    let source = FsSceneSource::new(dir);
    let ids = source
        .available_scenes()
        .with_context(|| format!("failed to list {}", source.dir().display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
    } else {
        for id in ids {
            println!("{id}");
        }
    }
    Ok(())
}

fn settings(config_dir: Option<PathBuf>, reset: bool, json: bool) -> Result<()> {
    let store = match config_dir {
        Some(dir) => FsConfigStore::with_base(dir)?,
        None => FsConfigStore::new()?,
    };
    let base = store.base().to_path_buf();
    let service = ConfigService::new(store);
    if reset {
        service.save_settings(&Settings::default())?;
        info!(dir = %base.display(), "settings reset");
    }
    let settings = service.load_settings_or_default()?;
    if !json {
        println!("# {}", base.display());
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
