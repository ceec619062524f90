//! Command-line front end: generate, save, load and run skulk levels.
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`, e.g.
//! `RUST_LOG=skulk_mapgen=debug skulk-demo generate --campaign 3`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use skulk_demos::{Heist, LEGEND, Outcome, render};
use skulk_mapgen::{GeneratedLevel, GenerationConfig, SavedLevel, check_level, generate, persist};
use skulk_paths::PoolConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skulk-demo")]
#[command(about = "Generate, inspect and play through skulk levels")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a level and print it
    Generate {
        #[command(flatten)]
        level: LevelArgs,
        /// Write the level to this JSON file
        #[arg(long)]
        save: Option<PathBuf>,
        /// Print the resolved generation config as JSON and exit
        #[arg(long)]
        print_config: bool,
    },

    /// Load a saved level, check it and print it
    Load {
        file: PathBuf,
    },

    /// Run the heist simulation on a generated or saved level
    Run {
        #[command(flatten)]
        level: LevelArgs,
        /// Play a saved level instead of generating one
        #[arg(long)]
        load: Option<PathBuf>,
        /// Give up after this many turns
        #[arg(long, default_value_t = 2000)]
        turns: u32,
        /// Path worker threads
        #[arg(long)]
        workers: Option<usize>,
        /// Print the level every N turns (0 = only at the end)
        #[arg(long, default_value_t = 0)]
        show_every: u32,
    },
}

#[derive(Args)]
struct LevelArgs {
    /// JSON generation config; the flags below override its fields
    #[arg(long, conflicts_with_all = ["campaign", "endless"])]
    config: Option<PathBuf>,
    /// Campaign preset for this level number
    #[arg(long, conflicts_with = "endless")]
    campaign: Option<u32>,
    /// Endless-mode preset for this floor
    #[arg(long)]
    endless: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    width: Option<i32>,
    #[arg(long)]
    height: Option<i32>,
    /// Allow diagonal movement
    #[arg(long)]
    diagonal: bool,
    /// Add a boss arena
    #[arg(long)]
    boss: bool,
}

impl LevelArgs {
    fn resolve(&self) -> Result<GenerationConfig> {
        let mut config = match (&self.config, self.campaign, self.endless) {
            (Some(path), _, _) => {
                let text = read(path)?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            (None, Some(level), _) => GenerationConfig::campaign(level),
            (None, None, Some(floor)) => GenerationConfig::endless(floor),
            (None, None, None) => GenerationConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(w) = self.width {
            config.width = w;
        }
        if let Some(h) = self.height {
            config.height = h;
        }
        config.diagonal_movement |= self.diagonal;
        config.boss_arena |= self.boss;
        Ok(config)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load(path: &Path) -> Result<SavedLevel> {
    let saved = persist::from_json(&read(path)?)
        .with_context(|| format!("loading level {}", path.display()))?;
    info!("loaded {} at {}", path.display(), saved.graph.version());
    Ok(saved)
}

fn summary(level: &GeneratedLevel) -> String {
    let o = &level.objects;
    format!(
        "seed {} | {} rooms | {} attempt(s) | keys {} | locked doors {} | levers {} | doors {} | traps {} | guards {}",
        level.seed,
        level.rooms.len(),
        level.attempts,
        o.keys.len(),
        o.locked_doors.len(),
        o.levers.len(),
        o.doors.len(),
        o.traps.len(),
        o.enemy_spawns.len(),
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate {
            level,
            save,
            print_config,
        } => {
            let config = level.resolve()?;
            if print_config {
                println!("{}", serde_json::to_string_pretty(&config)?);
                return Ok(());
            }
            let generated = generate(&config)?;
            print!("{}", render(&generated.graph, &[]));
            println!("{}", summary(&generated));
            if let Some(path) = save {
                let json = persist::to_json(&generated.graph, &generated.objects)?;
                fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                info!("saved level to {}", path.display());
            }
        }
        Command::Load { file } => {
            let saved = load(&file)?;
            check_level(&saved.graph, &saved.objects)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("{} is not playable", file.display()))?;
            print!("{}", render(&saved.graph, &[]));
            println!("{LEGEND}");
        }
        Command::Run {
            level,
            load: from,
            turns,
            workers,
            show_every,
        } => {
            let config = level.resolve()?;
            let saved = match &from {
                Some(path) => load(path)?,
                None => SavedLevel::from(generate(&config)?),
            };
            let mut pool = PoolConfig::default();
            if let Some(n) = workers {
                pool.workers = n.max(1);
            }
            let mut heist = Heist::new(saved.graph, &saved.objects, config.engine_config(), pool)
                .context("starting path workers")?;

            let outcome = loop {
                if heist.turn() >= turns {
                    break Outcome::OutOfTime;
                }
                if let Some(outcome) = heist.tick() {
                    break outcome;
                }
                if show_every > 0 && heist.turn() % show_every == 0 {
                    println!("turn {}\n{}", heist.turn(), heist.render());
                }
            };

            print!("{}", heist.render());
            for line in heist.log() {
                println!("  {line}");
            }
            let stats = heist.stats();
            println!(
                "{outcome:?} | path queries {} | cache hits {} ({:.0}%) | computed {} | no path {}",
                stats.total_calls,
                stats.cache_hits,
                stats.hit_rate() * 100.0,
                stats.computed,
                stats.no_path,
            );
        }
    }
    Ok(())
}
