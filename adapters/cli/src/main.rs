#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for breeding, playing and reviewing dungeons.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dungeon_forge_core::{GenerationParams, TileGrid};
use dungeon_forge_stage::{self as stage, StageStore};
use dungeon_forge_system_difficulty as difficulty;
use dungeon_forge_system_evolution::{Optimizer, OptimizerConfig};
use dungeon_forge_system_fitness::score;
use dungeon_forge_system_pathfinding::intent_distances;
use dungeon_forge_system_policy::{
    play_stage, EpisodeOutcome, EpisodeReport, PlaySummary, PolicyConfig, TreasureHunter,
};

#[derive(Parser)]
#[command(name = "dungeon-forge")]
#[command(about = "Breed, play and review procedurally generated dungeons")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Breed a batch of dungeons and save them into a stage store
    Generate {
        /// Store root the levels are saved under
        #[arg(long, default_value = "dungeons")]
        out: PathBuf,

        /// Name prefix; levels are saved as <NAME>_<index>
        #[arg(long, default_value = "generated")]
        name: String,

        /// Number of levels to breed
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Parameter record to breed under; defaults apply when absent
        #[arg(long)]
        params: Option<PathBuf>,

        #[command(flatten)]
        optimizer: OptimizerArgs,
    },

    /// Play one stage file with the treasure-hunter agent
    Play {
        /// Stage file to load
        #[arg(long)]
        stage: PathBuf,

        /// Seed for the agent's tie-break stream
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Step budget for the episode
        #[arg(long, default_value_t = 100)]
        max_steps: u32,

        /// Print every step of the walk
        #[arg(long)]
        trace: bool,
    },

    /// Run the closed generate-play-review loop
    Campaign {
        /// Rounds of breeding and review to run
        #[arg(long, default_value_t = 3)]
        rounds: u32,

        /// Levels bred per round
        #[arg(long, default_value_t = 5)]
        batch: usize,

        /// Episodes played per level
        #[arg(long, default_value_t = 4)]
        episodes: u32,

        /// Step budget per episode
        #[arg(long, default_value_t = 100)]
        max_steps: u32,

        /// Parameter record persisted across rounds
        #[arg(long, default_value = "campaign_params.json")]
        params: PathBuf,

        /// Store root the bred levels are saved under
        #[arg(long, default_value = "dungeons")]
        out: PathBuf,

        #[command(flatten)]
        optimizer: OptimizerArgs,
    },
}

/// Optimizer knobs shared by the breeding subcommands.
#[derive(Args)]
struct OptimizerArgs {
    /// Grid width in cells
    #[arg(long, default_value_t = OptimizerConfig::default().width)]
    width: u32,

    /// Grid height in cells
    #[arg(long, default_value_t = OptimizerConfig::default().height)]
    height: u32,

    /// Genomes per generation
    #[arg(long, default_value_t = OptimizerConfig::default().population_size)]
    population: usize,

    /// Generations each search runs for
    #[arg(long, default_value_t = OptimizerConfig::default().generations)]
    generations: u32,

    /// Per-cell mutation probability
    #[arg(long, default_value_t = OptimizerConfig::default().mutation_rate)]
    mutation_rate: f64,

    /// Top genomes carried unchanged between generations
    #[arg(long, default_value_t = OptimizerConfig::default().elite_count)]
    elites: usize,

    /// Genomes sampled per tournament
    #[arg(long, default_value_t = OptimizerConfig::default().tournament_size)]
    tournament: usize,

    /// Base seed all random streams derive from
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl OptimizerArgs {
    fn config(&self) -> OptimizerConfig {
        OptimizerConfig {
            width: self.width,
            height: self.height,
            population_size: self.population,
            generations: self.generations,
            mutation_rate: self.mutation_rate,
            elite_count: self.elites,
            tournament_size: self.tournament,
            seed: self.seed,
        }
    }
}

/// Entry point for the dungeon-forge command-line interface.
fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Generate {
            out,
            name,
            count,
            params,
            optimizer,
        } => generate(&out, &name, count, params.as_deref(), &optimizer),
        Commands::Play {
            stage,
            seed,
            max_steps,
            trace,
        } => play(&stage, seed, max_steps, trace),
        Commands::Campaign {
            rounds,
            batch,
            episodes,
            max_steps,
            params,
            out,
            optimizer,
        } => campaign(rounds, batch, episodes, max_steps, &params, &out, &optimizer),
    }
}

fn generate(
    out: &Path,
    name: &str,
    count: usize,
    params_path: Option<&Path>,
    optimizer: &OptimizerArgs,
) -> Result<()> {
    let params = load_params_or_default(params_path)?;
    let store = StageStore::new(out);
    let levels = Optimizer::new(optimizer.config())
        .generate_batch(&params, count)
        .context("dungeon search produced nothing")?;

    for (index, level) in levels.iter().enumerate() {
        let level_name = format!("{name}_{index}");
        let path = store.save_stage(&level_name, level)?;
        let _ = store.save_params(&level_name, &params)?;
        println!(
            "{level_name} -> {} (score {:.2})",
            path.display(),
            score(level, &params)
        );
        print!("{level}");
    }
    Ok(())
}

fn play(stage_path: &Path, seed: u64, max_steps: u32, trace: bool) -> Result<()> {
    let grid = stage::read_stage(stage_path)?;
    print!("{grid}");

    let config = PolicyConfig::default();
    let report = if trace {
        traced_episode(grid, config, seed, max_steps)?
    } else {
        play_stage(grid, config, seed, max_steps)?
    };

    println!(
        "{:?} after {} step(s): total reward {:.2}, final hp {}",
        report.outcome, report.steps, report.total_reward, report.final_hp
    );
    Ok(())
}

/// Replays one episode step by step, narrating position, chosen intent,
/// reward and the intent-distance vector before each move.
fn traced_episode(
    grid: TileGrid,
    config: PolicyConfig,
    seed: u64,
    max_steps: u32,
) -> Result<EpisodeReport> {
    let mut hunter = TreasureHunter::spawn(&grid, config, seed)?;
    let mut grid = grid;
    let mut total_reward = 0.0;
    let mut steps = 0;

    while steps < max_steps {
        let position = hunter.state().position();
        let distances = intent_distances(&grid, position);
        let intent = hunter.choose(&grid)?;
        let outcome = hunter.apply(intent, grid);
        steps += 1;
        total_reward += outcome.reward;

        let label = intent.map_or_else(|| "hold".to_owned(), |intent| format!("{intent:?}"));
        let mode = if hunter.survival_mode() {
            " [survival]"
        } else {
            ""
        };
        println!(
            "step {steps}: ({}, {}) {label}{mode} reward {:+.3} hp {} distances {distances:?}",
            position.column(),
            position.row(),
            outcome.reward,
            outcome.state.hp()
        );

        if outcome.terminated {
            let ending = if outcome.state.hp() > 0 {
                EpisodeOutcome::Victory
            } else {
                EpisodeOutcome::Death
            };
            return Ok(EpisodeReport {
                total_reward,
                steps,
                outcome: ending,
                final_hp: outcome.state.hp(),
            });
        }
        grid = outcome.grid;
    }

    Ok(EpisodeReport {
        total_reward,
        steps,
        outcome: EpisodeOutcome::OutOfSteps,
        final_hp: hunter.state().hp(),
    })
}

fn campaign(
    rounds: u32,
    batch: usize,
    episodes: u32,
    max_steps: u32,
    params_path: &Path,
    out: &Path,
    optimizer: &OptimizerArgs,
) -> Result<()> {
    let mut params = if params_path.exists() {
        stage::read_params(params_path)?
    } else {
        GenerationParams::default()
    };
    let store = StageStore::new(out);
    let policy_config = PolicyConfig::default();

    for round in 0..rounds {
        let config = OptimizerConfig {
            seed: optimizer.seed.wrapping_add(u64::from(round)),
            ..optimizer.config()
        };
        let levels = Optimizer::new(config)
            .generate_batch(&params, batch)
            .with_context(|| format!("round {round}: dungeon search produced nothing"))?;

        let mut reports = Vec::new();
        let mut episode_seed = config.seed;
        for (index, level) in levels.iter().enumerate() {
            let level_name = format!("round{round}_{index}");
            let _ = store.save_stage(&level_name, level)?;
            let _ = store.save_params(&level_name, &params)?;
            for _ in 0..episodes {
                episode_seed = episode_seed.wrapping_add(1);
                reports.push(play_stage(level.clone(), policy_config, episode_seed, max_steps)?);
            }
        }

        let summary = PlaySummary::from_reports(&reports);
        params = difficulty::update(params, summary.win_rate);
        println!(
            "round {round}: {} episode(s), win rate {:.2}, avg reward {:.2} -> {}",
            summary.episodes,
            summary.win_rate,
            summary.average_reward,
            describe(difficulty::assess(summary.win_rate))
        );
        stage::write_params(params_path, &params)?;
    }

    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}

fn describe(assessment: difficulty::Assessment) -> &'static str {
    match assessment {
        difficulty::Assessment::TooEasy => "raising difficulty",
        difficulty::Assessment::Balanced => "holding difficulty",
        difficulty::Assessment::TooHard => "easing difficulty",
    }
}

fn load_params_or_default(path: Option<&Path>) -> Result<GenerationParams> {
    match path {
        Some(path) => stage::read_params(path)
            .with_context(|| format!("could not load parameter record {}", path.display())),
        None => Ok(GenerationParams::default()),
    }
}
