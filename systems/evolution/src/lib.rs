#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Evolutionary dungeon optimizer.
//!
//! The optimizer searches the space of tile grids with a genetic algorithm:
//! a seeded population of candidate layouts is scored by the fitness oracle,
//! the best are carried forward unchanged, and the rest of the next
//! generation is bred through tournament selection, one-seam crossover and
//! per-cell mutation. Every candidate passes through a repair pass so the
//! population never drifts away from the single-entrance, single-exit
//! contract.
//!
//! All randomness flows from one `u64` seed. Per-purpose seeds are derived
//! by hashing the base seed with a label, so the initialization stream and
//! each generation's breeding stream are independent and a run can be
//! replayed exactly. Fitness scoring is pure and evaluated in parallel;
//! the best-of-generation reduction walks scores in population order, so
//! parallel and serial runs pick the same winner.

mod breeding;

use dungeon_forge_core::{GenerationParams, TileGrid};
use dungeon_forge_system_fitness::{score, MISSING_ENDPOINT_PENALTY};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use thiserror::Error;

const POPULATION_SEED_LABEL: &str = "optimizer.population";
const BREEDING_SEED_PREFIX: &str = "optimizer.breeding";
const BATCH_SEED_PREFIX: &str = "optimizer.batch";

/// Knobs controlling the shape of the search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    /// Width of every generated grid, in cells.
    pub width: u32,
    /// Height of every generated grid, in cells.
    pub height: u32,
    /// Number of genomes alive in each generation.
    pub population_size: usize,
    /// Number of generations the search runs for.
    pub generations: u32,
    /// Per-cell probability that mutation rewrites a tile.
    pub mutation_rate: f64,
    /// Number of top genomes copied unchanged into the next generation.
    pub elite_count: usize,
    /// Number of genomes sampled, without replacement, per tournament.
    pub tournament_size: usize,
    /// Base seed every random stream is derived from.
    pub seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            width: 9,
            height: 9,
            population_size: 150,
            generations: 300,
            mutation_rate: 0.15,
            elite_count: 10,
            tournament_size: 5,
            seed: 0,
        }
    }
}

/// Failure to produce any dungeon worth returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// No genome ever scored above the missing-endpoint floor. This takes
    /// an empty population or a zero-generation run; any repaired genome
    /// clears the floor once it is scored.
    #[error("no viable dungeon emerged after {generations} generation(s)")]
    NoViableDungeon {
        /// How many generations the search ran for.
        generations: u32,
    },
}

/// Genetic-algorithm search over dungeon layouts.
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    /// Creates an optimizer with the given knobs.
    #[must_use]
    pub const fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Read access to the configured knobs.
    #[must_use]
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Runs the full search and returns the best dungeon ever scored.
    ///
    /// The best genome is tracked across all generations, not just the
    /// final one; a later generation replaces it only by scoring strictly
    /// higher.
    pub fn generate(&self, params: &GenerationParams) -> Result<TileGrid, GenerationError> {
        let config = &self.config;
        let base_seed = derive_base_seed(config.seed, config.width, config.height);
        let mut population_rng =
            ChaCha8Rng::seed_from_u64(derive_labeled_seed(base_seed, POPULATION_SEED_LABEL));
        let mut population = breeding::initial_population(
            config.width,
            config.height,
            config.population_size,
            params,
            &mut population_rng,
        );

        let mut best_score = MISSING_ENDPOINT_PENALTY;
        let mut best_genome = None;

        for generation in 0..config.generations {
            let scores = score_population(&population, params);
            if let Some((index, generation_best)) = best_of_generation(&scores) {
                if generation_best > best_score {
                    best_score = generation_best;
                    best_genome = Some(population[index].clone());
                }
            }
            let mut breeding_rng =
                ChaCha8Rng::seed_from_u64(derive_generation_seed(base_seed, generation));
            population = next_generation(&population, &scores, config, params, &mut breeding_rng);
        }

        best_genome.ok_or(GenerationError::NoViableDungeon {
            generations: config.generations,
        })
    }

    /// Runs one independent search per requested level.
    ///
    /// Each member's seed is derived from the base seed and its index, so a
    /// batch is reproducible as a whole while its levels differ from each
    /// other.
    pub fn generate_batch(
        &self,
        params: &GenerationParams,
        count: usize,
    ) -> Result<Vec<TileGrid>, GenerationError> {
        let base_seed = derive_base_seed(self.config.seed, self.config.width, self.config.height);
        (0..count)
            .map(|member| {
                let config = OptimizerConfig {
                    seed: derive_member_seed(base_seed, member as u64),
                    ..self.config
                };
                Optimizer::new(config).generate(params)
            })
            .collect()
    }
}

/// Scores every genome in parallel. Scoring is a pure function of the
/// genome and the params, so the order of evaluation cannot leak into the
/// results.
fn score_population(population: &[TileGrid], params: &GenerationParams) -> Vec<f64> {
    population
        .par_iter()
        .map(|genome| score(genome, params))
        .collect()
}

/// Index and score of the best genome, first in population order on ties.
fn best_of_generation(scores: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &candidate) in scores.iter().enumerate() {
        let improves = match best {
            None => true,
            Some((_, incumbent)) => candidate > incumbent,
        };
        if improves {
            best = Some((index, candidate));
        }
    }
    best
}

/// Breeds the next generation: elites first, then tournament-selected
/// parents crossed, mutated, and repaired until the population is full.
fn next_generation<R: Rng>(
    population: &[TileGrid],
    scores: &[f64],
    config: &OptimizerConfig,
    params: &GenerationParams,
    rng: &mut R,
) -> Vec<TileGrid> {
    if population.is_empty() {
        return Vec::new();
    }

    let elite_count = config.elite_count.min(population.len());
    let mut ranked: Vec<usize> = (0..population.len()).collect();
    ranked.sort_by(|left, right| scores[*right].total_cmp(&scores[*left]));

    let mut next: Vec<TileGrid> = ranked[..elite_count]
        .iter()
        .map(|&index| population[index].clone())
        .collect();
    while next.len() < config.population_size {
        let first = tournament(population, scores, config.tournament_size, rng);
        let second = tournament(population, scores, config.tournament_size, rng);
        let mut child = breeding::crossover(first, second, rng);
        breeding::repair(&mut child, params);
        breeding::mutate(&mut child, params, config.mutation_rate, rng);
        breeding::repair(&mut child, params);
        next.push(child);
    }
    next
}

/// Samples entrants without replacement and returns the highest scorer,
/// first sampled on ties.
fn tournament<'pool, R: Rng>(
    population: &'pool [TileGrid],
    scores: &[f64],
    size: usize,
    rng: &mut R,
) -> &'pool TileGrid {
    let entrants = index::sample(rng, population.len(), size.clamp(1, population.len()));
    let mut winner = entrants.index(0);
    for position in 1..entrants.len() {
        let challenger = entrants.index(position);
        if scores[challenger] > scores[winner] {
            winner = challenger;
        }
    }
    &population[winner]
}

fn derive_base_seed(global_seed: u64, width: u32, height: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(global_seed.to_le_bytes());
    hasher.update(width.to_le_bytes());
    hasher.update(height.to_le_bytes());
    finalize_seed(hasher)
}

fn derive_labeled_seed(base_seed: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update(label.as_bytes());
    finalize_seed(hasher)
}

fn derive_generation_seed(base_seed: u64, generation: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update(BREEDING_SEED_PREFIX.as_bytes());
    hasher.update(generation.to_le_bytes());
    finalize_seed(hasher)
}

fn derive_member_seed(base_seed: u64, member: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update(BATCH_SEED_PREFIX.as_bytes());
    hasher.update(member.to_le_bytes());
    finalize_seed(hasher)
}

fn finalize_seed(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8]
        .try_into()
        .expect("sha256 digest slice length");
    u64::from_le_bytes(bytes)
}
