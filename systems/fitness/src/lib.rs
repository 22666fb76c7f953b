#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Level-quality oracle for the genetic optimizer.
//!
//! [`score`] folds a dungeon grid into a single number the optimizer climbs.
//! The terms reward a Start-to-Exit path of a designer-chosen length, broad
//! connectivity, spread-out monsters that still threaten the main path, and
//! entity counts near their targets; they punish disconnected levels, dead
//! ends, and wall ratios outside the playable band. Mid-evolution genomes
//! are legal input, so the oracle never assumes a well-formed level.
//!
//! The exact constants are part of the contract between the optimizer and
//! the difficulty controller; tests pin them.

use dungeon_forge_core::{Direction, GenerationParams, Position, Tile, TileGrid};
use dungeon_forge_system_pathfinding::{bfs, BfsField};

/// Score for a grid with no Start or no Exit. Also the floor the optimizer
/// measures improvement against.
pub const MISSING_ENDPOINT_PENALTY: f64 = -1000.0;

const DISCONNECTED_PENALTY: f64 = 500.0;
const PATH_REWARD_CAP: f64 = 30.0;
const PATH_REWARD_PER_STEP: f64 = 2.0;
const SHORT_PATH_PENALTY_PER_STEP: f64 = 5.0;
const CONNECTIVITY_WEIGHT: f64 = 25.0;
const MONSTER_SPACING_CAP: f64 = 20.0;
const MONSTER_SPACING_PER_CELL: f64 = 4.0;
const MONSTER_THREAT_BONUS: f64 = 3.0;
const MONSTER_THREAT_RADIUS: u32 = 2;
const MONSTER_OVERFLOW_SLACK: u32 = 2;
const MONSTER_OVERFLOW_PENALTY: f64 = 50.0;
const POTION_SHAPING_BASE: f64 = 10.0;
const POTION_SHAPING_FALLOFF: f64 = 3.0;
const TREASURE_SHAPING_BASE: f64 = 5.0;
const TREASURE_SHAPING_FALLOFF: f64 = 2.0;
const MONSTER_SHAPING_BASE: f64 = 10.0;
const MONSTER_SHAPING_FALLOFF: f64 = 5.0;
const DEAD_END_PENALTY: f64 = 2.0;
const WALL_RATIO_LOW: f64 = 0.50;
const WALL_RATIO_HIGH: f64 = 0.65;
const WALL_RATIO_CENTER: f64 = 0.575;
const WALL_RATIO_BONUS: f64 = 15.0;
const WALL_RATIO_PENALTY_WEIGHT: f64 = 30.0;
const LONG_PATH_MARGIN: u32 = 5;
const LONG_PATH_CAP: f64 = 10.0;
const LONG_PATH_PER_STEP: f64 = 1.5;

/// Scores a dungeon grid against the generation parameters.
///
/// Grids missing a Start or an Exit short-circuit to
/// [`MISSING_ENDPOINT_PENALTY`]; every other grid accumulates the full
/// term stack. The grid is never mutated.
#[must_use]
pub fn score(grid: &TileGrid, params: &GenerationParams) -> f64 {
    let Some(start) = grid.find_first(Tile::Start) else {
        return MISSING_ENDPOINT_PENALTY;
    };
    let Some(exit) = grid.find_first(Tile::Exit) else {
        return MISSING_ENDPOINT_PENALTY;
    };

    let mut fitness = 0.0;

    // Monsters stay passable here: the main path may run straight through
    // one, and the threat term rewards exactly that.
    let field = bfs(grid, start, false);
    let path_length = field.distance(exit);

    match path_length {
        None => fitness -= DISCONNECTED_PENALTY,
        Some(length) => {
            if length >= params.min_path_length {
                fitness += PATH_REWARD_CAP.min(PATH_REWARD_PER_STEP * f64::from(length));
            } else {
                fitness -=
                    SHORT_PATH_PENALTY_PER_STEP * f64::from(params.min_path_length - length);
            }
        }
    }

    let open_cells = grid.cell_count() - grid.count(Tile::Wall);
    if open_cells > 0 {
        fitness += CONNECTIVITY_WEIGHT * field.visited_count() as f64 / open_cells as f64;
    }

    let monsters = grid.positions_of(Tile::Monster);
    if let Some(spacing) = min_monster_spacing(&monsters) {
        fitness += MONSTER_SPACING_CAP.min(MONSTER_SPACING_PER_CELL * f64::from(spacing));
    }
    if path_length.is_some() {
        let path = path_positions(&field, start, exit);
        let threatening = monsters
            .iter()
            .filter(|monster| {
                path.iter()
                    .any(|cell| cell.manhattan_distance(**monster) <= MONSTER_THREAT_RADIUS)
            })
            .count();
        fitness += MONSTER_THREAT_BONUS * threatening as f64;
    }

    let monster_cap = (params.target_monster_count + MONSTER_OVERFLOW_SLACK) as usize;
    if monsters.len() > monster_cap {
        fitness -= MONSTER_OVERFLOW_PENALTY * (monsters.len() - monster_cap) as f64;
    }

    fitness += count_shaping(
        grid.count(Tile::Potion),
        params.target_potion_count,
        POTION_SHAPING_BASE,
        POTION_SHAPING_FALLOFF,
    );
    fitness += count_shaping(
        grid.count(Tile::Treasure),
        params.target_treasure_count,
        TREASURE_SHAPING_BASE,
        TREASURE_SHAPING_FALLOFF,
    );
    fitness += count_shaping(
        monsters.len(),
        params.target_monster_count,
        MONSTER_SHAPING_BASE,
        MONSTER_SHAPING_FALLOFF,
    );

    fitness -= DEAD_END_PENALTY * dead_end_count(grid) as f64;

    let wall_ratio = grid.count(Tile::Wall) as f64 / grid.cell_count() as f64;
    if (WALL_RATIO_LOW..=WALL_RATIO_HIGH).contains(&wall_ratio) {
        fitness += WALL_RATIO_BONUS;
    } else {
        fitness -= WALL_RATIO_PENALTY_WEIGHT * (WALL_RATIO_CENTER - wall_ratio).abs();
    }

    if let Some(length) = path_length {
        if length > params.min_path_length + LONG_PATH_MARGIN {
            fitness += LONG_PATH_CAP
                .min(LONG_PATH_PER_STEP * f64::from(length - params.min_path_length));
        }
    }

    fitness
}

/// Smallest pairwise Manhattan distance between monsters, `None` with
/// fewer than two of them.
fn min_monster_spacing(monsters: &[Position]) -> Option<u32> {
    let mut smallest: Option<u32> = None;
    for (index, first) in monsters.iter().enumerate() {
        for second in &monsters[index + 1..] {
            let distance = first.manhattan_distance(*second);
            if smallest.map_or(true, |known| distance < known) {
                smallest = Some(distance);
            }
        }
    }
    smallest
}

/// Concrete Start-to-Exit path recovered from the search field, both
/// endpoints included. Empty when the exit was never reached.
fn path_positions(field: &BfsField, start: Position, exit: Position) -> Vec<Position> {
    if field.distance(exit).is_none() {
        return Vec::new();
    }
    let mut path = vec![exit];
    let mut cursor = exit;
    while cursor != start {
        let Some(previous) = field.predecessor(cursor) else {
            return Vec::new();
        };
        path.push(previous);
        cursor = previous;
    }
    path.reverse();
    path
}

/// Non-Wall cells with at least three of their four neighbors blocked
/// (walls or the grid edge).
fn dead_end_count(grid: &TileGrid) -> usize {
    grid.cells()
        .filter(|(position, tile)| {
            if *tile == Tile::Wall {
                return false;
            }
            let blocked = Direction::ALL
                .into_iter()
                .filter(|direction| {
                    match grid
                        .neighbor(*position, *direction)
                        .and_then(|neighbor| grid.get(neighbor))
                    {
                        Some(Tile::Wall) | None => true,
                        Some(_) => false,
                    }
                })
                .count();
            blocked >= 3
        })
        .count()
}

/// Linear falloff bonus peaking when `count` hits `target`, floored at
/// zero.
fn count_shaping(count: usize, target: u32, base: f64, falloff: f64) -> f64 {
    let deviation = (count as i64 - i64::from(target)).unsigned_abs() as f64;
    (base - falloff * deviation).max(0.0)
}
