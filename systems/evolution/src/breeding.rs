//! Genome construction and variation operators for the dungeon optimizer.
//!
//! A genome is a full [`TileGrid`]. Initial genomes come in two flavours:
//! structured layouts (corridors and rooms carved out of solid rock) and
//! uniformly random tile soup. Crossover splices two parents along a
//! horizontal seam, mutation rewrites individual cells, and [`repair`]
//! restores the structural guarantees every genome must keep: exactly one
//! entrance, exactly one exit, and entity counts within their caps.

use dungeon_forge_core::{Direction, GenerationParams, Position, Tile, TileGrid};
use dungeon_forge_system_pathfinding::bfs;
use rand::Rng;

/// Fraction of the initial population built from corridors and rooms; the
/// remainder is uniform random soup.
const STRUCTURED_SHARE: f64 = 0.7;

/// Probability that a corridor step also floors a given neighbouring cell.
const CORRIDOR_WIDEN_CHANCE: f64 = 0.3;

/// Probability that a connecting walk takes a random detour instead of the
/// greedy step toward the exit.
const CARVE_DETOUR_CHANCE: f64 = 0.2;

/// Probability that a terrain mutation on a wall opens it into floor.
const WALL_CLEAR_CHANCE: f64 = 0.3;

/// Mutation roll bands. A roll below `TERRAIN_ROLL` toggles wall/floor,
/// the next three bands place entities, and everything above
/// `POTION_ROLL` clears the cell to floor.
const TERRAIN_ROLL: f64 = 0.3;
const MONSTER_ROLL: f64 = 0.4;
const TREASURE_ROLL: f64 = 0.5;
const POTION_ROLL: f64 = 0.6;

/// Monsters may exceed their target by this much before repair trims them.
const MONSTER_CAP_SLACK: u32 = 2;
/// Treasures may exceed their target by this much before repair trims them.
const TREASURE_CAP_SLACK: u32 = 1;
/// Potions may exceed their target by this much before repair trims them.
const POTION_CAP_SLACK: u32 = 1;

/// Random probes attempted when looking for a free floor cell.
const FLOOR_PROBE_ATTEMPTS: u32 = 100;

/// Column and row deltas for a single carving step.
const STEP_DELTAS: [(i64, i64); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// Cumulative tile weights for random genomes: wall 0.3, floor 0.4,
/// treasure 0.1, monster 0.1, potion 0.1.
const RANDOM_WALL_BAND: f64 = 0.3;
const RANDOM_FLOOR_BAND: f64 = 0.7;
const RANDOM_TREASURE_BAND: f64 = 0.8;
const RANDOM_MONSTER_BAND: f64 = 0.9;

/// Builds the initial population. The leading share is structured, the rest
/// random, and every genome is repaired before it enters the gene pool.
pub(crate) fn initial_population<R: Rng>(
    width: u32,
    height: u32,
    population_size: usize,
    params: &GenerationParams,
    rng: &mut R,
) -> Vec<TileGrid> {
    let structured = (population_size as f64 * STRUCTURED_SHARE) as usize;
    (0..population_size)
        .map(|slot| {
            let mut genome = if slot < structured {
                structured_genome(width, height, params, rng)
            } else {
                random_genome(width, height, params, rng)
            };
            repair(&mut genome, params);
            genome
        })
        .collect()
}

/// Carves corridors and rooms out of solid rock, pins the entrance and exit
/// to their usual corners, connects them if the carving left them apart, and
/// scatters the requested entities.
pub(crate) fn structured_genome<R: Rng>(
    width: u32,
    height: u32,
    params: &GenerationParams,
    rng: &mut R,
) -> TileGrid {
    let mut genome = TileGrid::filled(width, height, Tile::Wall);

    if width >= 3 && height >= 3 {
        let corridors = rng.gen_range(3..=5);
        for _ in 0..corridors {
            carve_corridor(&mut genome, rng);
        }
    }
    if width >= 5 && height >= 5 {
        let rooms = rng.gen_range(2..=4);
        for _ in 0..rooms {
            carve_room(&mut genome, rng);
        }
    }

    let start_options = [
        Position::new(1, 1),
        Position::new(width.saturating_sub(2), 1),
        Position::new(1, height.saturating_sub(2)),
    ];
    let exit_options = [
        Position::new(width.saturating_sub(2), height.saturating_sub(2)),
        Position::new(width.saturating_sub(2), height / 2),
    ];
    let start = choose(&start_options, rng);
    let exit = choose(&exit_options, rng);
    genome.set(start, Tile::Start);
    genome.set(exit, Tile::Exit);

    if bfs(&genome, start, false).distance(exit).is_none() {
        carve_connection(&mut genome, start, exit, rng);
    }

    place_entities(&mut genome, params, rng);
    genome
}

/// Fills every cell from a weighted tile distribution, pins the entrance and
/// exit to the grid border, and tops up the requested entities.
pub(crate) fn random_genome<R: Rng>(
    width: u32,
    height: u32,
    params: &GenerationParams,
    rng: &mut R,
) -> TileGrid {
    let mut genome = TileGrid::filled(width, height, Tile::Floor);
    for row in 0..height {
        for column in 0..width {
            let roll: f64 = rng.gen();
            let tile = if roll < RANDOM_WALL_BAND {
                Tile::Wall
            } else if roll < RANDOM_FLOOR_BAND {
                Tile::Floor
            } else if roll < RANDOM_TREASURE_BAND {
                Tile::Treasure
            } else if roll < RANDOM_MONSTER_BAND {
                Tile::Monster
            } else {
                Tile::Potion
            };
            genome.set(Position::new(column, row), tile);
        }
    }

    let start_options = [
        Position::new(0, 0),
        Position::new(width.saturating_sub(1), 0),
        Position::new(0, height.saturating_sub(1)),
    ];
    let exit_options = [
        Position::new(width.saturating_sub(1), height.saturating_sub(1)),
        Position::new(width.saturating_sub(1), height / 2),
    ];
    genome.set(choose(&start_options, rng), Tile::Start);
    genome.set(choose(&exit_options, rng), Tile::Exit);

    place_entities(&mut genome, params, rng);
    genome
}

/// Splices two parents along a horizontal seam: rows above the seam come
/// from the first parent, the seam and everything below from the second.
/// Grids too short for an interior seam are cloned from the first parent.
pub(crate) fn crossover<R: Rng>(first: &TileGrid, second: &TileGrid, rng: &mut R) -> TileGrid {
    let width = first.width();
    let height = first.height();
    let mut child = first.clone();
    if height < 3 {
        return child;
    }
    let seam = rng.gen_range(1..height - 1);
    for row in seam..height {
        for column in 0..width {
            let position = Position::new(column, row);
            if let Some(tile) = second.get(position) {
                child.set(position, tile);
            }
        }
    }
    child
}

/// Rewrites individual cells with probability `rate`. Entrance and exit
/// cells are never touched, and entity placements respect the same caps
/// that [`repair`] enforces. A roll landing in a band whose entity is
/// already at its cap falls through to the next band.
pub(crate) fn mutate<R: Rng>(
    genome: &mut TileGrid,
    params: &GenerationParams,
    rate: f64,
    rng: &mut R,
) {
    let mut monsters = genome.count(Tile::Monster);
    let mut treasures = genome.count(Tile::Treasure);
    let mut potions = genome.count(Tile::Potion);
    let monster_cap = entity_cap(params.target_monster_count, MONSTER_CAP_SLACK);
    let treasure_cap = entity_cap(params.target_treasure_count, TREASURE_CAP_SLACK);
    let potion_cap = entity_cap(params.target_potion_count, POTION_CAP_SLACK);

    for row in 0..genome.height() {
        for column in 0..genome.width() {
            let position = Position::new(column, row);
            let Some(tile) = genome.get(position) else {
                continue;
            };
            if tile == Tile::Start || tile == Tile::Exit {
                continue;
            }
            if rng.gen::<f64>() >= rate {
                continue;
            }
            let roll: f64 = rng.gen();
            let replacement = if roll < TERRAIN_ROLL {
                if tile == Tile::Wall {
                    (rng.gen::<f64>() < WALL_CLEAR_CHANCE).then_some(Tile::Floor)
                } else {
                    Some(Tile::Wall)
                }
            } else if roll < MONSTER_ROLL && monsters < monster_cap {
                Some(Tile::Monster)
            } else if roll < TREASURE_ROLL && treasures < treasure_cap {
                Some(Tile::Treasure)
            } else if roll < POTION_ROLL && potions < potion_cap {
                Some(Tile::Potion)
            } else if tile != Tile::Wall {
                Some(Tile::Floor)
            } else {
                None
            };
            let Some(new_tile) = replacement else {
                continue;
            };
            if new_tile == tile {
                continue;
            }
            match tile {
                Tile::Monster => monsters -= 1,
                Tile::Treasure => treasures -= 1,
                Tile::Potion => potions -= 1,
                _ => {}
            }
            match new_tile {
                Tile::Monster => monsters += 1,
                Tile::Treasure => treasures += 1,
                Tile::Potion => potions += 1,
                _ => {}
            }
            genome.set(position, new_tile);
        }
    }
}

/// Restores the structural guarantees of a genome in place. Duplicate
/// entrances and exits are demoted to floor keeping the first in scan
/// order, missing ones are re-seated on the grid edge, and entities beyond
/// their caps are demoted in scan order. Running repair twice is a no-op.
pub(crate) fn repair(genome: &mut TileGrid, params: &GenerationParams) {
    if genome.width() == 0 || genome.height() == 0 {
        return;
    }

    dedupe(genome, Tile::Start);
    if genome.count(Tile::Start) == 0 {
        seat_start(genome);
    }
    dedupe(genome, Tile::Exit);
    if genome.count(Tile::Exit) == 0 {
        seat_exit(genome);
    }

    trim_entity(
        genome,
        Tile::Monster,
        entity_cap(params.target_monster_count, MONSTER_CAP_SLACK),
    );
    trim_entity(
        genome,
        Tile::Treasure,
        entity_cap(params.target_treasure_count, TREASURE_CAP_SLACK),
    );
    trim_entity(
        genome,
        Tile::Potion,
        entity_cap(params.target_potion_count, POTION_CAP_SLACK),
    );
}

fn entity_cap(target: u32, slack: u32) -> usize {
    (target + slack) as usize
}

/// Keeps the first occurrence of `tile` in scan order, demoting the rest.
fn dedupe(genome: &mut TileGrid, tile: Tile) {
    let occurrences = genome.positions_of(tile);
    for position in occurrences.into_iter().skip(1) {
        genome.set(position, Tile::Floor);
    }
}

/// Re-seats a missing entrance by walking down the first column past walls.
/// The exit cell is walked past rather than overwritten; when the walk
/// ends on the exit the entrance backs off to the cell just before it, or
/// sideways into the next column on a single-row grid.
fn seat_start(genome: &mut TileGrid) {
    let column = 0;
    let bottom = genome.height() - 1;
    let mut row = 0;
    while row < bottom {
        match genome.get(Position::new(column, row)) {
            Some(Tile::Wall) | Some(Tile::Exit) => row += 1,
            _ => break,
        }
    }
    let mut target = Position::new(column, row);
    if genome.get(target) == Some(Tile::Exit) {
        if row > 0 {
            target = Position::new(column, row - 1);
        } else if column + 1 < genome.width() {
            target = Position::new(column + 1, row);
        } else {
            return;
        }
    }
    genome.set(target, Tile::Start);
}

/// Mirror of [`seat_start`]: walks up the last column from the bottom,
/// backing off when the walk ends on the entrance.
fn seat_exit(genome: &mut TileGrid) {
    let column = genome.width() - 1;
    let mut row = genome.height() - 1;
    while row > 0 {
        match genome.get(Position::new(column, row)) {
            Some(Tile::Wall) | Some(Tile::Start) => row -= 1,
            _ => break,
        }
    }
    let mut target = Position::new(column, row);
    if genome.get(target) == Some(Tile::Start) {
        if row + 1 < genome.height() {
            target = Position::new(column, row + 1);
        } else if column > 0 {
            target = Position::new(column - 1, row);
        } else {
            return;
        }
    }
    genome.set(target, Tile::Exit);
}

/// Demotes occurrences of `tile` beyond `cap` to floor, in scan order.
fn trim_entity(genome: &mut TileGrid, tile: Tile, cap: usize) {
    let occurrences = genome.positions_of(tile);
    for position in occurrences.into_iter().skip(cap) {
        genome.set(position, Tile::Floor);
    }
}

/// Walks a drunken corridor through the grid interior, flooring each step
/// and occasionally widening into a neighbouring cell.
fn carve_corridor<R: Rng>(genome: &mut TileGrid, rng: &mut R) {
    let width = genome.width();
    let height = genome.height();
    let mut column = rng.gen_range(1..width - 1);
    let mut row = rng.gen_range(1..height - 1);
    let length = rng.gen_range(8..=15);
    for _ in 0..length {
        let position = Position::new(column, row);
        genome.set(position, Tile::Floor);
        for direction in Direction::ALL {
            if let Some(neighbor) = genome.neighbor(position, direction) {
                if rng.gen::<f64>() < CORRIDOR_WIDEN_CHANCE {
                    genome.set(neighbor, Tile::Floor);
                }
            }
        }
        let (delta_column, delta_row) = choose(&STEP_DELTAS, rng);
        column = clamp_interior(i64::from(column) + delta_column, width);
        row = clamp_interior(i64::from(row) + delta_row, height);
    }
}

/// Clamps a coordinate into the grid interior `[1, extent - 2]`.
fn clamp_interior(value: i64, extent: u32) -> u32 {
    let clamped = value.clamp(1, i64::from(extent) - 2);
    clamped as u32
}

/// Floors a small rectangular room placed fully inside the border.
fn carve_room<R: Rng>(genome: &mut TileGrid, rng: &mut R) {
    let origin_column = rng.gen_range(1..=genome.width() - 4);
    let origin_row = rng.gen_range(1..=genome.height() - 4);
    let room_width = rng.gen_range(2..=3);
    let room_height = rng.gen_range(2..=3);
    for row in origin_row..origin_row + room_height {
        for column in origin_column..origin_column + room_width {
            genome.set(Position::new(column, row), Tile::Floor);
        }
    }
}

/// Floors a walkable chain from the entrance to the exit. The walk steps
/// greedily, rows first, then columns, with an occasional random detour.
/// Entrance and exit cells themselves are left untouched.
fn carve_connection<R: Rng>(genome: &mut TileGrid, start: Position, exit: Position, rng: &mut R) {
    let width = genome.width();
    let height = genome.height();
    let mut current = start;
    while current != exit {
        match genome.get(current) {
            Some(Tile::Start) | Some(Tile::Exit) => {}
            _ => genome.set(current, Tile::Floor),
        }
        if rng.gen::<f64>() < CARVE_DETOUR_CHANCE {
            let (delta_column, delta_row) = choose(&STEP_DELTAS, rng);
            let next_column = i64::from(current.column()) + delta_column;
            let next_row = i64::from(current.row()) + delta_row;
            if (0..i64::from(width)).contains(&next_column)
                && (0..i64::from(height)).contains(&next_row)
            {
                current = Position::new(next_column as u32, next_row as u32);
            }
            continue;
        }
        current = if current.row() < exit.row() {
            Position::new(current.column(), current.row() + 1)
        } else if current.row() > exit.row() {
            Position::new(current.column(), current.row() - 1)
        } else if current.column() < exit.column() {
            Position::new(current.column() + 1, current.row())
        } else {
            Position::new(current.column() - 1, current.row())
        };
    }
}

/// Drops the requested number of each entity onto random floor cells.
/// Placement probes give up quietly on crowded grids; repair caps any
/// surplus, and the fitness shaping terms penalise any shortfall.
fn place_entities<R: Rng>(genome: &mut TileGrid, params: &GenerationParams, rng: &mut R) {
    for _ in 0..params.target_monster_count {
        if let Some(position) = random_floor_cell(genome, rng) {
            genome.set(position, Tile::Monster);
        }
    }
    for _ in 0..params.target_potion_count {
        if let Some(position) = random_floor_cell(genome, rng) {
            genome.set(position, Tile::Potion);
        }
    }
    for _ in 0..params.target_treasure_count {
        if let Some(position) = random_floor_cell(genome, rng) {
            genome.set(position, Tile::Treasure);
        }
    }
}

/// Probes random cells a bounded number of times looking for bare floor.
fn random_floor_cell<R: Rng>(genome: &TileGrid, rng: &mut R) -> Option<Position> {
    if genome.width() == 0 || genome.height() == 0 {
        return None;
    }
    for _ in 0..FLOOR_PROBE_ATTEMPTS {
        let position = Position::new(
            rng.gen_range(0..genome.width()),
            rng.gen_range(0..genome.height()),
        );
        if genome.get(position) == Some(Tile::Floor) {
            return Some(position);
        }
    }
    None
}

fn choose<T: Copy, R: Rng>(options: &[T], rng: &mut R) -> T {
    options[rng.gen_range(0..options.len())]
}
