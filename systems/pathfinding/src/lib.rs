#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Breadth-first path oracle over dungeon grids.
//!
//! Every query runs a 4-directional flood fill from a single cell. Walls
//! always block; monsters block only when the query avoids them. The same
//! field answers the playback questions ("which way to the nearest
//! potion?") and the fitness questions ("how long is the Start-to-Exit
//! path, and how much of the dungeon is reachable?"), so both halves of
//! the toolkit agree on what "reachable" means.

use std::collections::VecDeque;

use dungeon_forge_core::{
    Direction, Intent, Position, Tile, TileGrid, INTENT_COUNT, UNREACHABLE_DISTANCE,
};

/// Dense breadth-first search results seeded from one start cell.
///
/// Distances default to `u16::MAX` for cells the search never reached;
/// the public accessor reports those as `None` so callers never compare
/// against the sentinel directly.
#[derive(Clone, Debug)]
pub struct BfsField {
    width: u32,
    height: u32,
    distances: Vec<u16>,
    predecessors: Vec<Option<Position>>,
}

impl BfsField {
    fn empty(width: u32, height: u32) -> Self {
        let cell_count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            distances: vec![u16::MAX; cell_count],
            predecessors: vec![None; cell_count],
        }
    }

    fn index(&self, position: Position) -> Option<usize> {
        if position.column() < self.width && position.row() < self.height {
            Some((position.row() as usize) * (self.width as usize) + position.column() as usize)
        } else {
            None
        }
    }

    /// Steps from the search origin to `position`, `None` when the cell was
    /// never reached or lies outside the grid.
    #[must_use]
    pub fn distance(&self, position: Position) -> Option<u32> {
        let offset = self.index(position)?;
        match self.distances[offset] {
            u16::MAX => None,
            steps => Some(u32::from(steps)),
        }
    }

    /// Cell the search stepped from when it first reached `position`.
    ///
    /// The origin itself has no predecessor.
    #[must_use]
    pub fn predecessor(&self, position: Position) -> Option<Position> {
        self.index(position).and_then(|offset| self.predecessors[offset])
    }

    /// Number of cells the search reached, origin included.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.distances
            .iter()
            .filter(|distance| **distance != u16::MAX)
            .count()
    }
}

/// Runs a breadth-first search from `start` over the grid.
///
/// Walls block unconditionally; monsters block when `avoid_monsters` is
/// set. The start cell is seeded regardless of its own tile kind, which
/// lets the fitness oracle flood from the Start marker itself. A start
/// outside the grid yields an empty field.
#[must_use]
pub fn bfs(grid: &TileGrid, start: Position, avoid_monsters: bool) -> BfsField {
    let mut field = BfsField::empty(grid.width(), grid.height());
    let Some(start_index) = field.index(start) else {
        return field;
    };

    field.distances[start_index] = 0;
    let mut queue = VecDeque::new();
    queue.push_back(start);

    while let Some(cell) = queue.pop_front() {
        let Some(cell_index) = field.index(cell) else {
            continue;
        };
        let current_distance = field.distances[cell_index];
        if current_distance >= u16::MAX - 1 {
            continue;
        }
        let next_distance = current_distance + 1;

        for direction in Direction::ALL {
            let Some(neighbor) = grid.neighbor(cell, direction) else {
                continue;
            };
            if blocks(grid, neighbor, avoid_monsters) {
                continue;
            }
            let Some(neighbor_index) = field.index(neighbor) else {
                continue;
            };
            if field.distances[neighbor_index] != u16::MAX {
                continue;
            }
            field.distances[neighbor_index] = next_distance;
            field.predecessors[neighbor_index] = Some(cell);
            queue.push_back(neighbor);
        }
    }

    field
}

fn blocks(grid: &TileGrid, position: Position, avoid_monsters: bool) -> bool {
    match grid.get(position) {
        Some(tile) => tile.blocks_movement() || (avoid_monsters && tile == Tile::Monster),
        None => true,
    }
}

/// Nearest cell of kind `target` reachable from `start`.
///
/// Ties on distance resolve to the lowest row-major scan position. The
/// start cell itself is never a candidate, so an agent standing on a
/// treasure seeking treasure is directed to the next one.
#[must_use]
pub fn nearest_target(
    grid: &TileGrid,
    field: &BfsField,
    start: Position,
    target: Tile,
) -> Option<Position> {
    let mut best: Option<(u32, Position)> = None;
    for (position, tile) in grid.cells() {
        if tile != target || position == start {
            continue;
        }
        let Some(distance) = field.distance(position) else {
            continue;
        };
        if best.map_or(true, |(best_distance, _)| distance < best_distance) {
            best = Some((distance, position));
        }
    }
    best.map(|(_, position)| position)
}

/// Full path from `start` to the nearest `target`, start cell included.
///
/// Empty when no such target is reachable.
#[must_use]
pub fn shortest_path(
    grid: &TileGrid,
    start: Position,
    target: Tile,
    avoid_monsters: bool,
) -> Vec<Position> {
    let field = bfs(grid, start, avoid_monsters);
    let Some(goal) = nearest_target(grid, &field, start, target) else {
        return Vec::new();
    };

    let mut path = vec![goal];
    let mut cursor = goal;
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

/// First cell to step into on the way to the nearest `target`.
#[must_use]
pub fn next_step(
    grid: &TileGrid,
    start: Position,
    target: Tile,
    avoid_monsters: bool,
) -> Option<Position> {
    shortest_path(grid, start, target, avoid_monsters)
        .get(1)
        .copied()
}

/// Direction of the first step toward the nearest `target`, `None` when
/// nothing is reachable.
#[must_use]
pub fn next_direction(
    grid: &TileGrid,
    start: Position,
    target: Tile,
    avoid_monsters: bool,
) -> Option<Direction> {
    next_step(grid, start, target, avoid_monsters)
        .and_then(|step| direction_between(start, step))
}

/// Steps to the nearest `target`, or [`UNREACHABLE_DISTANCE`] when no
/// target exists or none is reachable.
#[must_use]
pub fn distance_to_nearest(
    grid: &TileGrid,
    start: Position,
    target: Tile,
    avoid_monsters: bool,
) -> u32 {
    let field = bfs(grid, start, avoid_monsters);
    nearest_target(grid, &field, start, target)
        .and_then(|goal| field.distance(goal))
        .unwrap_or(UNREACHABLE_DISTANCE)
}

/// Direction of travel between two adjacent cells, `None` when the cells
/// are not 4-neighbors.
#[must_use]
pub fn direction_between(from: Position, to: Position) -> Option<Direction> {
    Direction::ALL
        .into_iter()
        .find(|direction| from.step(*direction) == Some(to))
}

/// First cell to step into for an intent's target, honoring its
/// monster-avoidance rule.
#[must_use]
pub fn next_step_for_intent(grid: &TileGrid, start: Position, intent: Intent) -> Option<Position> {
    next_step(grid, start, intent.target_tile(), intent.avoids_monsters())
}

/// Direction of the first step for an intent, `None` when it cannot be
/// resolved into a move.
#[must_use]
pub fn next_direction_for_intent(
    grid: &TileGrid,
    start: Position,
    intent: Intent,
) -> Option<Direction> {
    next_direction(grid, start, intent.target_tile(), intent.avoids_monsters())
}

/// Distance to an intent's target under its monster-avoidance rule.
#[must_use]
pub fn distance_for_intent(grid: &TileGrid, start: Position, intent: Intent) -> u32 {
    distance_to_nearest(grid, start, intent.target_tile(), intent.avoids_monsters())
}

/// The seven intent distances in canonical score-vector order.
///
/// This is the observation an external controller would rank intents
/// with; the built-in personas ignore it and use fixed preferences.
#[must_use]
pub fn intent_distances(grid: &TileGrid, start: Position) -> [u32; INTENT_COUNT] {
    let mut distances = [UNREACHABLE_DISTANCE; INTENT_COUNT];
    for intent in Intent::ALL {
        distances[intent.index()] = distance_for_intent(grid, start, intent);
    }
    distances
}

#[cfg(test)]
mod tests {
    use super::{
        bfs, direction_between, distance_to_nearest, intent_distances, next_direction,
        next_direction_for_intent, shortest_path,
    };
    use dungeon_forge_core::{
        Direction, Intent, Position, Tile, TileGrid, UNREACHABLE_DISTANCE,
    };

    fn grid(text: &str) -> TileGrid {
        TileGrid::parse(text).expect("test stages parse")
    }

    #[test]
    fn bfs_measures_open_floor() {
        let stage = grid("S..\n...\n..E\n");
        let field = bfs(&stage, Position::new(0, 0), false);
        assert_eq!(field.distance(Position::new(0, 0)), Some(0));
        assert_eq!(field.distance(Position::new(2, 0)), Some(2));
        assert_eq!(field.distance(Position::new(2, 2)), Some(4));
        assert_eq!(field.visited_count(), 9);
    }

    #[test]
    fn bfs_never_crosses_walls() {
        let stage = grid("S#E\n###\n...\n");
        let field = bfs(&stage, Position::new(0, 0), false);
        assert_eq!(field.distance(Position::new(2, 0)), None);
        assert_eq!(field.distance(Position::new(0, 2)), None);
        assert_eq!(field.visited_count(), 1);
    }

    #[test]
    fn monsters_block_only_avoiding_queries() {
        let stage = grid("S.M.E\n#####\n");
        assert_eq!(
            distance_to_nearest(&stage, Position::new(0, 0), Tile::Exit, false),
            4
        );
        assert_eq!(
            distance_to_nearest(&stage, Position::new(0, 0), Tile::Exit, true),
            UNREACHABLE_DISTANCE
        );
    }

    #[test]
    fn missing_targets_report_the_sentinel() {
        let stage = grid("S..\n...\n");
        assert_eq!(
            distance_to_nearest(&stage, Position::new(0, 0), Tile::Potion, false),
            UNREACHABLE_DISTANCE
        );
    }

    #[test]
    fn nearest_target_breaks_ties_in_row_major_order() {
        // Both treasures sit two steps away; the row-0 one wins the tie.
        let stage = grid(".T.\nS..\n.T.\n");
        let path = shortest_path(&stage, Position::new(0, 1), Tile::Treasure, false);
        assert_eq!(path.last().copied(), Some(Position::new(1, 0)));
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn start_cell_is_never_its_own_target() {
        let stage = grid("T.T\n###\n");
        // Standing on a treasure, the query walks to the other one.
        let path = shortest_path(&stage, Position::new(0, 0), Tile::Treasure, false);
        assert_eq!(path.first().copied(), Some(Position::new(0, 0)));
        assert_eq!(path.last().copied(), Some(Position::new(2, 0)));
    }

    #[test]
    fn shortest_path_length_matches_distance() {
        let stage = grid("S.#\n.##\n..E\n");
        let distance = distance_to_nearest(&stage, Position::new(0, 0), Tile::Exit, false);
        let path = shortest_path(&stage, Position::new(0, 0), Tile::Exit, false);
        assert_eq!(path.len() as u32, distance + 1);
        for pair in path.windows(2) {
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1);
        }
    }

    #[test]
    fn next_direction_points_along_the_path() {
        let stage = grid("S..\n#.#\n.E.\n");
        assert_eq!(
            next_direction(&stage, Position::new(0, 0), Tile::Exit, false),
            Some(Direction::Right)
        );
    }

    #[test]
    fn unreachable_targets_resolve_to_no_direction() {
        let stage = grid("S#E\n###\n");
        assert_eq!(
            next_direction(&stage, Position::new(0, 0), Tile::Exit, false),
            None
        );
    }

    #[test]
    fn direction_between_requires_adjacency() {
        let origin = Position::new(1, 1);
        assert_eq!(
            direction_between(origin, Position::new(1, 0)),
            Some(Direction::Up)
        );
        assert_eq!(
            direction_between(origin, Position::new(2, 1)),
            Some(Direction::Right)
        );
        assert_eq!(direction_between(origin, Position::new(2, 2)), None);
        assert_eq!(direction_between(origin, origin), None);
    }

    #[test]
    fn out_of_bounds_start_yields_an_empty_field() {
        let stage = grid("S..\n..E\n");
        let field = bfs(&stage, Position::new(9, 9), false);
        assert_eq!(field.visited_count(), 0);
        assert_eq!(field.distance(Position::new(0, 0)), None);
    }

    #[test]
    fn intent_queries_honor_avoidance() {
        let stage = grid("S.M.T\n#####\n");
        // The unsafe treasure route passes the monster; the safe one fails.
        assert_eq!(
            next_direction_for_intent(&stage, Position::new(0, 0), Intent::SeekTreasure),
            Some(Direction::Right)
        );
        assert_eq!(
            next_direction_for_intent(&stage, Position::new(0, 0), Intent::SeekTreasureSafely),
            None
        );
    }

    #[test]
    fn intent_distances_cover_all_seven_queries() {
        let stage = grid("S.M.E\n.....\nT...P\n");
        let distances = intent_distances(&stage, Position::new(0, 0));
        assert_eq!(distances[Intent::FightMonster.index()], 2);
        assert_eq!(distances[Intent::SeekTreasure.index()], 2);
        assert_eq!(distances[Intent::SeekTreasureSafely.index()], 2);
        assert_eq!(distances[Intent::SeekExit.index()], 4);
        // Avoiding the monster forces the exit route through row 1.
        assert_eq!(distances[Intent::SeekExitSafely.index()], 6);
        assert_eq!(distances[Intent::SeekPotion.index()], 6);
        assert_eq!(distances[Intent::SeekPotionSafely.index()], 6);
    }
}
