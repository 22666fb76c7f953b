use dungeon_forge_core::{Position, Tile, TileGrid};
use dungeon_forge_system_pathfinding::bfs;

/// Exhaustive relaxation over the whole grid until distances stop moving.
///
/// Deliberately naive so it cannot share a bug with the queue-driven
/// search it cross-checks.
fn relaxed_distances(grid: &TileGrid, start: Position, avoid_monsters: bool) -> Vec<Option<u32>> {
    let width = grid.width() as usize;
    let cell_count = grid.cell_count();
    let mut distances: Vec<Option<u32>> = vec![None; cell_count];
    if !grid.in_bounds(start) {
        return distances;
    }
    distances[(start.row() as usize) * width + start.column() as usize] = Some(0);

    let passable = |position: Position| match grid.get(position) {
        Some(Tile::Wall) => false,
        Some(Tile::Monster) => !avoid_monsters,
        Some(_) => true,
        None => false,
    };

    loop {
        let mut changed = false;
        for (position, _) in grid.cells() {
            let here = (position.row() as usize) * width + position.column() as usize;
            let Some(distance) = distances[here] else {
                continue;
            };
            for direction in dungeon_forge_core::Direction::ALL {
                let Some(neighbor) = grid.neighbor(position, direction) else {
                    continue;
                };
                if !passable(neighbor) {
                    continue;
                }
                let there = (neighbor.row() as usize) * width + neighbor.column() as usize;
                let relaxed = distance + 1;
                if distances[there].map_or(true, |known| known > relaxed) {
                    distances[there] = Some(relaxed);
                    changed = true;
                }
            }
        }
        if !changed {
            return distances;
        }
    }
}

fn assert_fields_agree(grid: &TileGrid, start: Position, avoid_monsters: bool) {
    let field = bfs(grid, start, avoid_monsters);
    let expected = relaxed_distances(grid, start, avoid_monsters);
    for (position, _) in grid.cells() {
        let index = (position.row() as usize) * (grid.width() as usize) + position.column() as usize;
        assert_eq!(
            field.distance(position),
            expected[index],
            "distance mismatch at {position:?} (avoid_monsters = {avoid_monsters})",
        );
    }
}

#[test]
fn search_matches_relaxation_on_handcrafted_stages() {
    let stages = [
        "S....\n.###.\n.#E#.\n.#.#.\n.....\n",
        "S#...\n.#.#.\n.#.#E\n.#.#.\n...#.\n",
        "SM.ME\n.M.M.\n.....\n",
        "S\n",
    ];
    for text in stages {
        let grid = TileGrid::parse(text).expect("handcrafted stage parses");
        let start = grid.find_first(Tile::Start).expect("stage has a start");
        assert_fields_agree(&grid, start, false);
        assert_fields_agree(&grid, start, true);
    }
}

#[test]
fn search_matches_relaxation_on_scrambled_stages() {
    // Cheap xorshift keeps the stage family deterministic without pulling
    // an RNG crate into a dependency-free crate's tests.
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    for _ in 0..40 {
        let width = 3 + (next() % 5) as u32;
        let height = 3 + (next() % 5) as u32;
        let mut grid = TileGrid::filled(width, height, Tile::Floor);
        for (position, _) in grid.clone().cells() {
            let tile = match next() % 10 {
                0..=3 => Tile::Wall,
                4 => Tile::Monster,
                5 => Tile::Treasure,
                6 => Tile::Potion,
                _ => Tile::Floor,
            };
            grid.set(position, tile);
        }
        let start = Position::new((next() % width as u64) as u32, (next() % height as u64) as u32);
        assert_fields_agree(&grid, start, false);
        assert_fields_agree(&grid, start, true);
    }
}
