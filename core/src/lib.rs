#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Dungeon Forge toolkit.
//!
//! This crate defines the vocabulary that connects the optimizer, the
//! playback systems, and the adapters: the [`Tile`] alphabet, grid
//! coordinates, the dense [`TileGrid`] every system reads and the optimizer
//! breeds, the seven playback [`Intent`]s, and the [`GenerationParams`]
//! record the difficulty controller adjusts between batches. Systems stay
//! pure; anything stateful lives behind these shared types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel distance reported when no target exists or none is reachable.
pub const UNREACHABLE_DISTANCE: u32 = 1000;

/// Number of playback intents a score vector must rank.
pub const INTENT_COUNT: usize = 7;

/// Kinds of cell a dungeon grid can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tile {
    /// Impassable wall.
    Wall,
    /// Open floor.
    Floor,
    /// The agent's spawn cell.
    Start,
    /// The victory cell.
    Exit,
    /// A monster the agent may fight or avoid.
    Monster,
    /// A healing potion pickup.
    Potion,
    /// A treasure pickup.
    Treasure,
}

impl Tile {
    /// Every tile kind in symbol-table order.
    pub const ALL: [Tile; 7] = [
        Tile::Wall,
        Tile::Floor,
        Tile::Start,
        Tile::Exit,
        Tile::Monster,
        Tile::Potion,
        Tile::Treasure,
    ];

    /// Character used for this tile in stage text.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Tile::Wall => '#',
            Tile::Floor => '.',
            Tile::Start => 'S',
            Tile::Exit => 'E',
            Tile::Monster => 'M',
            Tile::Potion => 'P',
            Tile::Treasure => 'T',
        }
    }

    /// Decodes a stage-text character, `None` for unknown symbols.
    #[must_use]
    pub const fn from_symbol(symbol: char) -> Option<Tile> {
        match symbol {
            '#' => Some(Tile::Wall),
            '.' => Some(Tile::Floor),
            'S' => Some(Tile::Start),
            'E' => Some(Tile::Exit),
            'M' => Some(Tile::Monster),
            'P' => Some(Tile::Potion),
            'T' => Some(Tile::Treasure),
            _ => None,
        }
    }

    /// Whether the tile unconditionally blocks movement.
    ///
    /// Monsters block only monster-avoiding path queries, which is a
    /// per-query choice rather than a property of the tile.
    #[must_use]
    pub const fn blocks_movement(self) -> bool {
        matches!(self, Tile::Wall)
    }
}

/// Cardinal movement directions available to the agent.
///
/// The array order is also the neighbor-expansion order used by path
/// queries, so replays stay stable across runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    Up,
    /// Movement toward increasing row indices.
    Down,
    /// Movement toward decreasing column indices.
    Left,
    /// Movement toward increasing column indices.
    Right,
}

impl Direction {
    /// Every direction in canonical expansion order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];
}

/// Location of a single grid cell expressed as column and row coordinates.
///
/// The origin sits in the top-left corner; columns grow rightward and rows
/// grow downward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    column: u32,
    row: u32,
}

impl Position {
    /// Creates a new grid position.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two positions.
    #[must_use]
    pub fn manhattan_distance(self, other: Position) -> u32 {
        self.column.abs_diff(other.column) + self.row.abs_diff(other.row)
    }

    /// Position one cell over in the given direction.
    ///
    /// Returns `None` when the step would leave the coordinate space
    /// (negative column or row). Grid bounds are checked separately by
    /// [`TileGrid::neighbor`].
    #[must_use]
    pub fn step(self, direction: Direction) -> Option<Position> {
        match direction {
            Direction::Up => self.row.checked_sub(1).map(|row| Self::new(self.column, row)),
            Direction::Down => Some(Self::new(self.column, self.row + 1)),
            Direction::Left => self
                .column
                .checked_sub(1)
                .map(|column| Self::new(column, self.row)),
            Direction::Right => Some(Self::new(self.column + 1, self.row)),
        }
    }
}

/// Playback goals the agent policy ranks and resolves into moves.
///
/// Index order is part of the contract: score vectors are interpreted
/// positionally and observation vectors report distances in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Step toward the nearest monster to fight it.
    FightMonster,
    /// Step toward the nearest treasure, ignoring monsters.
    SeekTreasure,
    /// Step toward the nearest treasure along monster-free cells.
    SeekTreasureSafely,
    /// Step toward the nearest potion, ignoring monsters.
    SeekPotion,
    /// Step toward the nearest potion along monster-free cells.
    SeekPotionSafely,
    /// Step toward the exit, ignoring monsters.
    SeekExit,
    /// Step toward the exit along monster-free cells.
    SeekExitSafely,
}

impl Intent {
    /// Every intent in canonical score-vector order.
    pub const ALL: [Intent; INTENT_COUNT] = [
        Intent::FightMonster,
        Intent::SeekTreasure,
        Intent::SeekTreasureSafely,
        Intent::SeekPotion,
        Intent::SeekPotionSafely,
        Intent::SeekExit,
        Intent::SeekExitSafely,
    ];

    /// Position of this intent inside a score vector.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Intent::FightMonster => 0,
            Intent::SeekTreasure => 1,
            Intent::SeekTreasureSafely => 2,
            Intent::SeekPotion => 3,
            Intent::SeekPotionSafely => 4,
            Intent::SeekExit => 5,
            Intent::SeekExitSafely => 6,
        }
    }

    /// Decodes a score-vector index, `None` when out of range.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Intent> {
        match index {
            0 => Some(Intent::FightMonster),
            1 => Some(Intent::SeekTreasure),
            2 => Some(Intent::SeekTreasureSafely),
            3 => Some(Intent::SeekPotion),
            4 => Some(Intent::SeekPotionSafely),
            5 => Some(Intent::SeekExit),
            6 => Some(Intent::SeekExitSafely),
            _ => None,
        }
    }

    /// Tile kind this intent walks toward.
    #[must_use]
    pub const fn target_tile(self) -> Tile {
        match self {
            Intent::FightMonster => Tile::Monster,
            Intent::SeekTreasure | Intent::SeekTreasureSafely => Tile::Treasure,
            Intent::SeekPotion | Intent::SeekPotionSafely => Tile::Potion,
            Intent::SeekExit | Intent::SeekExitSafely => Tile::Exit,
        }
    }

    /// Whether path queries for this intent treat monsters as walls.
    #[must_use]
    pub const fn avoids_monsters(self) -> bool {
        matches!(
            self,
            Intent::SeekTreasureSafely | Intent::SeekPotionSafely | Intent::SeekExitSafely
        )
    }
}

/// Errors produced while decoding stage text into a [`TileGrid`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageParseError {
    /// The text contained no rows at all.
    Empty,
    /// A character outside the tile alphabet was encountered.
    UnknownSymbol {
        /// The offending character.
        symbol: char,
        /// Zero-based column of the character within its row.
        column: u32,
        /// Zero-based row of the line containing the character.
        row: u32,
    },
}

impl fmt::Display for StageParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageParseError::Empty => write!(f, "stage text contains no rows"),
            StageParseError::UnknownSymbol {
                symbol,
                column,
                row,
            } => write!(
                f,
                "unknown tile symbol {symbol:?} at column {column}, row {row}"
            ),
        }
    }
}

impl std::error::Error for StageParseError {}

/// Dense rectangular dungeon grid stored in row-major order.
///
/// Every constructor yields a rectangular grid; ragged text input is
/// normalized by padding short rows with [`Tile::Floor`] at the boundary,
/// so downstream code never sees uneven rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Creates a grid of the given dimensions with every cell set to `fill`.
    #[must_use]
    pub fn filled(width: u32, height: u32, fill: Tile) -> Self {
        Self {
            width,
            height,
            tiles: vec![fill; (width as usize) * (height as usize)],
        }
    }

    /// Builds a grid from explicit rows, Floor-padding ragged rows to the
    /// longest row's width.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Self {
        let height = rows.len() as u32;
        let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
        let mut tiles = Vec::with_capacity((width as usize) * (height as usize));
        for mut row in rows {
            row.resize(width as usize, Tile::Floor);
            tiles.extend(row);
        }
        Self {
            width,
            height,
            tiles,
        }
    }

    /// Decodes stage text: one line per row, trailing newline optional.
    ///
    /// Short lines are Floor-padded to the widest line. Characters outside
    /// the tile alphabet are reported with their coordinates.
    pub fn parse(text: &str) -> Result<Self, StageParseError> {
        let trimmed = text.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            return Err(StageParseError::Empty);
        }
        let mut rows = Vec::new();
        for (row_index, line) in trimmed.lines().enumerate() {
            let mut row = Vec::with_capacity(line.len());
            for (column_index, symbol) in line.chars().enumerate() {
                match Tile::from_symbol(symbol) {
                    Some(tile) => row.push(tile),
                    None => {
                        return Err(StageParseError::UnknownSymbol {
                            symbol,
                            column: column_index as u32,
                            row: row_index as u32,
                        })
                    }
                }
            }
            rows.push(row);
        }
        Ok(Self::from_rows(rows))
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells in the grid.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Whether the position falls inside the grid bounds.
    #[must_use]
    pub const fn in_bounds(&self, position: Position) -> bool {
        position.column() < self.width && position.row() < self.height
    }

    const fn index(&self, position: Position) -> Option<usize> {
        if self.in_bounds(position) {
            Some((position.row() as usize) * (self.width as usize) + position.column() as usize)
        } else {
            None
        }
    }

    /// Tile at the position, `None` when out of bounds.
    #[must_use]
    pub fn get(&self, position: Position) -> Option<Tile> {
        self.index(position).map(|index| self.tiles[index])
    }

    /// Writes a tile at the position. Writes outside the grid are ignored.
    pub fn set(&mut self, position: Position, tile: Tile) {
        if let Some(index) = self.index(position) {
            self.tiles[index] = tile;
        }
    }

    /// Neighboring position one step away, `None` when the step leaves the
    /// grid.
    #[must_use]
    pub fn neighbor(&self, position: Position, direction: Direction) -> Option<Position> {
        position
            .step(direction)
            .filter(|next| self.in_bounds(*next))
    }

    /// First cell holding `tile` in row-major scan order.
    #[must_use]
    pub fn find_first(&self, tile: Tile) -> Option<Position> {
        self.cells().find_map(|(position, held)| {
            if held == tile {
                Some(position)
            } else {
                None
            }
        })
    }

    /// Every cell holding `tile`, in row-major scan order.
    #[must_use]
    pub fn positions_of(&self, tile: Tile) -> Vec<Position> {
        self.cells()
            .filter_map(|(position, held)| if held == tile { Some(position) } else { None })
            .collect()
    }

    /// Number of cells holding `tile`.
    #[must_use]
    pub fn count(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|held| **held == tile).count()
    }

    /// Iterates every cell with its position, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (Position, Tile)> + '_ {
        let width = self.width;
        self.tiles.iter().enumerate().map(move |(index, tile)| {
            let column = (index as u32) % width;
            let row = (index as u32) / width;
            (Position::new(column, row), *tile)
        })
    }
}

impl fmt::Display for TileGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.height {
            for column in 0..self.width {
                let index = (row as usize) * (self.width as usize) + column as usize;
                write!(f, "{}", self.tiles[index].symbol())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Snapshot of the agent between steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentState {
    position: Position,
    hp: i32,
    max_hp: i32,
}

impl AgentState {
    /// Creates an agent snapshot with explicit health values.
    #[must_use]
    pub const fn new(position: Position, hp: i32, max_hp: i32) -> Self {
        Self {
            position,
            hp,
            max_hp,
        }
    }

    /// Creates an agent at full health standing on `position`.
    #[must_use]
    pub const fn at_full_health(position: Position, max_hp: i32) -> Self {
        Self::new(position, max_hp, max_hp)
    }

    /// Cell the agent currently occupies.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Current hit points. Zero or below means the agent is dead.
    #[must_use]
    pub const fn hp(&self) -> i32 {
        self.hp
    }

    /// Hit-point ceiling healing can never exceed.
    #[must_use]
    pub const fn max_hp(&self) -> i32 {
        self.max_hp
    }
}

/// Designer-tuned record controlling what the optimizer breeds toward.
///
/// The difficulty controller rewrites this record between batches and the
/// stage store persists it as JSON alongside generated levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Minimum acceptable Start-to-Exit path length in steps.
    pub min_path_length: u32,
    /// Monster count the fitness oracle shapes toward.
    pub target_monster_count: u32,
    /// Potion count the fitness oracle shapes toward.
    pub target_potion_count: u32,
    /// Treasure count the fitness oracle shapes toward.
    pub target_treasure_count: u32,
    /// Monotonic difficulty rank reported alongside generated stages.
    pub difficulty_level: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            min_path_length: 8,
            target_monster_count: 3,
            target_potion_count: 1,
            target_treasure_count: 3,
            difficulty_level: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AgentState, Direction, GenerationParams, Intent, Position, StageParseError, Tile,
        TileGrid, INTENT_COUNT,
    };
    use serde::{de::DeserializeOwned, Serialize};

    #[test]
    fn tile_symbols_round_trip() {
        for tile in Tile::ALL {
            assert_eq!(Tile::from_symbol(tile.symbol()), Some(tile));
        }
        assert_eq!(Tile::from_symbol('x'), None);
    }

    #[test]
    fn intent_indices_round_trip() {
        for intent in Intent::ALL {
            assert_eq!(Intent::from_index(intent.index()), Some(intent));
        }
        assert_eq!(Intent::from_index(INTENT_COUNT), None);
    }

    #[test]
    fn safe_intents_avoid_monsters() {
        assert!(!Intent::SeekTreasure.avoids_monsters());
        assert!(Intent::SeekTreasureSafely.avoids_monsters());
        assert!(Intent::SeekExitSafely.avoids_monsters());
        assert_eq!(Intent::FightMonster.target_tile(), Tile::Monster);
        assert_eq!(Intent::SeekExit.target_tile(), Tile::Exit);
    }

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = Position::new(1, 1);
        let destination = Position::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    #[test]
    fn step_rejects_negative_coordinates() {
        let corner = Position::new(0, 0);
        assert_eq!(corner.step(Direction::Up), None);
        assert_eq!(corner.step(Direction::Left), None);
        assert_eq!(corner.step(Direction::Down), Some(Position::new(0, 1)));
        assert_eq!(corner.step(Direction::Right), Some(Position::new(1, 0)));
    }

    #[test]
    fn grid_round_trips_through_text() {
        let text = "S.#\n.M.\n#.E\n";
        let grid = TileGrid::parse(text).expect("parse stage text");
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.to_string(), text);
    }

    #[test]
    fn parse_pads_ragged_rows_with_floor() {
        let grid = TileGrid::parse("S.\n#\nE..").expect("parse ragged text");
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.get(Position::new(2, 0)), Some(Tile::Floor));
        assert_eq!(grid.get(Position::new(1, 1)), Some(Tile::Floor));
        assert_eq!(grid.get(Position::new(2, 1)), Some(Tile::Floor));
        assert_eq!(grid.to_string(), "S..\n#..\nE..\n");
    }

    #[test]
    fn parse_reports_unknown_symbols_with_coordinates() {
        let error = TileGrid::parse("S.\n.q\n").expect_err("reject unknown symbol");
        assert_eq!(
            error,
            StageParseError::UnknownSymbol {
                symbol: 'q',
                column: 1,
                row: 1,
            }
        );
    }

    #[test]
    fn parse_rejects_empty_text() {
        assert_eq!(TileGrid::parse(""), Err(StageParseError::Empty));
        assert_eq!(TileGrid::parse("\n\n"), Err(StageParseError::Empty));
    }

    #[test]
    fn grid_access_is_bounds_checked() {
        let mut grid = TileGrid::filled(2, 2, Tile::Floor);
        assert_eq!(grid.get(Position::new(2, 0)), None);
        grid.set(Position::new(5, 5), Tile::Wall);
        assert_eq!(grid.count(Tile::Wall), 0);
        grid.set(Position::new(1, 1), Tile::Exit);
        assert_eq!(grid.get(Position::new(1, 1)), Some(Tile::Exit));
    }

    #[test]
    fn neighbor_respects_grid_bounds() {
        let grid = TileGrid::filled(3, 2, Tile::Floor);
        let corner = Position::new(2, 1);
        assert_eq!(grid.neighbor(corner, Direction::Right), None);
        assert_eq!(grid.neighbor(corner, Direction::Down), None);
        assert_eq!(
            grid.neighbor(corner, Direction::Up),
            Some(Position::new(2, 0))
        );
    }

    #[test]
    fn find_first_scans_in_row_major_order() {
        let mut grid = TileGrid::filled(3, 3, Tile::Floor);
        grid.set(Position::new(2, 1), Tile::Monster);
        grid.set(Position::new(0, 2), Tile::Monster);
        assert_eq!(grid.find_first(Tile::Monster), Some(Position::new(2, 1)));
        assert_eq!(
            grid.positions_of(Tile::Monster),
            vec![Position::new(2, 1), Position::new(0, 2)]
        );
        assert_eq!(grid.count(Tile::Monster), 2);
    }

    #[test]
    fn agent_state_reports_health() {
        let agent = AgentState::at_full_health(Position::new(1, 1), 10);
        assert_eq!(agent.hp(), 10);
        assert_eq!(agent.max_hp(), 10);
        assert_eq!(agent.position(), Position::new(1, 1));
    }

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn generation_params_round_trip_through_bincode() {
        let params = GenerationParams {
            min_path_length: 12,
            target_monster_count: 5,
            target_potion_count: 2,
            target_treasure_count: 4,
            difficulty_level: 3,
        };
        assert_round_trip(&params);
    }

    #[test]
    fn position_round_trips_through_bincode() {
        assert_round_trip(&Position::new(7, 3));
    }

    #[test]
    fn generation_params_default_matches_initial_campaign() {
        let params = GenerationParams::default();
        assert_eq!(params.min_path_length, 8);
        assert_eq!(params.target_monster_count, 3);
        assert_eq!(params.target_potion_count, 1);
        assert_eq!(params.target_treasure_count, 3);
        assert_eq!(params.difficulty_level, 1);
    }
}
