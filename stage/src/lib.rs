#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Stage persistence.
//!
//! Levels live on disk as plain text, one symbol per cell, one line per
//! row, so they can be inspected and hand-edited. Each level may carry a
//! sidecar JSON record with the [`GenerationParams`] it was bred under. A
//! [`StageStore`] owns the two-directory layout:
//!
//! ```text
//! <root>/stages/<name>.txt
//! <root>/props/<name>.json
//! ```
//!
//! The free functions read and write explicit paths; the campaign loop
//! uses them to persist its evolving parameter record between runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dungeon_forge_core::{GenerationParams, StageParseError, TileGrid};
use thiserror::Error;

const STAGE_DIR: &str = "stages";
const PARAMS_DIR: &str = "props";
const STAGE_EXTENSION: &str = "txt";
const PARAMS_EXTENSION: &str = "json";

/// Errors raised while moving stages and parameter records on and off disk.
#[derive(Debug, Error)]
pub enum StageError {
    /// The underlying filesystem operation failed.
    #[error("could not access {path}")]
    Io {
        /// File the operation targeted.
        path: PathBuf,
        /// Error reported by the operating system.
        #[source]
        source: io::Error,
    },
    /// The stage text did not decode into a grid.
    #[error("stage file {path} is malformed")]
    Malformed {
        /// File the text was read from.
        path: PathBuf,
        /// Decoding failure with symbol coordinates.
        #[source]
        source: StageParseError,
    },
    /// The parameter record did not decode or encode as JSON.
    #[error("parameter file {path} is malformed")]
    Json {
        /// File the record was read from or written to.
        path: PathBuf,
        /// Underlying JSON failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Directory-backed store for named stages and their parameter records.
#[derive(Debug, Clone)]
pub struct StageStore {
    root: PathBuf,
}

impl StageStore {
    /// Creates a store rooted at `root`. Directories are created lazily on
    /// the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory the store was created with.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the stage text for `name` lives at.
    #[must_use]
    pub fn stage_path(&self, name: &str) -> PathBuf {
        self.root
            .join(STAGE_DIR)
            .join(name)
            .with_extension(STAGE_EXTENSION)
    }

    /// Path the parameter record for `name` lives at.
    #[must_use]
    pub fn params_path(&self, name: &str) -> PathBuf {
        self.root
            .join(PARAMS_DIR)
            .join(name)
            .with_extension(PARAMS_EXTENSION)
    }

    /// Writes the canonical text of `grid` under `name`, creating the
    /// stage directory if needed, and returns the path written to.
    pub fn save_stage(&self, name: &str, grid: &TileGrid) -> Result<PathBuf, StageError> {
        let path = self.stage_path(name);
        create_parent(&path)?;
        write_stage(&path, grid)?;
        Ok(path)
    }

    /// Loads the stage saved under `name`.
    pub fn load_stage(&self, name: &str) -> Result<TileGrid, StageError> {
        read_stage(&self.stage_path(name))
    }

    /// Writes the parameter record for `name`, creating the record
    /// directory if needed, and returns the path written to.
    pub fn save_params(
        &self,
        name: &str,
        params: &GenerationParams,
    ) -> Result<PathBuf, StageError> {
        let path = self.params_path(name);
        create_parent(&path)?;
        write_params(&path, params)?;
        Ok(path)
    }

    /// Loads the parameter record saved under `name`.
    pub fn load_params(&self, name: &str) -> Result<GenerationParams, StageError> {
        read_params(&self.params_path(name))
    }

    /// Removes the stage and its parameter record. Files that are already
    /// gone are not an error; anything else the OS reports is.
    pub fn remove_stage(&self, name: &str) -> Result<(), StageError> {
        for path in [self.stage_path(name), self.params_path(name)] {
            if let Err(source) = fs::remove_file(&path) {
                if source.kind() != io::ErrorKind::NotFound {
                    return Err(StageError::Io { path, source });
                }
            }
        }
        Ok(())
    }
}

/// Writes the canonical text of `grid` to an explicit path.
pub fn write_stage(path: &Path, grid: &TileGrid) -> Result<(), StageError> {
    fs::write(path, grid.to_string()).map_err(|source| StageError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Reads and decodes stage text from an explicit path. Ragged rows are
/// padded with floor, matching [`TileGrid::parse`].
pub fn read_stage(path: &Path) -> Result<TileGrid, StageError> {
    let text = fs::read_to_string(path).map_err(|source| StageError::Io {
        path: path.to_owned(),
        source,
    })?;
    TileGrid::parse(&text).map_err(|source| StageError::Malformed {
        path: path.to_owned(),
        source,
    })
}

/// Writes a parameter record as pretty-printed JSON to an explicit path.
pub fn write_params(path: &Path, params: &GenerationParams) -> Result<(), StageError> {
    let mut json = serde_json::to_string_pretty(params).map_err(|source| StageError::Json {
        path: path.to_owned(),
        source,
    })?;
    json.push('\n');
    fs::write(path, json).map_err(|source| StageError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Reads a parameter record from an explicit path.
pub fn read_params(path: &Path) -> Result<GenerationParams, StageError> {
    let text = fs::read_to_string(path).map_err(|source| StageError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| StageError::Json {
        path: path.to_owned(),
        source,
    })
}

fn create_parent(path: &Path) -> Result<(), StageError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(parent).map_err(|source| StageError::Io {
        path: parent.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_is_character_identical() {
        let dir = tempdir().expect("temp dir");
        let store = StageStore::new(dir.path());
        let grid = TileGrid::parse("S.M\n#PE\nT..\n").unwrap();

        let path = store.save_stage("alpha", &grid).expect("stage saves");
        assert!(path.ends_with("stages/alpha.txt"), "unexpected path {path:?}");
        assert!(path.exists());

        let loaded = store.load_stage("alpha").expect("stage loads");
        assert_eq!(loaded.to_string(), "S.M\n#PE\nT..\n");
        assert_eq!(loaded, grid);
    }

    #[test]
    fn loading_pads_ragged_hand_edited_files() {
        let dir = tempdir().expect("temp dir");
        let store = StageStore::new(dir.path());
        let path = store.stage_path("ragged");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "S.M\n#\nT..E\n").unwrap();

        let loaded = store.load_stage("ragged").expect("ragged stage loads");
        assert_eq!(loaded.width(), 4);
        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.to_string(), "S.M.\n#...\nT..E\n");
    }

    #[test]
    fn missing_stage_reports_the_path() {
        let dir = tempdir().expect("temp dir");
        let store = StageStore::new(dir.path());

        match store.load_stage("ghost") {
            Err(StageError::Io { path, source }) => {
                assert!(path.ends_with("stages/ghost.txt"), "unexpected path {path:?}");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected an io error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_stage_reports_the_symbol() {
        let dir = tempdir().expect("temp dir");
        let store = StageStore::new(dir.path());
        let path = store.stage_path("broken");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "S?E\n").unwrap();

        match store.load_stage("broken") {
            Err(StageError::Malformed { source, .. }) => assert_eq!(
                source,
                StageParseError::UnknownSymbol {
                    symbol: '?',
                    column: 1,
                    row: 0
                }
            ),
            other => panic!("expected a malformed error, got {other:?}"),
        }
    }

    #[test]
    fn params_round_trip_through_json() {
        let dir = tempdir().expect("temp dir");
        let store = StageStore::new(dir.path());
        let params = GenerationParams {
            min_path_length: 12,
            target_monster_count: 6,
            target_potion_count: 2,
            target_treasure_count: 4,
            difficulty_level: 3,
        };

        let path = store.save_params("alpha", &params).expect("params save");
        assert!(path.ends_with("props/alpha.json"), "unexpected path {path:?}");

        let loaded = store.load_params("alpha").expect("params load");
        assert_eq!(loaded, params);
    }

    #[test]
    fn removal_is_best_effort() {
        let dir = tempdir().expect("temp dir");
        let store = StageStore::new(dir.path());
        let grid = TileGrid::parse("S.E\n").unwrap();
        let stage_path = store.save_stage("gone", &grid).expect("stage saves");
        let params_path = store
            .save_params("gone", &GenerationParams::default())
            .expect("params save");

        store.remove_stage("gone").expect("first removal succeeds");
        assert!(!stage_path.exists());
        assert!(!params_path.exists());

        store
            .remove_stage("gone")
            .expect("removing a missing stage is not an error");
    }

    #[test]
    fn free_functions_take_explicit_paths() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("campaign_params.json");
        let params = GenerationParams::default();

        write_params(&path, &params).expect("params write");
        assert_eq!(read_params(&path).expect("params read"), params);

        let stage_path = dir.path().join("single.txt");
        let grid = TileGrid::parse("S#E\n...\n").unwrap();
        write_stage(&stage_path, &grid).expect("stage write");
        assert_eq!(
            read_stage(&stage_path).expect("stage read").to_string(),
            "S#E\n...\n"
        );
    }
}
