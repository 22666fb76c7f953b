#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Adaptive difficulty controller.
//!
//! Closes the loop between playback and generation: after a batch of
//! episodes, the agent's win rate decides whether the next batch of
//! dungeons gets harder, easier, or stays put. A dominant agent gets more
//! monsters, fewer potions and longer paths; a struggling one gets the
//! reverse, down to fixed floors. Entity targets are capped after every
//! review so repeated wins can never push the generator into layouts it
//! cannot fill.

use dungeon_forge_core::GenerationParams;

/// Win rates strictly above this read as "too easy".
pub const TOO_EASY_WIN_RATE: f64 = 0.8;
/// Win rates strictly below this read as "too hard".
pub const TOO_HARD_WIN_RATE: f64 = 0.2;

const MONSTER_TARGET_CEILING: u32 = 10;
const POTION_TARGET_CEILING: u32 = 5;
const MIN_PATH_FLOOR: u32 = 5;

/// How a round of play reads against the difficulty thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    /// The agent dominated; the next batch should push back harder.
    TooEasy,
    /// The agent is challenged but not crushed; hold the course.
    Balanced,
    /// The agent is being routed; the next batch should ease off.
    TooHard,
}

/// Classifies a win rate against the fixed thresholds. Boundary values
/// count as balanced.
#[must_use]
pub fn assess(win_rate: f64) -> Assessment {
    if win_rate > TOO_EASY_WIN_RATE {
        Assessment::TooEasy
    } else if win_rate < TOO_HARD_WIN_RATE {
        Assessment::TooHard
    } else {
        Assessment::Balanced
    }
}

/// Produces the generation params for the next batch from this round's
/// win rate.
///
/// Raising difficulty adds a monster, removes a potion and stretches the
/// required path by two. Lowering does the reverse, never dropping the
/// difficulty level or monster target below one, nor the path requirement
/// below five. The monster and potion targets are capped unconditionally,
/// whatever the assessment.
#[must_use]
pub fn update(params: GenerationParams, win_rate: f64) -> GenerationParams {
    let mut updated = params;
    match assess(win_rate) {
        Assessment::TooEasy => {
            updated.difficulty_level += 1;
            updated.target_monster_count += 1;
            updated.target_potion_count = updated.target_potion_count.saturating_sub(1);
            updated.min_path_length += 2;
        }
        Assessment::TooHard => {
            updated.difficulty_level = updated.difficulty_level.saturating_sub(1).max(1);
            updated.target_monster_count = updated.target_monster_count.saturating_sub(1).max(1);
            updated.target_potion_count += 1;
            updated.min_path_length = updated.min_path_length.saturating_sub(2).max(MIN_PATH_FLOOR);
        }
        Assessment::Balanced => {}
    }
    updated.target_monster_count = updated.target_monster_count.min(MONSTER_TARGET_CEILING);
    updated.target_potion_count = updated.target_potion_count.min(POTION_TARGET_CEILING);
    updated
}
