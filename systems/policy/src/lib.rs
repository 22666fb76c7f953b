#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Intent selection and the single-step game rule.
//!
//! Playback splits into three layers. [`select_action`] turns a seven
//! element score vector into the highest-ranked intent that actually
//! resolves into a move, shuffling exact ties with an injected RNG.
//! [`apply_move`] is the pure rule function: it consumes the grid, applies
//! one concrete move with its combat, pickup, and reward consequences, and
//! returns the grid with the new agent state. [`AgentPolicy`] and the
//! [`TreasureHunter`] persona wrap those layers with the small amount of
//! state an episode needs.

mod episode;

pub use episode::{play_stage, run_episode, EpisodeOutcome, EpisodeReport, PlaySummary};

use dungeon_forge_core::{
    AgentState, Direction, Intent, Position, Tile, TileGrid, INTENT_COUNT,
};
use dungeon_forge_system_pathfinding::{next_direction_for_intent, next_step_for_intent};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Time cost charged on every step, whatever else happens.
pub const STEP_COST: f64 = -0.01;
/// Extra charge for walking into a wall or off the grid.
pub const BLOCKED_STEP_PENALTY: f64 = -0.1;
/// Reward for killing a monster and surviving the exchange.
pub const KILL_REWARD: f64 = 5.0;
/// Reward for picking up a treasure.
pub const TREASURE_REWARD: f64 = 1.0;
/// Reward for a potion that actually restored health.
pub const POTION_REWARD: f64 = 2.0;
/// Reward for reaching the exit.
pub const EXIT_REWARD: f64 = 10.0;

const REWARD_BOUND: f64 = 100.0;

/// Fixed preferences of the [`TreasureHunter`]: loot first, exit later.
pub const STANDARD_PREFERENCES: [f32; INTENT_COUNT] = [0.0, 0.9, 1.0, 0.1, 0.7, 0.6, 0.8];

/// Preferences the [`TreasureHunter`] switches to while hunting a potion.
pub const SURVIVAL_PREFERENCES: [f32; INTENT_COUNT] = [0.0, 0.8, 0.9, 0.2, 1.0, 0.5, 0.7];

/// Agent tuning the step rule applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Hit-point ceiling healing can never exceed.
    pub max_hp: i32,
    /// Damage taken when stepping onto a monster.
    pub monster_damage: i32,
    /// Hit points restored by a potion, subject to the ceiling.
    pub potion_heal: i32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_hp: 10,
            monster_damage: 5,
            potion_heal: 5,
        }
    }
}

/// Errors surfaced by the policy layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The score vector did not rank exactly the seven intents.
    #[error("score vector must rank {expected} intents, got {actual}")]
    ScoreVectorLength {
        /// Number of intents a score vector must cover.
        expected: usize,
        /// Length the caller actually supplied.
        actual: usize,
    },
    /// The stage has no Start cell to spawn the agent on.
    #[error("stage has no start cell")]
    MissingSpawn,
}

/// Everything one step changes: the grid comes back out alongside the new
/// agent state.
#[derive(Clone, Debug)]
pub struct StepOutcome {
    /// The grid after the step, returned to the caller.
    pub grid: TileGrid,
    /// Agent position and health after the step.
    pub state: AgentState,
    /// Reward earned by the step, clamped to the defensive bound.
    pub reward: f64,
    /// Whether the episode ended (victory or death).
    pub terminated: bool,
    /// Always false; running out of budget is the caller's signal.
    pub truncated: bool,
}

/// Picks the highest-ranked intent that resolves into a move.
///
/// Intents with exactly equal scores form a tie group whose order is
/// shuffled with the injected RNG; groups are walked from the highest
/// score down. Returns `Ok(None)` when no intent resolves at all. The
/// only fail-fast path is a score vector of the wrong length.
pub fn select_action<R: Rng>(
    scores: &[f32],
    grid: &TileGrid,
    position: Position,
    rng: &mut R,
) -> Result<Option<Intent>, PolicyError> {
    if scores.len() != INTENT_COUNT {
        return Err(PolicyError::ScoreVectorLength {
            expected: INTENT_COUNT,
            actual: scores.len(),
        });
    }

    let mut order: Vec<usize> = (0..INTENT_COUNT).collect();
    order.sort_by(|left, right| scores[*right].total_cmp(&scores[*left]));

    let mut group_start = 0;
    while group_start < order.len() {
        let mut group_end = group_start + 1;
        while group_end < order.len() && scores[order[group_end]] == scores[order[group_start]] {
            group_end += 1;
        }
        order[group_start..group_end].shuffle(rng);
        group_start = group_end;
    }

    for index in order {
        let Some(intent) = Intent::from_index(index) else {
            continue;
        };
        if next_direction_for_intent(grid, position, intent).is_some() {
            return Ok(Some(intent));
        }
    }
    Ok(None)
}

/// Applies one concrete move to the grid and agent state.
///
/// This is the pure game rule: no RNG, no hidden state, the grid is
/// consumed and returned. `None` means standing still, which still costs
/// the step and picks up whatever the agent is standing on.
#[must_use]
pub fn apply_move(
    direction: Option<Direction>,
    grid: TileGrid,
    state: AgentState,
    config: &PolicyConfig,
) -> StepOutcome {
    let mut grid = grid;
    let mut position = state.position();
    let mut hp = state.hp();
    let mut reward = STEP_COST;
    let mut terminated = false;

    match direction {
        None => match grid.get(position) {
            Some(Tile::Treasure) => {
                grid.set(position, Tile::Floor);
                reward += TREASURE_REWARD;
            }
            Some(Tile::Potion) => {
                grid.set(position, Tile::Floor);
                let healed = (hp + config.potion_heal).min(config.max_hp);
                if healed > hp {
                    reward += POTION_REWARD;
                }
                hp = healed;
            }
            _ => {}
        },
        Some(step_direction) => {
            let destination = position
                .step(step_direction)
                .and_then(|cell| grid.get(cell).map(|tile| (cell, tile)));
            match destination {
                None | Some((_, Tile::Wall)) => {
                    reward += BLOCKED_STEP_PENALTY;
                }
                Some((cell, tile)) => {
                    position = cell;
                    match tile {
                        Tile::Monster => {
                            grid.set(cell, Tile::Floor);
                            hp -= config.monster_damage;
                            if hp <= 0 {
                                terminated = true;
                            } else {
                                reward += KILL_REWARD;
                            }
                        }
                        Tile::Treasure => {
                            grid.set(cell, Tile::Floor);
                            reward += TREASURE_REWARD;
                        }
                        Tile::Potion => {
                            grid.set(cell, Tile::Floor);
                            let healed = (hp + config.potion_heal).min(config.max_hp);
                            if healed > hp {
                                reward += POTION_REWARD;
                            }
                            hp = healed;
                        }
                        Tile::Exit => {
                            reward += EXIT_REWARD;
                            terminated = true;
                        }
                        Tile::Floor | Tile::Start | Tile::Wall => {}
                    }
                }
            }
        }
    }

    StepOutcome {
        grid,
        state: AgentState::new(position, hp, state.max_hp()),
        reward: reward.clamp(-REWARD_BOUND, REWARD_BOUND),
        terminated,
        truncated: false,
    }
}

/// Resolves an intent into its first step and applies it.
#[must_use]
pub fn apply_step(
    intent: Option<Intent>,
    grid: TileGrid,
    state: AgentState,
    config: &PolicyConfig,
) -> StepOutcome {
    let direction =
        intent.and_then(|intent| next_direction_for_intent(&grid, state.position(), intent));
    apply_move(direction, grid, state, config)
}

/// Stateful wrapper pairing agent state with a seeded tie-break RNG.
#[derive(Clone, Debug)]
pub struct AgentPolicy {
    config: PolicyConfig,
    state: AgentState,
    rng: ChaCha8Rng,
    finished: bool,
}

impl AgentPolicy {
    /// Spawns the agent at the grid's Start cell with full health.
    pub fn spawn(grid: &TileGrid, config: PolicyConfig, seed: u64) -> Result<Self, PolicyError> {
        let start = grid
            .find_first(Tile::Start)
            .ok_or(PolicyError::MissingSpawn)?;
        Ok(Self {
            config,
            state: AgentState::at_full_health(start, config.max_hp),
            rng: ChaCha8Rng::seed_from_u64(seed),
            finished: false,
        })
    }

    /// Current agent snapshot.
    #[must_use]
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Tuning applied by the step rule.
    #[must_use]
    pub const fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Whether the episode already ended.
    #[must_use]
    pub const fn finished(&self) -> bool {
        self.finished
    }

    /// Ranks the intents for the current position.
    pub fn select(
        &mut self,
        scores: &[f32],
        grid: &TileGrid,
    ) -> Result<Option<Intent>, PolicyError> {
        select_action(scores, grid, self.state.position(), &mut self.rng)
    }

    /// Applies an already-selected intent and records its consequences.
    ///
    /// Stepping a terminated episode is a caller bug, not a recoverable
    /// condition.
    pub fn apply(&mut self, intent: Option<Intent>, grid: TileGrid) -> StepOutcome {
        assert!(!self.finished, "episode already terminated");
        let outcome = apply_step(intent, grid, self.state, &self.config);
        self.state = outcome.state;
        self.finished = outcome.terminated;
        outcome
    }

    /// Selects with the given scores and applies the result in one call.
    pub fn take_action(
        &mut self,
        scores: &[f32],
        grid: TileGrid,
    ) -> Result<StepOutcome, PolicyError> {
        let intent = self.select(scores, &grid)?;
        Ok(self.apply(intent, grid))
    }
}

/// Built-in persona: hoard treasure, duck into survival mode when a fight
/// would be lethal and a potion is still reachable.
#[derive(Clone, Debug)]
pub struct TreasureHunter {
    policy: AgentPolicy,
    survival_mode: bool,
}

impl TreasureHunter {
    /// Spawns the persona at the grid's Start cell.
    pub fn spawn(grid: &TileGrid, config: PolicyConfig, seed: u64) -> Result<Self, PolicyError> {
        Ok(Self {
            policy: AgentPolicy::spawn(grid, config, seed)?,
            survival_mode: false,
        })
    }

    /// Current agent snapshot.
    #[must_use]
    pub const fn state(&self) -> AgentState {
        self.policy.state()
    }

    /// Whether the episode already ended.
    #[must_use]
    pub const fn finished(&self) -> bool {
        self.policy.finished()
    }

    /// Whether the persona is currently hunting a potion instead of loot.
    #[must_use]
    pub const fn survival_mode(&self) -> bool {
        self.survival_mode
    }

    fn can_survive_fight(&self) -> bool {
        self.policy.state().hp() > self.policy.config().monster_damage
    }

    /// Chooses the next intent, managing survival mode along the way.
    ///
    /// A lethal first step onto a monster triggers the potion probe: when
    /// a safe potion route exists the persona flips into survival mode and
    /// re-ranks with the survival preferences, otherwise it knowingly
    /// accepts the risky intent.
    pub fn choose(&mut self, grid: &TileGrid) -> Result<Option<Intent>, PolicyError> {
        if self.survival_mode {
            if self.can_survive_fight() {
                self.survival_mode = false;
            } else {
                return self.policy.select(&SURVIVAL_PREFERENCES, grid);
            }
        }

        let intended = self.policy.select(&STANDARD_PREFERENCES, grid)?;
        let Some(intent) = intended else {
            return Ok(None);
        };

        let position = self.policy.state().position();
        let steps_into_monster = next_step_for_intent(grid, position, intent)
            .and_then(|cell| grid.get(cell))
            == Some(Tile::Monster);
        if steps_into_monster
            && !self.can_survive_fight()
            && next_direction_for_intent(grid, position, Intent::SeekPotionSafely).is_some()
        {
            self.survival_mode = true;
            return self.policy.select(&SURVIVAL_PREFERENCES, grid);
        }

        Ok(intended)
    }

    /// Applies an already-chosen intent without re-running selection.
    ///
    /// Callers that need the intent alongside its consequences pair this
    /// with [`TreasureHunter::choose`]; stepping a terminated episode is a
    /// caller bug, as in [`AgentPolicy::apply`].
    pub fn apply(&mut self, intent: Option<Intent>, grid: TileGrid) -> StepOutcome {
        self.policy.apply(intent, grid)
    }

    /// Chooses and applies one step.
    pub fn step(&mut self, grid: TileGrid) -> Result<StepOutcome, PolicyError> {
        let intent = self.choose(&grid)?;
        Ok(self.apply(intent, grid))
    }
}
