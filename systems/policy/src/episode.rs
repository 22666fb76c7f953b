//! Bounded episode playback and batch aggregation.

use dungeon_forge_core::TileGrid;

use crate::{PolicyConfig, PolicyError, StepOutcome, TreasureHunter};

/// How a bounded episode ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpisodeOutcome {
    /// The agent reached the exit.
    Victory,
    /// The agent died fighting.
    Death,
    /// The step budget ran out first.
    OutOfSteps,
}

/// Result of one bounded playback run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeReport {
    /// Sum of per-step rewards over the whole episode.
    pub total_reward: f64,
    /// Steps actually taken.
    pub steps: u32,
    /// How the episode ended.
    pub outcome: EpisodeOutcome,
    /// Agent hit points when the episode ended.
    pub final_hp: i32,
}

/// Batch-level view the difficulty controller consumes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaySummary {
    /// Number of episodes aggregated.
    pub episodes: u32,
    /// Fraction of episodes that reached the exit.
    pub win_rate: f64,
    /// Mean total reward across episodes.
    pub average_reward: f64,
}

impl PlaySummary {
    /// Aggregates a batch of episode reports. An empty batch reports
    /// zeroes rather than dividing by it.
    #[must_use]
    pub fn from_reports(reports: &[EpisodeReport]) -> Self {
        if reports.is_empty() {
            return Self {
                episodes: 0,
                win_rate: 0.0,
                average_reward: 0.0,
            };
        }
        let episodes = reports.len() as u32;
        let wins = reports
            .iter()
            .filter(|report| report.outcome == EpisodeOutcome::Victory)
            .count();
        let reward_sum: f64 = reports.iter().map(|report| report.total_reward).sum();
        Self {
            episodes,
            win_rate: wins as f64 / f64::from(episodes),
            average_reward: reward_sum / f64::from(episodes),
        }
    }
}

/// Plays the hunter on the grid until termination or the step budget
/// runs out.
///
/// Playback is strictly sequential; the budget lives here rather than in
/// the step rule, which never truncates on its own.
pub fn run_episode(
    hunter: &mut TreasureHunter,
    grid: TileGrid,
    max_steps: u32,
) -> Result<EpisodeReport, PolicyError> {
    let mut grid = grid;
    let mut total_reward = 0.0;
    let mut steps = 0;

    while steps < max_steps {
        let StepOutcome {
            grid: next_grid,
            state,
            reward,
            terminated,
            ..
        } = hunter.step(grid)?;
        grid = next_grid;
        total_reward += reward;
        steps += 1;

        if terminated {
            let outcome = if state.hp() > 0 {
                EpisodeOutcome::Victory
            } else {
                EpisodeOutcome::Death
            };
            return Ok(EpisodeReport {
                total_reward,
                steps,
                outcome,
                final_hp: state.hp(),
            });
        }
    }

    Ok(EpisodeReport {
        total_reward,
        steps,
        outcome: EpisodeOutcome::OutOfSteps,
        final_hp: hunter.state().hp(),
    })
}

/// Spawns a fresh hunter on the stage and plays one bounded episode.
pub fn play_stage(
    grid: TileGrid,
    config: PolicyConfig,
    seed: u64,
    max_steps: u32,
) -> Result<EpisodeReport, PolicyError> {
    let mut hunter = TreasureHunter::spawn(&grid, config, seed)?;
    run_episode(&mut hunter, grid, max_steps)
}

#[cfg(test)]
mod tests {
    use super::{play_stage, EpisodeOutcome, EpisodeReport, PlaySummary};
    use crate::PolicyConfig;
    use dungeon_forge_core::TileGrid;

    fn grid(text: &str) -> TileGrid {
        TileGrid::parse(text).expect("test stages parse")
    }

    #[test]
    fn a_clear_corridor_is_a_quick_victory() {
        let report = play_stage(grid("S.E\n"), PolicyConfig::default(), 0, 100)
            .expect("stage has a start");
        assert_eq!(report.outcome, EpisodeOutcome::Victory);
        assert_eq!(report.steps, 2);
        assert_eq!(report.final_hp, 10);
        assert!((report.total_reward - 9.98).abs() < 1e-9);
    }

    #[test]
    fn an_unwinnable_fight_ends_in_death() {
        let config = PolicyConfig {
            max_hp: 4,
            ..PolicyConfig::default()
        };
        let report = play_stage(grid("SM\n"), config, 0, 100).expect("stage has a start");
        assert_eq!(report.outcome, EpisodeOutcome::Death);
        assert_eq!(report.steps, 1);
        assert_eq!(report.final_hp, -1);
        assert!((report.total_reward - (-0.01)).abs() < 1e-9);
    }

    #[test]
    fn an_empty_stage_runs_out_the_budget() {
        let report =
            play_stage(grid("S.\n"), PolicyConfig::default(), 0, 25).expect("stage has a start");
        assert_eq!(report.outcome, EpisodeOutcome::OutOfSteps);
        assert_eq!(report.steps, 25);
        assert!((report.total_reward - (-0.25)).abs() < 1e-9);
    }

    #[test]
    fn a_zero_budget_takes_no_steps() {
        let report =
            play_stage(grid("S.E\n"), PolicyConfig::default(), 0, 0).expect("stage has a start");
        assert_eq!(report.outcome, EpisodeOutcome::OutOfSteps);
        assert_eq!(report.steps, 0);
        assert_eq!(report.total_reward, 0.0);
    }

    #[test]
    fn summaries_average_over_the_batch() {
        let reports = [
            EpisodeReport {
                total_reward: 10.0,
                steps: 5,
                outcome: EpisodeOutcome::Victory,
                final_hp: 10,
            },
            EpisodeReport {
                total_reward: -2.0,
                steps: 30,
                outcome: EpisodeOutcome::Death,
                final_hp: -1,
            },
            EpisodeReport {
                total_reward: 1.0,
                steps: 100,
                outcome: EpisodeOutcome::OutOfSteps,
                final_hp: 4,
            },
            EpisodeReport {
                total_reward: 15.0,
                steps: 9,
                outcome: EpisodeOutcome::Victory,
                final_hp: 7,
            },
        ];
        let summary = PlaySummary::from_reports(&reports);
        assert_eq!(summary.episodes, 4);
        assert!((summary.win_rate - 0.5).abs() < 1e-9);
        assert!((summary.average_reward - 6.0).abs() < 1e-9);
    }

    #[test]
    fn empty_batches_summarize_to_zero() {
        let summary = PlaySummary::from_reports(&[]);
        assert_eq!(summary.episodes, 0);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.average_reward, 0.0);
    }
}
