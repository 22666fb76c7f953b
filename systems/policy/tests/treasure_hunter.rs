use dungeon_forge_core::{Position, TileGrid};
use dungeon_forge_system_policy::{
    run_episode, EpisodeOutcome, PolicyConfig, TreasureHunter,
};

// A gauntlet with two monsters on the loot row, a potion bolt-hole in the
// bottom corner, and the exit behind the treasure:
//
//   S M . M T
//   . # # # E
//   P # # # #
//
// The hunter kills the first monster, drops to exactly lethal health,
// retreats into survival mode for the potion, then returns to finish the
// second monster, the treasure, and the exit.
const GAUNTLET: &str = "SM.MT\n.###E\nP####\n";

fn gauntlet() -> TileGrid {
    TileGrid::parse(GAUNTLET).expect("gauntlet stage parses")
}

#[test]
fn the_gauntlet_is_won_through_survival_mode() {
    let mut hunter =
        TreasureHunter::spawn(&gauntlet(), PolicyConfig::default(), 11).expect("stage has a start");
    let report = run_episode(&mut hunter, gauntlet(), 100).expect("vectors are well formed");

    assert_eq!(report.outcome, EpisodeOutcome::Victory);
    assert_eq!(report.steps, 13);
    assert_eq!(report.final_hp, 5);
    // Two kills, one potion, one treasure, the exit, and eight plain
    // steps: 4.99 + 4.99 + 1.99 + 0.99 + 9.99 - 0.08.
    assert!((report.total_reward - 22.87).abs() < 1e-9);
    assert!(!hunter.survival_mode());
}

#[test]
fn a_lethal_first_step_flips_into_survival_mode() {
    let mut hunter =
        TreasureHunter::spawn(&gauntlet(), PolicyConfig::default(), 11).expect("stage has a start");
    let mut grid = gauntlet();

    // Step 1 kills the first monster and drops to exactly lethal health.
    let outcome = hunter.step(grid).expect("vector is well formed");
    grid = outcome.grid;
    assert_eq!(hunter.state().hp(), 5);
    assert_eq!(hunter.state().position(), Position::new(1, 0));
    assert!(!hunter.survival_mode());

    // Step 2 advances along the loot row; the monster is not yet the
    // immediate next step, so no survival trigger fires.
    let outcome = hunter.step(grid).expect("vector is well formed");
    grid = outcome.grid;
    assert_eq!(hunter.state().position(), Position::new(2, 0));
    assert!(!hunter.survival_mode());

    // Step 3 would walk into the second monster at lethal health; the
    // potion probe succeeds and the hunter turns back.
    let _ = hunter.step(grid).expect("vector is well formed");
    assert!(hunter.survival_mode());
    assert_eq!(hunter.state().position(), Position::new(1, 0));
}

#[test]
fn survival_mode_clears_once_a_fight_is_survivable_again() {
    let mut hunter =
        TreasureHunter::spawn(&gauntlet(), PolicyConfig::default(), 11).expect("stage has a start");
    let mut grid = gauntlet();

    // Steps 1-6: first kill, retreat, and the potion pickup.
    for _ in 0..6 {
        let outcome = hunter.step(grid).expect("vector is well formed");
        grid = outcome.grid;
    }
    assert_eq!(hunter.state().hp(), 10);
    assert_eq!(hunter.state().position(), Position::new(0, 2));
    assert!(hunter.survival_mode());

    // The next choice sees a survivable fight and leaves survival mode.
    let _ = hunter.step(grid).expect("vector is well formed");
    assert!(!hunter.survival_mode());
    assert_eq!(hunter.state().position(), Position::new(0, 1));
}
