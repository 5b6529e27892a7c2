use std::fs;
use std::path::{Path, PathBuf};

use squad_stats::expand::expand;
use squad_stats::match_log::{Outcome, PlayerKeys, parse_match_log, parse_player_keys};
use squad_stats::pipeline::{ComputedStats, compute_from_rows};
use squad_stats::staleness::CurrentLog;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn read_fixture(name: &str) -> Vec<u8> {
    fs::read(fixture_path(name)).expect("fixture file should be readable")
}

fn keys() -> PlayerKeys {
    let raw = read_fixture("player_keys.csv");
    parse_player_keys(raw.as_slice(), Path::new("player_keys.csv")).expect("keys should parse")
}

fn run(name: &str) -> ComputedStats {
    let raw = read_fixture(name);
    let rows = parse_match_log(raw.as_slice(), Path::new(name)).expect("fixture should parse");
    let log = CurrentLog::from_rows(&rows, &raw).expect("log has rows");
    compute_from_rows(&rows, &keys(), log)
}

#[test]
fn two_match_scenario_totals() {
    let computed = run("two_matches.csv");

    let p1 = &computed.stats[&1];
    assert_eq!(p1.player_name.as_deref(), Some("Alex"));
    assert_eq!(p1.total_matches, 2);
    assert_eq!(
        (p1.total_wins, p1.total_draws, p1.total_losses),
        (1, 1, 0)
    );
    assert_eq!((p1.total_goals_for, p1.total_goals_against), (2, 1));
    assert_eq!((p1.win_pct, p1.draw_pct, p1.loss_pct), (50.0, 50.0, 0.0));

    let p3 = &computed.stats[&3];
    assert_eq!(p3.total_matches, 2);
    assert_eq!(
        (p3.total_wins, p3.total_draws, p3.total_losses),
        (0, 1, 1)
    );
    assert_eq!((p3.total_goals_for, p3.total_goals_against), (1, 2));

    assert_eq!(computed.marker, 2);
    assert_eq!(computed.records, 6);
    assert!(computed.join.unmatched.is_empty());
}

#[test]
fn window_of_one_returns_latest_match() {
    let computed = run("two_matches.csv");
    assert_eq!(computed.form.recent(1, 1), vec![(2, Outcome::Draw)]);
    assert_eq!(
        computed.form.recent(2, 5),
        vec![(1, Outcome::Win), (2, Outcome::Draw)]
    );
}

#[test]
fn column_order_does_not_change_results() {
    let plain = run("two_matches.csv");
    let reordered = run("two_matches_reordered.csv");
    assert_eq!(plain.stats, reordered.stats);
    assert_eq!(plain.form, reordered.form);
}

#[test]
fn expander_emits_one_record_per_occupied_slot() {
    let raw = read_fixture("season.csv");
    let rows = parse_match_log(raw.as_slice(), Path::new("season.csv")).unwrap();
    let occupied: usize = rows
        .iter()
        .map(|row| row.team1.present().count() + row.team2.present().count())
        .sum();
    assert_eq!(occupied, 46);
    assert_eq!(expand(&rows).count(), occupied);
}

#[test]
fn season_counters_and_percentages_hold_invariants() {
    let computed = run("season.csv");
    for p in computed.stats.values() {
        assert_eq!(p.total_wins + p.total_draws + p.total_losses, p.total_matches);
        assert!(p.total_matches > 0);
        let pct_sum = p.win_pct + p.draw_pct + p.loss_pct;
        assert!((pct_sum - 100.0).abs() <= 0.2, "player {} sums to {pct_sum}", p.player_id);
    }

    let p1 = &computed.stats[&1];
    assert_eq!(p1.total_matches, 5);
    assert_eq!((p1.total_wins, p1.total_draws, p1.total_losses), (1, 2, 2));
    assert_eq!((p1.total_goals_for, p1.total_goals_against), (8, 9));
    assert_eq!((p1.win_pct, p1.draw_pct, p1.loss_pct), (20.0, 40.0, 40.0));
    assert_eq!(computed.form.form_string(1, 3), "LLD");
    assert_eq!(computed.marker, 11);
}

#[test]
fn unknown_player_keeps_row_with_empty_name() {
    let computed = run("season.csv");
    assert_eq!(computed.join.unmatched, vec![11]);
    let p11 = &computed.stats[&11];
    assert_eq!(p11.player_name, None);
    assert_eq!(p11.total_matches, 1);
    assert_eq!(p11.total_wins, 0);
}

#[test]
fn repeated_runs_are_identical() {
    assert_eq!(run("season.csv"), run("season.csv"));
}
