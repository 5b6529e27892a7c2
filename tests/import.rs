use std::fs;
use std::path::PathBuf;

use squad_stats::error::StatsError;
use squad_stats::import::{InputKind, import_csv};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

#[test]
fn valid_match_log_is_copied_into_place() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("raw").join("match_data.csv");
    let summary = import_csv(InputKind::MatchData, &fixture_path("season.csv"), &dest).unwrap();

    assert_eq!(summary.rows, 5);
    assert_eq!(summary.max_match_id, Some(11));
    assert_eq!(fs::read(&dest).unwrap(), fs::read(fixture_path("season.csv")).unwrap());
}

#[test]
fn player_keys_report_row_count() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("player_keys.csv");
    let summary =
        import_csv(InputKind::PlayerKeys, &fixture_path("player_keys.csv"), &dest).unwrap();
    assert_eq!(summary.rows, 10);
    assert_eq!(summary.max_match_id, None);
}

#[test]
fn wrong_header_leaves_existing_input_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("match_data.csv");
    fs::copy(fixture_path("two_matches.csv"), &dest).unwrap();

    // A player keys file uploaded as the match log.
    let err = import_csv(InputKind::MatchData, &fixture_path("player_keys.csv"), &dest)
        .unwrap_err();
    assert!(matches!(err, StatsError::DataFormat { .. }));
    assert_eq!(
        fs::read(&dest).unwrap(),
        fs::read(fixture_path("two_matches.csv")).unwrap()
    );
}

#[test]
fn non_csv_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("match_data.xlsx");
    fs::copy(fixture_path("two_matches.csv"), &src).unwrap();
    let dest = dir.path().join("match_data.csv");

    let err = import_csv(InputKind::MatchData, &src, &dest).unwrap_err();
    assert!(err.to_string().contains(".csv"));
    assert!(!dest.exists());
}
