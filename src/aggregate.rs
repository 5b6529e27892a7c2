use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::expand::ParticipationRecord;
use crate::match_log::{Outcome, PlayerKeys};

/// Cumulative record for one player. Field order is the column order of the
/// persisted stats table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player_name: Option<String>,
    pub player_id: u32,
    pub total_matches: u32,
    pub total_wins: u32,
    pub total_draws: u32,
    pub total_losses: u32,
    pub total_goals_for: u64,
    pub total_goals_against: u64,
    pub win_pct: f64,
    pub draw_pct: f64,
    pub loss_pct: f64,
}

impl PlayerStats {
    pub fn new(player_id: u32) -> Self {
        Self {
            player_name: None,
            player_id,
            total_matches: 0,
            total_wins: 0,
            total_draws: 0,
            total_losses: 0,
            total_goals_for: 0,
            total_goals_against: 0,
            win_pct: 0.0,
            draw_pct: 0.0,
            loss_pct: 0.0,
        }
    }

    fn add(&mut self, record: &ParticipationRecord) {
        self.total_matches += 1;
        self.total_goals_for += u64::from(record.goals_for);
        self.total_goals_against += u64::from(record.goals_against);
        match record.result {
            Outcome::Win => self.total_wins += 1,
            Outcome::Draw => self.total_draws += 1,
            Outcome::Loss => self.total_losses += 1,
        }
    }

    fn finish_percentages(&mut self) {
        if self.total_matches == 0 {
            self.win_pct = 0.0;
            self.draw_pct = 0.0;
            self.loss_pct = 0.0;
            return;
        }
        let total = f64::from(self.total_matches);
        self.win_pct = round1(f64::from(self.total_wins) / total * 100.0);
        self.draw_pct = round1(f64::from(self.total_draws) / total * 100.0);
        self.loss_pct = round1(f64::from(self.total_losses) / total * 100.0);
    }

    pub fn goal_difference(&self) -> i64 {
        self.total_goals_for as i64 - self.total_goals_against as i64
    }

    pub fn display_name(&self) -> String {
        match self.player_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("#{}", self.player_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub matched: usize,
    /// Player ids with stats but no entry in the key table.
    pub unmatched: Vec<u32>,
}

/// Folds participation records into per-player totals. Only counters are
/// accumulated, so record order has no effect on the result.
pub fn aggregate<I>(records: I) -> BTreeMap<u32, PlayerStats>
where
    I: IntoIterator<Item = ParticipationRecord>,
{
    let mut stats: BTreeMap<u32, PlayerStats> = BTreeMap::new();
    for record in records {
        stats
            .entry(record.player_id)
            .or_insert_with(|| PlayerStats::new(record.player_id))
            .add(&record);
    }
    for entry in stats.values_mut() {
        entry.finish_percentages();
    }
    stats
}

/// Left join against the key table; unknown ids keep an empty name.
pub fn join_player_names(stats: &mut BTreeMap<u32, PlayerStats>, keys: &PlayerKeys) -> JoinReport {
    let mut report = JoinReport::default();
    for (player_id, entry) in stats.iter_mut() {
        match keys.get(player_id) {
            Some(name) => {
                // Blank names are written as empty CSV fields and read back as None.
                entry.player_name = (!name.is_empty()).then(|| name.clone());
                report.matched += 1;
            }
            None => {
                entry.player_name = None;
                report.unmatched.push(*player_id);
            }
        }
    }
    if !report.unmatched.is_empty() {
        warn!(
            unmatched = ?report.unmatched,
            "players missing from the player key table"
        );
    }
    report
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::{PlayerStats, aggregate, join_player_names, round1};
    use crate::expand::ParticipationRecord;
    use crate::match_log::{Outcome, PlayerKeys, TeamSide};

    fn rec(match_id: u32, player_id: u32, gf: u32, ga: u32, result: Outcome) -> ParticipationRecord {
        ParticipationRecord {
            match_id,
            player_id,
            team: TeamSide::One,
            goals_for: gf,
            goals_against: ga,
            result,
        }
    }

    #[test]
    fn thirds_round_to_one_decimal() {
        let records = vec![
            rec(1, 5, 1, 0, Outcome::Win),
            rec(2, 5, 0, 0, Outcome::Draw),
            rec(3, 5, 0, 1, Outcome::Loss),
        ];
        let stats = aggregate(records);
        let p = &stats[&5];
        assert_eq!(p.win_pct, 33.3);
        assert_eq!(p.draw_pct, 33.3);
        assert_eq!(p.loss_pct, 33.3);
        assert_eq!(p.total_wins + p.total_draws + p.total_losses, p.total_matches);
    }

    #[test]
    fn fold_ignores_record_order() {
        let mut records = vec![
            rec(1, 1, 2, 1, Outcome::Win),
            rec(2, 1, 0, 0, Outcome::Draw),
            rec(3, 2, 1, 4, Outcome::Loss),
            rec(4, 1, 3, 3, Outcome::Draw),
        ];
        let forward = aggregate(records.clone());
        records.reverse();
        assert_eq!(forward, aggregate(records));
    }

    #[test]
    fn zero_matches_keep_zero_percentages() {
        let mut p = PlayerStats::new(9);
        p.finish_percentages();
        assert_eq!((p.win_pct, p.draw_pct, p.loss_pct), (0.0, 0.0, 0.0));
    }

    #[test]
    fn join_keeps_unknown_players() {
        let mut stats = aggregate(vec![
            rec(1, 1, 1, 0, Outcome::Win),
            rec(1, 7, 0, 1, Outcome::Loss),
        ]);
        let keys = PlayerKeys::from([(1, "Ana".to_string())]);
        let report = join_player_names(&mut stats, &keys);
        assert_eq!(report.matched, 1);
        assert_eq!(report.unmatched, vec![7]);
        assert_eq!(stats[&1].player_name.as_deref(), Some("Ana"));
        assert_eq!(stats[&7].player_name, None);
        assert_eq!(stats[&7].display_name(), "#7");
    }

    #[test]
    fn blank_key_name_joins_as_unnamed() {
        let mut stats = aggregate(vec![rec(1, 1, 1, 0, Outcome::Win)]);
        let keys = PlayerKeys::from([(1, String::new())]);
        let report = join_player_names(&mut stats, &keys);
        assert_eq!(report.matched, 1);
        assert!(report.unmatched.is_empty());
        assert_eq!(stats[&1].player_name, None);
    }

    #[test]
    fn round1_handles_halves() {
        assert_eq!(round1(66.66666), 66.7);
        assert_eq!(round1(12.5), 12.5);
    }
}
