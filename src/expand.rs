use crate::match_log::{MatchRow, Outcome, TeamSide};

/// One player's part in one match. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipationRecord {
    pub match_id: u32,
    pub player_id: u32,
    pub team: TeamSide,
    pub goals_for: u32,
    pub goals_against: u32,
    pub result: Outcome,
}

/// Lazily yields one record per (match, team, occupied slot).
pub fn expand(rows: &[MatchRow]) -> impl Iterator<Item = ParticipationRecord> + '_ {
    rows.iter().flat_map(|row| {
        TeamSide::BOTH.into_iter().flat_map(move |side| {
            let sheet = row.side(side);
            let goals_against = row.side(side.opponent()).goals;
            sheet.present().map(move |player_id| ParticipationRecord {
                match_id: row.match_id,
                player_id,
                team: side,
                goals_for: sheet.goals,
                goals_against,
                result: sheet.result,
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::expand;
    use crate::match_log::{MatchRow, Outcome, SLOTS_PER_TEAM, TeamSheet, TeamSide};

    fn sheet(ids: &[u32], goals: u32, result: Outcome) -> TeamSheet {
        let mut players = [0u32; SLOTS_PER_TEAM];
        players[..ids.len()].copy_from_slice(ids);
        TeamSheet {
            players,
            goals,
            result,
        }
    }

    #[test]
    fn skips_empty_slots_and_mirrors_goals() {
        let rows = vec![MatchRow {
            match_id: 4,
            team1: sheet(&[10, 0, 11], 3, Outcome::Win),
            team2: sheet(&[12], 1, Outcome::Loss),
        }];
        let records: Vec<_> = expand(&rows).collect();
        assert_eq!(records.len(), 3);

        let p12 = records.iter().find(|r| r.player_id == 12).unwrap();
        assert_eq!(p12.team, TeamSide::Two);
        assert_eq!(p12.goals_for, 1);
        assert_eq!(p12.goals_against, 3);
        assert_eq!(p12.result, Outcome::Loss);

        let p10 = records.iter().find(|r| r.player_id == 10).unwrap();
        assert_eq!(p10.goals_for, 3);
        assert_eq!(p10.goals_against, 1);
    }

    #[test]
    fn full_teams_produce_sixteen_records() {
        let ids1: Vec<u32> = (1..=8).collect();
        let ids2: Vec<u32> = (9..=16).collect();
        let rows = vec![MatchRow {
            match_id: 1,
            team1: sheet(&ids1, 0, Outcome::Draw),
            team2: sheet(&ids2, 0, Outcome::Draw),
        }];
        assert_eq!(expand(&rows).count(), 16);
    }
}
