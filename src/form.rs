use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expand::ParticipationRecord;
use crate::match_log::Outcome;

/// Per-player result history keyed by match id. Both levels are BTreeMaps,
/// so iteration and the serialized document are in ascending numeric order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormHistory {
    players: BTreeMap<u32, BTreeMap<u32, Outcome>>,
}

impl FormHistory {
    /// Rebuilds the full history from scratch.
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ParticipationRecord>,
    {
        let mut players: BTreeMap<u32, BTreeMap<u32, Outcome>> = BTreeMap::new();
        for record in records {
            players
                .entry(record.player_id)
                .or_default()
                .insert(record.match_id, record.result);
        }
        Self { players }
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.players.keys().copied()
    }

    pub fn matches_played(&self, player_id: u32) -> usize {
        self.players.get(&player_id).map_or(0, BTreeMap::len)
    }

    /// The last `window` results for a player, oldest first.
    pub fn recent(&self, player_id: u32, window: usize) -> Vec<(u32, Outcome)> {
        let Some(history) = self.players.get(&player_id) else {
            return Vec::new();
        };
        let skip = history.len().saturating_sub(window);
        history
            .iter()
            .skip(skip)
            .map(|(match_id, outcome)| (*match_id, *outcome))
            .collect()
    }

    pub fn form_string(&self, player_id: u32, window: usize) -> String {
        self.recent(player_id, window)
            .into_iter()
            .map(|(_, outcome)| outcome.letter())
            .collect()
    }

    /// One row per requested player, padded with `None` to the longest window
    /// so the rows line up column by column (oldest to most recent).
    pub fn window_table(&self, player_ids: &[u32], window: usize) -> Vec<FormRow> {
        let recents: Vec<Vec<(u32, Outcome)>> = player_ids
            .iter()
            .map(|id| self.recent(*id, window))
            .collect();
        let width = recents.iter().map(Vec::len).max().unwrap_or(0);

        player_ids
            .iter()
            .zip(recents)
            .map(|(player_id, recent)| {
                let mut cells: Vec<Option<(u32, Outcome)>> =
                    recent.into_iter().map(Some).collect();
                cells.resize(width, None);
                FormRow {
                    player_id: *player_id,
                    cells,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRow {
    pub player_id: u32,
    pub cells: Vec<Option<(u32, Outcome)>>,
}
