use std::collections::BTreeMap;

use tracing::info;

use crate::aggregate::{self, JoinReport, PlayerStats};
use crate::config::InputPaths;
use crate::error::Result;
use crate::expand::expand;
use crate::form::FormHistory;
use crate::match_log::{self, MatchRow, PlayerKeys};
use crate::staleness::CurrentLog;

/// Output of one full recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStats {
    pub stats: BTreeMap<u32, PlayerStats>,
    pub form: FormHistory,
    /// Max match id of the log the stats were computed from.
    pub marker: u32,
    pub log_digest: String,
    pub join: JoinReport,
    pub records: usize,
}

pub fn compute_from_rows(rows: &[MatchRow], keys: &PlayerKeys, log: CurrentLog) -> ComputedStats {
    let records = expand(rows).count();
    let mut stats = aggregate::aggregate(expand(rows));
    let form = FormHistory::build(expand(rows));
    let join = aggregate::join_player_names(&mut stats, keys);

    ComputedStats {
        stats,
        form,
        marker: log.max_match_id,
        log_digest: log.digest,
        join,
        records,
    }
}

/// Reads both inputs and runs the whole pipeline. Nothing is written.
pub fn compute(inputs: &InputPaths) -> Result<ComputedStats> {
    let raw = match_log::read_input_bytes(&inputs.match_data)?;
    let rows = match_log::parse_match_log(raw.as_slice(), &inputs.match_data)?;
    let keys = match_log::read_player_keys(&inputs.player_keys)?;
    let log = CurrentLog::from_rows(&rows, &raw)?;

    let computed = compute_from_rows(&rows, &keys, log);
    info!(
        matches = rows.len(),
        records = computed.records,
        players = computed.stats.len(),
        marker = computed.marker,
        "computed player stats"
    );
    Ok(computed)
}
