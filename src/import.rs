use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::config::InputPaths;
use crate::error::{Result, StatsError};
use crate::match_log;
use crate::persist::write_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    MatchData,
    PlayerKeys,
}

impl InputKind {
    pub fn destination(self, inputs: &InputPaths) -> &Path {
        match self {
            Self::MatchData => &inputs.match_data,
            Self::PlayerKeys => &inputs.player_keys,
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatchData => write!(f, "match data"),
            Self::PlayerKeys => write!(f, "player keys"),
        }
    }
}

impl FromStr for InputKind {
    type Err = StatsError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "match-data" | "matches" => Ok(Self::MatchData),
            "player-keys" | "players" => Ok(Self::PlayerKeys),
            other => Err(StatsError::data_format(format!(
                "unknown input kind '{other}' (expected 'match-data' or 'player-keys')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub kind: InputKind,
    pub dest: PathBuf,
    pub rows: usize,
    pub max_match_id: Option<u32>,
}

/// Validates `src` fully before copying it over `dest`, so a bad upload never
/// replaces a good input.
pub fn import_csv(kind: InputKind, src: &Path, dest: &Path) -> Result<ImportSummary> {
    let is_csv = src
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(StatsError::data_format(format!(
            "{} must be a .csv file",
            src.display()
        )));
    }

    let bytes = match_log::read_input_bytes(src)?;
    let (rows, max_match_id) = match kind {
        InputKind::MatchData => {
            let rows = match_log::parse_match_log(bytes.as_slice(), src)?;
            (rows.len(), match_log::max_match_id(&rows))
        }
        InputKind::PlayerKeys => {
            let keys = match_log::parse_player_keys(bytes.as_slice(), src)?;
            (keys.len(), None)
        }
    };

    write_atomic(dest, &bytes)?;
    info!(%kind, rows, dest = %dest.display(), "imported input file");
    Ok(ImportSummary {
        kind,
        dest: dest.to_path_buf(),
        rows,
        max_match_id,
    })
}
