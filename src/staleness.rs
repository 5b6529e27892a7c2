use std::fmt;
use std::path::Path;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::{Result, StatsError};
use crate::match_log::{self, MatchRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalenessPolicy {
    /// Valid when the stored marker equals the log's max match id.
    MaxMatchId,
    /// As above, and the stored log digest (when there is one) must match too.
    #[default]
    ContentDigest,
}

impl FromStr for StalenessPolicy {
    type Err = StatsError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "max-id" | "max_id" | "maxid" => Ok(Self::MaxMatchId),
            "digest" | "sha256" | "content" => Ok(Self::ContentDigest),
            other => Err(StatsError::data_format(format!(
                "unknown staleness policy '{other}' (expected 'digest' or 'max-id')"
            ))),
        }
    }
}

/// What the persisted artifacts say about the last computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredState {
    pub has_stats: bool,
    pub marker: Option<u32>,
    pub digest: Option<String>,
}

/// What the raw log looks like right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentLog {
    pub max_match_id: u32,
    pub digest: String,
}

impl CurrentLog {
    pub fn from_rows(rows: &[MatchRow], raw: &[u8]) -> Result<Self> {
        let max_match_id = match_log::max_match_id(rows)
            .ok_or_else(|| StatsError::data_format("match log has no rows"))?;
        Ok(Self {
            max_match_id,
            digest: digest_bytes(raw),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Uninitialized,
    MarkerMissing,
    Stale { stored: u32, current: u32 },
    Edited,
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "stats are up to date"),
            Self::Uninitialized => write!(f, "stats have not been computed yet"),
            Self::MarkerMissing => write!(f, "match count marker is missing"),
            Self::Stale { stored, current } => write!(
                f,
                "match log has {current} matches but stats are based on {stored}"
            ),
            Self::Edited => write!(f, "match log was edited since stats were computed"),
        }
    }
}

pub fn check(current: &CurrentLog, stored: &StoredState, policy: StalenessPolicy) -> Validity {
    if !stored.has_stats {
        return Validity::Uninitialized;
    }
    let Some(marker) = stored.marker else {
        return Validity::MarkerMissing;
    };
    if marker != current.max_match_id {
        return Validity::Stale {
            stored: marker,
            current: current.max_match_id,
        };
    }
    if policy == StalenessPolicy::ContentDigest
        && let Some(digest) = stored.digest.as_deref()
        && digest != current.digest
    {
        return Validity::Edited;
    }
    Validity::Valid
}

/// Reads and validates the raw log, returning its max id and digest.
pub fn inspect_log(path: &Path) -> Result<CurrentLog> {
    let raw = match_log::read_input_bytes(path)?;
    let rows = match_log::parse_match_log(raw.as_slice(), path)?;
    CurrentLog::from_rows(&rows, &raw)
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::{CurrentLog, StalenessPolicy, StoredState, Validity, check, digest_bytes};

    fn current(max: u32, digest: &str) -> CurrentLog {
        CurrentLog {
            max_match_id: max,
            digest: digest.to_string(),
        }
    }

    fn stored(marker: Option<u32>, digest: Option<&str>) -> StoredState {
        StoredState {
            has_stats: true,
            marker,
            digest: digest.map(str::to_string),
        }
    }

    #[test]
    fn marker_equal_to_max_is_valid() {
        let v = check(&current(5, "a"), &stored(Some(5), None), StalenessPolicy::MaxMatchId);
        assert_eq!(v, Validity::Valid);
    }

    #[test]
    fn new_match_makes_stats_stale() {
        let v = check(&current(6, "a"), &stored(Some(5), None), StalenessPolicy::MaxMatchId);
        assert_eq!(
            v,
            Validity::Stale {
                stored: 5,
                current: 6
            }
        );
    }

    #[test]
    fn missing_stats_or_marker_force_recompute() {
        let none = StoredState::default();
        assert_eq!(
            check(&current(1, "a"), &none, StalenessPolicy::MaxMatchId),
            Validity::Uninitialized
        );
        assert_eq!(
            check(&current(1, "a"), &stored(None, None), StalenessPolicy::MaxMatchId),
            Validity::MarkerMissing
        );
    }

    #[test]
    fn digest_policy_catches_in_place_edits() {
        let s = stored(Some(5), Some("old"));
        assert_eq!(
            check(&current(5, "new"), &s, StalenessPolicy::ContentDigest),
            Validity::Edited
        );
        assert_eq!(
            check(&current(5, "new"), &s, StalenessPolicy::MaxMatchId),
            Validity::Valid
        );
    }

    #[test]
    fn digest_policy_without_stored_digest_falls_back_to_max_id() {
        let v = check(&current(5, "x"), &stored(Some(5), None), StalenessPolicy::ContentDigest);
        assert!(v.is_valid());
    }

    #[test]
    fn policy_parses_from_env_strings() {
        assert_eq!("max-id".parse::<StalenessPolicy>().unwrap(), StalenessPolicy::MaxMatchId);
        assert_eq!(" Digest ".parse::<StalenessPolicy>().unwrap(), StalenessPolicy::ContentDigest);
        assert!("sometimes".parse::<StalenessPolicy>().is_err());
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            digest_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
