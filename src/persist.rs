use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::aggregate::PlayerStats;
use crate::config::ArtifactPaths;
use crate::error::{Result, StatsError};
use crate::form::FormHistory;
use crate::pipeline::ComputedStats;
use crate::staleness::StoredState;

/// Reads and writes the computed artifacts: the stats table (CSV), the form
/// history (JSON), the log digest and the match-count marker (plain text).
#[derive(Debug, Clone)]
pub struct StatsStore {
    paths: ArtifactPaths,
}

impl StatsStore {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Stages every artifact as a `.tmp` sibling, then renames them into
    /// place with the marker last. The old marker is removed before the first
    /// rename, so an interrupted save always reads back as stale.
    pub fn save(&self, computed: &ComputedStats) -> Result<()> {
        let staged = [
            (&self.paths.player_stats, encode_stats(computed)?),
            (
                &self.paths.player_form,
                serde_json::to_vec_pretty(&computed.form)?,
            ),
            (&self.paths.log_digest, computed.log_digest.clone().into_bytes()),
            (&self.paths.match_count, computed.marker.to_string().into_bytes()),
        ];

        let mut tmps = Vec::with_capacity(staged.len());
        for (path, bytes) in &staged {
            match stage(path, bytes) {
                Ok(tmp) => tmps.push(tmp),
                Err(err) => {
                    discard(&tmps);
                    return Err(err);
                }
            }
        }

        if let Err(err) = remove_if_exists(&self.paths.match_count) {
            discard(&tmps);
            return Err(err);
        }
        for (idx, ((path, _), tmp)) in staged.iter().zip(&tmps).enumerate() {
            if let Err(err) = fs::rename(tmp, path) {
                // Without a marker the partial set reads as uninitialized.
                discard(&tmps[idx..]);
                return Err(StatsError::io(*path, err));
            }
        }
        debug!(dir = %self.paths.player_stats.display(), "saved computed stats");
        Ok(())
    }

    pub fn load_stats(&self) -> Result<Option<Vec<PlayerStats>>> {
        let path = &self.paths.player_stats;
        let Some(raw) = read_optional(path)? else {
            return Ok(None);
        };
        let mut rdr = csv::Reader::from_reader(raw.as_bytes());
        let mut rows = Vec::new();
        for row in rdr.deserialize::<PlayerStats>() {
            let row = row.map_err(|err| {
                StatsError::data_format(format!("{}: {err}", path.display()))
            })?;
            rows.push(row);
        }
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows))
    }

    pub fn load_form(&self) -> Result<Option<FormHistory>> {
        let Some(raw) = read_optional(&self.paths.player_form)? else {
            return Ok(None);
        };
        let form = serde_json::from_str::<FormHistory>(&raw)?;
        Ok(Some(form))
    }

    pub fn load_marker(&self) -> Option<u32> {
        let path = &self.paths.match_count;
        let raw = read_optional(path).ok().flatten()?;
        match raw.trim().parse::<u32>() {
            Ok(marker) => Some(marker),
            Err(_) => {
                warn!(path = %path.display(), "unreadable match count marker");
                None
            }
        }
    }

    pub fn load_digest(&self) -> Option<String> {
        let raw = read_optional(&self.paths.log_digest).ok().flatten()?;
        Some(raw.trim().to_string())
    }

    /// Cheap summary for the staleness check; does not parse the stats table.
    pub fn load_stored_state(&self) -> StoredState {
        let has_stats = read_optional(&self.paths.player_stats)
            .ok()
            .flatten()
            .is_some_and(|raw| raw.lines().filter(|line| !line.trim().is_empty()).count() > 1);
        StoredState {
            has_stats,
            marker: self.load_marker(),
            digest: self.load_digest(),
        }
    }
}

fn encode_stats(computed: &ComputedStats) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for row in computed.stats.values() {
        wtr.serialize(row)?;
    }
    wtr.into_inner()
        .map_err(|err| StatsError::data_format(format!("flush stats table: {err}")))
}

/// Absent or blank files read as `None`.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StatsError::io(path, err)),
    }
}

fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| StatsError::io(parent, err))?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(|err| StatsError::io(&tmp, err))?;
    Ok(tmp)
}

/// Single-file variant of the save path: write a `.tmp` sibling, then rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = stage(path, bytes)?;
    fs::rename(&tmp, path).map_err(|err| StatsError::io(path, err))
}

fn discard(tmps: &[PathBuf]) {
    for tmp in tmps {
        let _ = fs::remove_file(tmp);
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StatsError::io(path, err)),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::tmp_path;

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("data/calculated/match_count")),
            Path::new("data/calculated/match_count.tmp")
        );
        assert_eq!(
            tmp_path(Path::new("player_stats.csv")),
            Path::new("player_stats.csv.tmp")
        );
    }
}
