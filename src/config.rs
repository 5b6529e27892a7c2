use std::path::{Path, PathBuf};

use tracing::warn;

use crate::staleness::StalenessPolicy;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_FORM_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub match_data: PathBuf,
    pub player_keys: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub player_stats: PathBuf,
    pub player_form: PathBuf,
    pub match_count: PathBuf,
    pub log_digest: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub inputs: InputPaths,
    pub artifacts: ArtifactPaths,
    pub form_window: usize,
    pub staleness: StalenessPolicy,
}

impl AppConfig {
    /// Standard layout under `data_dir`: `raw/` for inputs, `calculated/` for
    /// everything this crate writes.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let raw = data_dir.join("raw");
        let calculated = data_dir.join("calculated");
        Self {
            inputs: InputPaths {
                match_data: raw.join("match_data.csv"),
                player_keys: raw.join("player_keys.csv"),
            },
            artifacts: ArtifactPaths {
                player_stats: calculated.join("player_stats.csv"),
                player_form: calculated.join("player_form.json"),
                match_count: calculated.join("match_count"),
                log_digest: calculated.join("match_data.sha256"),
            },
            data_dir,
            form_window: DEFAULT_FORM_WINDOW,
            staleness: StalenessPolicy::default(),
        }
    }

    /// Reads `SQUAD_STATS_*` variables. Callers load `.env` files first.
    pub fn from_env() -> Self {
        let data_dir =
            env_path("SQUAD_STATS_DATA_DIR").unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let mut cfg = Self::with_data_dir(data_dir);

        if let Some(path) = env_path("SQUAD_STATS_MATCH_DATA") {
            cfg.inputs.match_data = path;
        }
        if let Some(path) = env_path("SQUAD_STATS_PLAYER_KEYS") {
            cfg.inputs.player_keys = path;
        }
        if let Some(window) = std::env::var("SQUAD_STATS_FORM_WINDOW")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
        {
            cfg.form_window = window.max(1);
        }
        if let Ok(raw) = std::env::var("SQUAD_STATS_STALENESS") {
            match raw.parse::<StalenessPolicy>() {
                Ok(policy) => cfg.staleness = policy,
                Err(err) => warn!("ignoring SQUAD_STATS_STALENESS: {err}"),
            }
        }
        cfg
    }

    /// Re-roots every path that still points into the old data dir.
    pub fn rebase(self, data_dir: &Path) -> Self {
        let old = self.data_dir.clone();
        let mut next = Self::with_data_dir(data_dir);
        next.form_window = self.form_window;
        next.staleness = self.staleness;
        if !self.inputs.match_data.starts_with(&old) {
            next.inputs.match_data = self.inputs.match_data;
        }
        if !self.inputs.player_keys.starts_with(&old) {
            next.inputs.player_keys = self.inputs.player_keys;
        }
        next
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}
