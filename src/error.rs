use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Debug, Error)]
pub enum StatsError {
    /// A required input file does not exist yet.
    #[error("input file not found: {}", path.display())]
    MissingInput { path: PathBuf },

    /// The input exists but holds no data rows.
    #[error("input file has no rows: {}", path.display())]
    EmptyInput { path: PathBuf },

    #[error("{}", format_data_error(*match_id, message))]
    DataFormat {
        match_id: Option<u32>,
        message: String,
    },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatsError {
    pub fn data_format(message: impl Into<String>) -> Self {
        Self::DataFormat {
            match_id: None,
            message: message.into(),
        }
    }

    pub fn bad_row(match_id: u32, message: impl Into<String>) -> Self {
        Self::DataFormat {
            match_id: Some(match_id),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the inputs simply have not been supplied yet, as opposed to
    /// a computation that ran and failed.
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::MissingInput { .. } | Self::EmptyInput { .. })
    }
}

fn format_data_error(match_id: Option<u32>, message: &str) -> String {
    match match_id {
        Some(id) => format!("bad match row {id}: {message}"),
        None => format!("bad data: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::StatsError;

    #[test]
    fn data_format_message_names_match() {
        let err = StatsError::bad_row(7, "invalid result code '2'");
        assert_eq!(err.to_string(), "bad match row 7: invalid result code '2'");
        assert!(!err.is_not_configured());
    }

    #[test]
    fn missing_and_empty_are_not_configured() {
        let missing = StatsError::MissingInput {
            path: "a.csv".into(),
        };
        let empty = StatsError::EmptyInput {
            path: "a.csv".into(),
        };
        assert!(missing.is_not_configured());
        assert!(empty.is_not_configured());
    }
}
