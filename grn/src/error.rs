use std::path::PathBuf;

use polars::error::PolarsError;

/// Errors raised while predicting binding or building the network features.
#[derive(Debug, thiserror::Error)]
pub enum GrnError {
    #[error("table error: {0}")]
    Polars(#[from] PolarsError),

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("could not parse {path}: {source}")]
    Csv {
        source: csv::Error,
        path: PathBuf,
    },

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("no usable model: {0}")]
    MissingModel(String),

    #[error("reference data missing: {0}")]
    MissingReference(String),

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("regression failed: {0}")]
    Regression(String),
}

pub type Result<T> = std::result::Result<T, GrnError>;

impl GrnError {
    /// Wrap an `io::Error` with the path that triggered it.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    pub fn csv(source: csv::Error, path: impl Into<PathBuf>) -> Self {
        Self::Csv {
            source,
            path: path.into(),
        }
    }

    /// Errors caused by the data or model of a single factor. The batch driver
    /// skips these and keeps going with the remaining factors; anything else
    /// aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::MissingData(_)
                | Self::MissingModel(_)
                | Self::NotImplemented(_)
                | Self::Polars(_)
                | Self::Regression(_)
        )
    }
}

impl From<std::io::Error> for GrnError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from("<unknown>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_factor_errors_are_recoverable() {
        assert!(GrnError::MissingModel("general".into()).is_recoverable());
        assert!(GrnError::InvalidInput("no coefficient".into()).is_recoverable());
        let io = GrnError::io(std::io::Error::other("disk"), "/tmp/x");
        assert!(!io.is_recoverable());
        assert!(!GrnError::MissingReference("dir".into()).is_recoverable());
    }
}
