//! Error taxonomy for the visualiser.
//!
//! Configuration errors are fatal and reported before (or at first detection
//! during) processing. Numeric, model, audio and render errors are fatal at
//! runtime. An unrecognised seed-set name typed into the window is not an
//! error at all; the display loop reports it and carries on.

use std::path::PathBuf;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid seed token '{0}': expected an integer or an ascending 'a-b' range of at most 65536 seeds")]
    InvalidSeedToken(String),

    #[error("either --seeds-list or --seeds-file must be specified (not both)")]
    SeedSourceConflict,

    #[error("seed set '{0}' contains no seeds")]
    EmptySeedSet(String),

    #[error("seed set '{0}' is defined more than once")]
    DuplicateSeedSet(String),

    #[error("unknown seed set '{0}'")]
    UnknownSeedSet(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seeds file: {0}")]
    SeedsFile(#[from] serde_yaml::Error),

    #[error(
        "too many seeds! the periodogram produced {available} bins but {requested} seeds were \
         requested; specify {available} or fewer seeds, or increase samples per image"
    )]
    TooManySeeds { available: usize, requested: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("expected {expected} weights (one per seed), got {actual}")]
    WeightCountMismatch { expected: usize, actual: usize },

    #[error("weighted noise vector has norm {0}; cannot normalise it")]
    DegenerateLatent(f64),

    #[error("model error: {0}")]
    Model(String),

    #[error("failed to parse network artifact: {0}")]
    NetworkArtifact(#[from] serde_json::Error),

    #[error("failed to serialise network artifact: {0}")]
    NetworkEncode(#[source] serde_json::Error),

    #[error("pipeline for seed set '{0}' stopped unexpectedly")]
    WorkerStopped(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("render error: {0}")]
    Render(String),
}

impl Error {
    /// True for errors caused by bad user-supplied configuration
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::InvalidSeedToken(_)
                | Error::SeedSourceConflict
                | Error::EmptySeedSet(_)
                | Error::DuplicateSeedSet(_)
                | Error::UnknownSeedSet(_)
                | Error::SeedsFile(_)
                | Error::TooManySeeds { .. }
                | Error::InvalidConfig(_)
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Write {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_classification() {
        assert!(Error::InvalidSeedToken("abc".into()).is_config());
        assert!(Error::TooManySeeds {
            available: 3,
            requested: 8
        }
        .is_config());
        assert!(!Error::DegenerateLatent(0.0).is_config());
        assert!(!Error::Audio("gone".into()).is_config());
    }

    #[test]
    fn test_write_errors_say_write() {
        let err = Error::write(
            "/nowhere/net.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().starts_with("failed to write /nowhere/net.json"));
        assert!(!err.is_config());
    }

    #[test]
    fn test_too_many_seeds_message_suggests_fix() {
        let msg = Error::TooManySeeds {
            available: 3,
            requested: 8,
        }
        .to_string();
        assert!(msg.contains("3 or fewer seeds"));
        assert!(msg.contains("increase samples per image"));
    }
}
