use std::path::PathBuf;

/// Errors on the decision channel between the search and control contexts.
///
/// The channel guarantees strict alternation of `READY`/`CHOICE` frames;
/// every violation is unrecoverable for the current run.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("decision channel disconnected")]
    Disconnected,

    #[error("malformed frame: {0:?}")]
    Malformed(String),

    #[error("unexpected frame {got:?} while waiting for {expected}")]
    UnexpectedFrame { got: String, expected: &'static str },

    #[error("alternation violated: {0}")]
    AlternationViolated(&'static str),
}

/// Errors raised by the branch-and-bound engine.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("unknown instance '{0}'")]
    UnknownInstance(String),

    #[error("model has no variables")]
    EmptyModel,

    #[error("branch callback failed: {0}")]
    Callback(#[from] ProtocolError),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Errors while writing persisted artifacts (CSV tables, plots, weights).
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to record model weights: {0}")]
    Record(String),

    #[error("failed to render plot: {0}")]
    Plot(String),
}

/// Errors that can occur during training.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("decision protocol failed: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),

    #[error("solver failed: {0}")]
    Solver(#[from] SolverError),
}
