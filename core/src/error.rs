use std::path::PathBuf;

use packrun_protocol::TaskStatus;
use thiserror::Error;

/// Failures of background task operations. Spawn failures and timeouts are
/// never errors; they are encoded in the returned values.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("unknown task id: {task_id}")]
    NotFound {
        task_id: String,
        /// Ids currently registered, so callers can list them.
        known_ids: Vec<String>,
    },

    /// Stop requested on a task that is no longer running. Informational,
    /// not a hard failure.
    #[error("task {task_id} is not running (status: {})", .status.as_str())]
    AlreadyTerminal { task_id: String, status: TaskStatus },

    /// Signal delivery to the process failed (e.g. the process is already
    /// gone). A forced retry may still succeed.
    #[error("failed to terminate task {task_id}: {message}")]
    Termination { task_id: String, message: String },
}

/// Failures while resolving a project's context from its manifest.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("no package.json found in {0}")]
    ManifestMissing(PathBuf),

    #[error("failed to read {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
