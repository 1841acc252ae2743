#[cfg(feature = "live")]
use std::sync::mpsc::RecvError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("No task named '{0}' is registered")]
    TaskNotFound(String),

    #[error("Task '{0}':\n{1}")]
    Task(String, TaskError),

    #[cfg(feature = "live")]
    #[error("Error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),
}

/// Failure of a single named task; dependents of the failed task never run.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Transform '{0}' failed on '{1}':\n{2}")]
    Transform(String, String, anyhow::Error),

    #[error(transparent)]
    Freeze(#[from] FreezeError),
}

/// Errors raised by the freeze stage while persisting the manifest.
#[derive(Debug, Error)]
pub enum FreezeError {
    #[error("Couldn't write manifest to '{0}':\n{1}")]
    ManifestWrite(String, std::io::Error),

    #[error("Couldn't serialize manifest:\n{0}")]
    ManifestFormat(#[from] serde_json::Error),
}

#[cfg(feature = "live")]
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Recv(#[from] RecvError),

    #[error("Couldn't resolve watch root for '{0}'")]
    WatchRoot(String),
}
