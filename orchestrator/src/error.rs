use std::{fmt, io};

use machine_learning::MlErr;
use tokio::task::JoinError;

/// The result type used in the entire orchestrator.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before launching any worker.
    InvalidConfig(String),
    /// A class couldn't be fitted within the iteration cap.
    Diverged {
        class_index: usize,
        iterations: usize,
    },
    /// A worker reported an error, exited abnormally or hung up before its result.
    WorkerFailed { worker_id: usize, msg: String },
    /// A worker sent a message out of place or a result that doesn't fit.
    Protocol { worker_id: usize, msg: String },
    /// Failed to start a worker.
    Launch {
        worker_id: usize,
        source: io::Error,
    },
    /// Classification was requested before a completed training.
    NotTrained,
    /// Training was requested without any example.
    NoExamples,
    /// A feature vector doesn't have the length of the first example.
    FeatureMismatch { got: usize, expected: usize },
    /// The training was cancelled before every worker finished.
    Cancelled,
    /// A snapshot couldn't be written or read.
    Snapshot(serde_json::Error),
    Ml(MlErr),
    Join(JoinError),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Diverged {
                class_index,
                iterations,
            } => write!(
                f,
                "unable to find minimum for class {class_index} after {iterations} iterations"
            ),
            Self::WorkerFailed { worker_id, msg } => write!(f, "worker {worker_id} failed: {msg}"),
            Self::Protocol { worker_id, msg } => {
                write!(f, "protocol error with worker {worker_id}: {msg}")
            }
            Self::Launch { worker_id, source } => {
                write!(f, "couldn't launch worker {worker_id}: {source}")
            }
            Self::NotTrained => write!(f, "the classifier hasn't been trained"),
            Self::NoExamples => write!(f, "there are no examples to train with"),
            Self::FeatureMismatch { got, expected } => {
                write!(f, "expected {expected} features, got {got}")
            }
            Self::Cancelled => write!(f, "training cancelled"),
            Self::Snapshot(e) => write!(f, "snapshot error: {e}"),
            Self::Ml(e) => write!(f, "{e}"),
            Self::Join(e) => write!(f, "worker conversation task failed: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Launch { source, .. } => Some(source),
            Self::Snapshot(e) => Some(e),
            Self::Ml(e) => Some(e),
            Self::Join(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for OrchestratorError {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Snapshot(e)
    }
}
