use std::{num::NonZeroUsize, ops::Range};

use serde::{Deserialize, Serialize};

/// Wire-level settings of the per class gradient descent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DescentSpec {
    pub initial_learning_rate: f64,
    pub learning_rate_divisor: f64,
    pub tolerance: f64,
    pub iterations_per_example: NonZeroUsize,
}

/// Wire-level specification of the work handed to a single worker.
///
/// It's followed on the channel by the design matrix and then by the
/// classification matrix, both sent as data frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Worker identifier assigned by the orchestrator, used for observability.
    pub worker_id: usize,
    /// The contiguous range of class indices this worker owns.
    pub indexes: Range<usize>,
    /// Amount of examples, the rows of both matrices.
    pub rows: usize,
    /// Columns of the design matrix.
    pub features: usize,
    /// Columns of the classification matrix.
    pub classes: usize,
    pub descent: DescentSpec,
    /// Whether to emit a progress message after each class.
    pub report_progress: bool,
}
