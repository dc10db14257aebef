use std::ops::Range;

use comms::specs::{DescentSpec, TaskSpec};
use machine_learning::{TrainingSet, optimization::DescentConfig};

use super::TrainerConfig;

/// Builds the wire specification of the task handed to a worker.
///
/// # Arguments
/// * `worker_id` - The id of the worker that will run the task.
/// * `indexes` - The classes owned by the worker.
/// * `set` - The complete training set, only its shape is used.
/// * `config` - The trainer's configuration.
pub fn to_task_spec(
    worker_id: usize,
    indexes: Range<usize>,
    set: &TrainingSet,
    config: &TrainerConfig,
) -> TaskSpec {
    TaskSpec {
        worker_id,
        indexes,
        rows: set.rows(),
        features: set.features(),
        classes: set.classes(),
        descent: to_descent_spec(&config.descent),
        report_progress: config.report_progress,
    }
}

fn to_descent_spec(config: &DescentConfig) -> DescentSpec {
    let &DescentConfig {
        initial_learning_rate,
        learning_rate_divisor,
        tolerance,
        iterations_per_example,
    } = config;

    DescentSpec {
        initial_learning_rate,
        learning_rate_divisor,
        tolerance,
        iterations_per_example,
    }
}
