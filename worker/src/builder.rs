use comms::specs::{DescentSpec, TaskSpec};
use machine_learning::{
    MlErr, TrainingSet,
    optimization::{DescentConfig, GradientDescent},
};

use crate::{Result, Worker};

/// Builds `Worker`s out of the task received from the orchestrator.
#[derive(Default)]
pub struct WorkerBuilder;

impl WorkerBuilder {
    /// Creates a new `WorkerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a `Worker` from a `TaskSpec` and the training data that followed it.
    ///
    /// # Arguments
    /// * `spec` - The task specification received from the orchestrator.
    /// * `design` - The row major design matrix.
    /// * `classification` - The row major classification matrix.
    ///
    /// # Returns
    /// A fully initialized `Worker` or an error if the data doesn't match the task's shapes.
    pub fn build(&self, spec: TaskSpec, design: Vec<f64>, classification: Vec<f64>) -> Result<Worker> {
        let TaskSpec {
            worker_id,
            indexes,
            rows,
            features,
            classes,
            descent,
            report_progress,
        } = spec;

        if indexes.end > classes {
            return Err(MlErr::UnknownClass {
                class: indexes.end - 1,
                classes,
            }
            .into());
        }

        let set = TrainingSet::from_raw(rows, features, classes, design, classification)?;
        let descent = GradientDescent::new(self.resolve_descent(descent))?;

        Ok(Worker::new(worker_id, indexes, set, descent, report_progress))
    }

    fn resolve_descent(&self, spec: DescentSpec) -> DescentConfig {
        let DescentSpec {
            initial_learning_rate,
            learning_rate_divisor,
            tolerance,
            iterations_per_example,
        } = spec;

        DescentConfig {
            initial_learning_rate,
            learning_rate_divisor,
            tolerance,
            iterations_per_example,
        }
    }
}
