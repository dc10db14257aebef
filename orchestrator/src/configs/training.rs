use std::num::NonZeroUsize;

use machine_learning::optimization::DescentConfig;

use crate::error::{OrchestratorError, Result};

/// How a one-vs-all model is trained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerConfig {
    /// The maximum amount of workers running at once.
    pub pool_size: NonZeroUsize,
    pub descent: DescentConfig,
    /// Whether workers report progress after each class.
    pub report_progress: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            pool_size: NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN),
            descent: DescentConfig::default(),
            report_progress: true,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        self.descent
            .validate()
            .map_err(|e| OrchestratorError::InvalidConfig(e.to_string()))
    }
}
