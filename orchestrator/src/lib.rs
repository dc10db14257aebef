pub mod classifier;
pub mod configs;
pub mod error;
pub mod launcher;
mod merge;
pub mod pool;
pub mod store;
pub mod trainer;

pub use classifier::{Classification, Classifier};
pub use configs::TrainerConfig;
pub use error::{OrchestratorError, Result};
pub use launcher::{InProcessLauncher, Launcher, ProcessLauncher, Spawned};
pub use pool::WorkerPool;
pub use store::ExampleStore;
pub use trainer::{OneVsAllTrainer, TrainerBuilder};
