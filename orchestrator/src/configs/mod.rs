mod adapter;
mod training;

pub(crate) use adapter::to_task_spec;
pub use training::TrainerConfig;
