pub mod builder;
pub mod error;
pub mod worker;

pub use builder::WorkerBuilder;
pub use error::{Result, WorkerErr};
pub use worker::{Worker, serve, serve_stdio};
