pub mod dataset;
pub mod error;
pub mod optimization;
mod test;
pub mod theta;

pub use dataset::TrainingSet;
pub use error::{MlErr, Result};
pub use theta::{ClassTheta, WeightMatrix};
