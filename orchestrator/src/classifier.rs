use serde::Serialize;

use crate::error::Result;

/// A label along with how strongly an observation belongs to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification<L> {
    pub label: L,
    /// The class probability, in `(0, 1)`.
    pub score: f64,
}

/// Learns labels out of examples and ranks them for new observations.
pub trait Classifier<L> {
    /// Adds a labelled example, returning the class index of its label.
    fn add_example(&mut self, features: Vec<f64>, label: L) -> Result<usize>;

    /// Fits the model to every example added so far.
    fn train(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Ranks every known label for an observation, best first.
    fn classify(&self, observation: &[f64]) -> Result<Vec<Classification<L>>>;
}
