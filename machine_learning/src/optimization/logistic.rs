use ndarray::{Array1, ArrayView1, ArrayView2};

/// The logistic function.
pub fn sigmoid(z: f64) -> f64 {
    1. / (1. + (-z).exp())
}

/// Computes `sigmoid(X·θ)` for every row of `x`.
///
/// # Arguments
/// * `x` - The observations, one per row.
/// * `theta` - The weights, as long as a row of `x`.
pub fn hypothesis(x: ArrayView2<f64>, theta: ArrayView1<f64>) -> Array1<f64> {
    x.dot(&theta).mapv_into(sigmoid)
}

/// The mean cross-entropy of the hypothesis against a binary target.
///
/// # Arguments
/// * `h` - The hypothesis of every example.
/// * `y` - The expected output of every example.
pub fn cost(h: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let total: f64 = h
        .iter()
        .zip(y)
        .map(|(&h, &y)| -y * h.ln() - (1. - y) * (1. - h).ln())
        .sum();

    total / h.len() as f64
}
