use std::num::NonZeroUsize;

use log::trace;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};

use super::logistic::{cost, hypothesis};
use crate::{ClassTheta, MlErr, Result, dataset::TrainingSet};

/// The settings of the adaptive learning rate gradient descent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescentConfig {
    /// The first learning rate tried.
    pub initial_learning_rate: f64,
    /// Every rejected learning rate is divided by this amount.
    pub learning_rate_divisor: f64,
    /// The descent stops once the cost improves by less than this.
    pub tolerance: f64,
    /// The steps taken with a single learning rate are capped at this times the amount of examples.
    pub iterations_per_example: NonZeroUsize,
}

impl Default for DescentConfig {
    fn default() -> Self {
        Self {
            initial_learning_rate: 3.,
            learning_rate_divisor: 3.,
            tolerance: 1e-4,
            iterations_per_example: NonZeroUsize::new(500).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl DescentConfig {
    /// Checks that the descent can make progress with these settings.
    pub fn validate(&self) -> Result<()> {
        let lr = self.initial_learning_rate;

        if !lr.is_finite() || lr <= 0. {
            return Err(MlErr::InvalidConfig(
                "the initial learning rate must be positive and finite",
            ));
        }

        if !self.learning_rate_divisor.is_finite() || self.learning_rate_divisor <= 1. {
            return Err(MlErr::InvalidConfig(
                "the learning rate divisor must be finite and greater than one",
            ));
        }

        if !(self.tolerance >= 0.) || self.tolerance.is_infinite() {
            return Err(MlErr::InvalidConfig(
                "the tolerance must be finite and not negative",
            ));
        }

        Ok(())
    }
}

/// The outcome of a converged descent.
#[derive(Debug, Clone, PartialEq)]
pub struct Descent {
    pub theta: ClassTheta,
    /// Steps taken over every learning rate tried.
    pub iterations: usize,
    /// The last learning rate used.
    pub learning_rate: f64,
    /// The cost after the last step.
    pub cost: f64,
}

/// Full batch gradient descent of the logistic regression cost with an
/// adaptive learning rate.
///
/// Starting at the initial learning rate, a rate is abandoned for the next
/// smaller one as soon as a step doesn't lower the cost. The first rate that
/// lowers the cost is kept for the rest of the descent, even if a later step
/// stops improving. Steps following a zero or NaN cost aren't compared.
#[derive(Debug, Clone, Default)]
pub struct GradientDescent {
    config: DescentConfig,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `config` - The descent settings, validated here.
    pub fn new(config: DescentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DescentConfig {
        &self.config
    }

    /// Fits the theta of a single class of a training set, starting from zeroed weights.
    ///
    /// # Arguments
    /// * `set` - The training set.
    /// * `class` - The index of the class to separate from the rest.
    pub fn optimize_class(&self, set: &TrainingSet, class: usize) -> Result<Descent> {
        let target = set.target(class)?;
        let initial = Array1::<f64>::zeros(set.features());

        self.optimize(initial.view(), set.design(), target)
    }

    /// Minimizes the logistic regression cost of a binary target.
    ///
    /// # Arguments
    /// * `initial` - The weights to start from, one per feature.
    /// * `design` - The `rows x features` design matrix.
    /// * `target` - The expected output of every row, either 0 or 1.
    ///
    /// # Returns
    /// The fitted theta, or `MlErr::Diverged` if a learning rate takes too many steps.
    pub fn optimize(
        &self,
        initial: ArrayView1<f64>,
        design: ArrayView2<f64>,
        target: ArrayView1<f64>,
    ) -> Result<Descent> {
        let (rows, features) = design.dim();

        if rows == 0 {
            return Err(MlErr::EmptyDataset);
        }

        if initial.len() != features {
            return Err(MlErr::SizeMismatch {
                a: "initial weights",
                b: "design",
                got: initial.len(),
                expected: features,
            });
        }

        if target.len() != rows {
            return Err(MlErr::SizeMismatch {
                a: "target",
                b: "design",
                got: target.len(),
                expected: rows,
            });
        }

        let mut x = Array2::<f64>::ones((rows, features + 1));
        x.slice_mut(s![.., 1..]).assign(&design);

        let mut theta = Array1::<f64>::zeros(features + 1);
        theta.slice_mut(s![1..]).assign(&initial);

        let max_iterations = self.config.iterations_per_example.get().saturating_mul(rows);
        let scale = 1. / rows as f64;

        let mut learning_rate = self.config.initial_learning_rate;
        let mut used_learning_rate = learning_rate;
        let mut learning_rate_found = false;
        let mut iterations = 0;
        let mut current = f64::NAN;

        while !learning_rate_found && learning_rate != 0. {
            let mut last: Option<f64> = None;
            let mut i = 0;

            loop {
                let h = hypothesis(x.view(), theta.view());
                let gradient = x.t().dot(&(h - &target)) * scale;
                theta.scaled_add(-learning_rate, &gradient);

                let h = hypothesis(x.view(), theta.view());
                current = cost(h.view(), target);

                i += 1;
                iterations += 1;

                // A zero or NaN cost can't be compared against, the step counts as a first one.
                if let Some(last) = last.filter(|last| *last != 0. && !last.is_nan()) {
                    if current < last {
                        learning_rate_found = true;
                    } else {
                        trace!(learning_rate = learning_rate, cost = current; "abandoning learning rate");
                        break;
                    }

                    if last - current < self.config.tolerance {
                        break;
                    }
                }

                if i >= max_iterations {
                    return Err(MlErr::Diverged { iterations: i });
                }

                last = Some(current);
            }

            used_learning_rate = learning_rate;
            learning_rate /= self.config.learning_rate_divisor;
        }

        let theta = ClassTheta {
            intercept: theta[0],
            weights: theta.slice(s![1..]).to_owned(),
        };

        Ok(Descent {
            theta,
            iterations,
            learning_rate: used_learning_rate,
            cost: current,
        })
    }
}
