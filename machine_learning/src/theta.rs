use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result, optimization::sigmoid};

/// The fitted parameters of a single one-vs-all class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTheta {
    pub intercept: f64,
    pub weights: Array1<f64>,
}

impl ClassTheta {
    /// Splits an augmented theta, the intercept first and then the weights.
    ///
    /// # Arguments
    /// * `augmented` - The intercept followed by one weight per feature.
    ///
    /// # Returns
    /// The class theta or `None` if `augmented` is empty.
    pub fn from_augmented(augmented: &[f64]) -> Option<Self> {
        let (&intercept, weights) = augmented.split_first()?;

        Some(Self {
            intercept,
            weights: Array1::from(weights.to_vec()),
        })
    }

    /// The amount of features these weights apply to.
    pub fn features(&self) -> usize {
        self.weights.len()
    }

    /// Appends the intercept and then the weights to `buf`.
    pub fn write_augmented(&self, buf: &mut Vec<f64>) {
        buf.push(self.intercept);
        buf.extend(self.weights.iter());
    }
}

/// The weights of every class of a one-vs-all model.
///
/// Row `i` of `weights` and entry `i` of `intercepts` belong to class `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeightMatrix")]
pub struct WeightMatrix {
    intercepts: Array1<f64>,
    weights: Array2<f64>,
}

#[derive(Deserialize)]
struct RawWeightMatrix {
    intercepts: Array1<f64>,
    weights: Array2<f64>,
}

impl TryFrom<RawWeightMatrix> for WeightMatrix {
    type Error = MlErr;

    fn try_from(raw: RawWeightMatrix) -> Result<Self> {
        let RawWeightMatrix {
            intercepts,
            weights,
        } = raw;

        if weights.nrows() != intercepts.len() {
            return Err(MlErr::SizeMismatch {
                a: "weights",
                b: "intercepts",
                got: weights.nrows(),
                expected: intercepts.len(),
            });
        }

        Ok(Self {
            intercepts,
            weights,
        })
    }
}

impl WeightMatrix {
    /// Stacks the class thetas in order into a weight matrix.
    ///
    /// # Arguments
    /// * `features` - The amount of features every theta must have.
    /// * `thetas` - One theta per class, in class index order.
    ///
    /// # Returns
    /// The weight matrix or a size mismatch if a theta has the wrong amount of features.
    pub fn from_thetas<I>(features: usize, thetas: I) -> Result<Self>
    where
        I: IntoIterator<Item = ClassTheta>,
    {
        let thetas = thetas.into_iter();
        let mut intercepts = Vec::with_capacity(thetas.size_hint().0);
        let mut weights = Vec::with_capacity(thetas.size_hint().0 * features);

        for theta in thetas {
            if theta.features() != features {
                return Err(MlErr::SizeMismatch {
                    a: "class theta",
                    b: "features",
                    got: theta.features(),
                    expected: features,
                });
            }

            intercepts.push(theta.intercept);
            weights.extend(theta.weights.iter());
        }

        let classes = intercepts.len();
        let got = weights.len();
        let weights = Array2::from_shape_vec((classes, features), weights).map_err(|_| {
            MlErr::SizeMismatch {
                a: "weights",
                b: "classes x features",
                got,
                expected: classes * features,
            }
        })?;

        Ok(Self {
            intercepts: Array1::from(intercepts),
            weights,
        })
    }

    pub fn classes(&self) -> usize {
        self.intercepts.len()
    }

    pub fn features(&self) -> usize {
        self.weights.ncols()
    }

    /// Returns a copy of the theta of a class.
    pub fn theta(&self, class: usize) -> Option<ClassTheta> {
        let intercept = *self.intercepts.get(class)?;
        let weights = self.weights.row(class).to_owned();

        Some(ClassTheta { intercept, weights })
    }

    /// Scores an observation against a single class.
    ///
    /// # Arguments
    /// * `class` - The class index.
    /// * `observation` - The feature vector.
    ///
    /// # Returns
    /// `sigmoid(intercept + weights · observation)`.
    pub fn score(&self, class: usize, observation: ArrayView1<f64>) -> Result<f64> {
        self.check_observation(observation)?;

        let Some(&intercept) = self.intercepts.get(class) else {
            return Err(MlErr::UnknownClass {
                class,
                classes: self.classes(),
            });
        };

        let z = intercept + self.weights.row(class).dot(&observation);
        Ok(sigmoid(z))
    }

    /// Scores an observation against every class, in class index order.
    pub fn scores(&self, observation: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_observation(observation)?;

        let z = self.weights.dot(&observation) + &self.intercepts;
        Ok(z.mapv_into(sigmoid))
    }

    fn check_observation(&self, observation: ArrayView1<f64>) -> Result<()> {
        if observation.len() != self.features() {
            return Err(MlErr::SizeMismatch {
                a: "observation",
                b: "weights",
                got: observation.len(),
                expected: self.features(),
            });
        }

        Ok(())
    }
}
