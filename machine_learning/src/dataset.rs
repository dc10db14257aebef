use std::borrow::Cow;

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::{MlErr, Result};

/// The examples a one-vs-all model is fitted on.
///
/// Row `d` of the design matrix and row `d` of the classification matrix
/// describe the same example.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    design: Array2<f64>,
    classification: Array2<f64>,
}

impl TrainingSet {
    /// Creates a new `TrainingSet`.
    ///
    /// # Arguments
    /// * `design` - The `rows x features` design matrix.
    /// * `classification` - The `rows x classes` one-hot classification matrix.
    ///
    /// # Returns
    /// The training set or an error if both matrices have a different amount of rows.
    pub fn new(design: Array2<f64>, classification: Array2<f64>) -> Result<Self> {
        if design.nrows() != classification.nrows() {
            return Err(MlErr::SizeMismatch {
                a: "design",
                b: "classification",
                got: classification.nrows(),
                expected: design.nrows(),
            });
        }

        Ok(Self {
            design,
            classification,
        })
    }

    /// Rebuilds a `TrainingSet` out of its row major raw values.
    ///
    /// # Arguments
    /// * `rows` - The amount of examples.
    /// * `features` - The amount of columns of the design matrix.
    /// * `classes` - The amount of columns of the classification matrix.
    /// * `design` - The design matrix values.
    /// * `classification` - The classification matrix values.
    ///
    /// # Returns
    /// The training set or a size mismatch if the values don't fit the shapes.
    pub fn from_raw(
        rows: usize,
        features: usize,
        classes: usize,
        design: Vec<f64>,
        classification: Vec<f64>,
    ) -> Result<Self> {
        let design_len = design.len();
        let design = Array2::from_shape_vec((rows, features), design).map_err(|_| {
            MlErr::SizeMismatch {
                a: "design values",
                b: "design shape",
                got: design_len,
                expected: rows * features,
            }
        })?;

        let classification_len = classification.len();
        let classification =
            Array2::from_shape_vec((rows, classes), classification).map_err(|_| {
                MlErr::SizeMismatch {
                    a: "classification values",
                    b: "classification shape",
                    got: classification_len,
                    expected: rows * classes,
                }
            })?;

        Self::new(design, classification)
    }

    pub fn rows(&self) -> usize {
        self.design.nrows()
    }

    pub fn features(&self) -> usize {
        self.design.ncols()
    }

    pub fn classes(&self) -> usize {
        self.classification.ncols()
    }

    pub fn design(&self) -> ArrayView2<'_, f64> {
        self.design.view()
    }

    pub fn classification(&self) -> ArrayView2<'_, f64> {
        self.classification.view()
    }

    /// The one-vs-all target of a class, its column of the classification matrix.
    ///
    /// # Arguments
    /// * `class` - The class index.
    pub fn target(&self, class: usize) -> Result<ArrayView1<'_, f64>> {
        if class >= self.classes() {
            return Err(MlErr::UnknownClass {
                class,
                classes: self.classes(),
            });
        }

        Ok(self.classification.column(class))
    }

    /// The design matrix as a row major slice, borrowed when the storage allows it.
    pub fn design_values(&self) -> Cow<'_, [f64]> {
        row_major(&self.design)
    }

    /// The classification matrix as a row major slice, borrowed when the storage allows it.
    pub fn classification_values(&self) -> Cow<'_, [f64]> {
        row_major(&self.classification)
    }
}

fn row_major(matrix: &Array2<f64>) -> Cow<'_, [f64]> {
    match matrix.as_slice() {
        Some(values) => Cow::Borrowed(values),
        None => Cow::Owned(matrix.iter().copied().collect()),
    }
}
