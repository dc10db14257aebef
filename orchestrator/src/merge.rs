use std::fmt;

use machine_learning::{ClassTheta, WeightMatrix};

/// Why a worker's result couldn't be placed.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementError {
    Width { got: usize, expected: usize },
    OutOfRange { end: usize, classes: usize },
    Overlap { class_index: usize },
    Missing { class_index: usize },
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Width { got, expected } => {
                write!(f, "thetas are {got} values wide, expected {expected}")
            }
            Self::OutOfRange { end, classes } => {
                write!(f, "thetas reach class {end}, there are only {classes} classes")
            }
            Self::Overlap { class_index } => {
                write!(f, "the theta of class {class_index} was already received")
            }
            Self::Missing { class_index } => {
                write!(f, "the theta of class {class_index} was never received")
            }
        }
    }
}

/// Preallocated arena with one slot per class, filled as worker results arrive.
///
/// A result lands at `start_index + position` regardless of when it arrives.
#[derive(Debug)]
pub struct ThetaSlots {
    features: usize,
    slots: Vec<Option<ClassTheta>>,
}

impl ThetaSlots {
    /// Creates an empty arena.
    ///
    /// # Arguments
    /// * `classes` - The amount of slots.
    /// * `features` - The amount of features each theta must have.
    pub fn new(classes: usize, features: usize) -> Self {
        Self {
            features,
            slots: vec![None; classes],
        }
    }

    /// Places the consecutive thetas of a worker's result.
    ///
    /// # Arguments
    /// * `start_index` - The class of the first theta.
    /// * `width` - The length of each theta, the intercept included.
    /// * `values` - The augmented thetas one after the other.
    ///
    /// # Returns
    /// The amount of thetas placed, or why they couldn't be placed. Nothing is
    /// written on failure.
    pub fn place(
        &mut self,
        start_index: usize,
        width: usize,
        values: &[f64],
    ) -> Result<usize, PlacementError> {
        let expected = self.features + 1;

        if width != expected {
            return Err(PlacementError::Width {
                got: width,
                expected,
            });
        }

        let count = values.len() / width;
        let end = start_index.saturating_add(count);

        if end > self.slots.len() {
            return Err(PlacementError::OutOfRange {
                end,
                classes: self.slots.len(),
            });
        }

        if let Some(offset) = self.slots[start_index..end]
            .iter()
            .position(Option::is_some)
        {
            return Err(PlacementError::Overlap {
                class_index: start_index + offset,
            });
        }

        let thetas = values.chunks_exact(width).filter_map(ClassTheta::from_augmented);

        for (slot, theta) in self.slots[start_index..end].iter_mut().zip(thetas) {
            *slot = Some(theta);
        }

        Ok(count)
    }

    /// Whether every class already has its theta.
    #[cfg(test)]
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Assembles the weight matrix out of the filled arena.
    pub fn into_matrix(self) -> Result<WeightMatrix, PlacementError> {
        let features = self.features;
        let mut thetas = Vec::with_capacity(self.slots.len());

        for (class_index, slot) in self.slots.into_iter().enumerate() {
            thetas.push(slot.ok_or(PlacementError::Missing { class_index })?);
        }

        WeightMatrix::from_thetas(features, thetas).map_err(|_| PlacementError::Width {
            got: 0,
            expected: features + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_land_by_start_index() {
        let mut slots = ThetaSlots::new(3, 1);

        assert_eq!(slots.place(2, 2, &[5., 6.]), Ok(1));
        assert!(!slots.is_full());
        assert_eq!(slots.place(0, 2, &[1., 2., 3., 4.]), Ok(2));
        assert!(slots.is_full());

        let matrix = slots.into_matrix().unwrap();
        assert_eq!(matrix.theta(0).unwrap().intercept, 1.);
        assert_eq!(matrix.theta(1).unwrap().weights[0], 4.);
        assert_eq!(matrix.theta(2).unwrap().intercept, 5.);
    }

    #[test]
    fn bad_placements_are_rejected_without_writing() {
        let mut slots = ThetaSlots::new(3, 1);

        assert_eq!(
            slots.place(0, 3, &[1., 2., 3.]),
            Err(PlacementError::Width {
                got: 3,
                expected: 2
            })
        );
        assert_eq!(
            slots.place(2, 2, &[1., 2., 3., 4.]),
            Err(PlacementError::OutOfRange {
                end: 4,
                classes: 3
            })
        );

        slots.place(1, 2, &[1., 2.]).unwrap();
        assert_eq!(
            slots.place(0, 2, &[1., 2., 3., 4.]),
            Err(PlacementError::Overlap { class_index: 1 })
        );

        assert_eq!(
            slots.into_matrix().unwrap_err(),
            PlacementError::Missing { class_index: 0 }
        );
    }
}
