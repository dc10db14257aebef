use std::{collections::HashMap, hash::Hash};

use machine_learning::TrainingSet;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// The examples of a single class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledExamples<L> {
    pub label: L,
    pub examples: Vec<Vec<f64>>,
}

/// Labelled examples grouped by class.
///
/// Every new label gets the next class index, indices are never reassigned.
#[derive(Debug, Clone)]
pub struct ExampleStore<L> {
    classes: Vec<LabelledExamples<L>>,
    indexes: HashMap<L, usize>,
    features: Option<usize>,
}

impl<L> Default for ExampleStore<L> {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            indexes: HashMap::new(),
            features: None,
        }
    }
}

impl<L: Clone + Eq + Hash> ExampleStore<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store out of its classes, in class index order.
    ///
    /// # Arguments
    /// * `classes` - The examples of every class.
    ///
    /// # Returns
    /// The store, or an error if a label repeats or the examples have different lengths.
    pub fn from_classes(classes: Vec<LabelledExamples<L>>) -> Result<Self> {
        let mut store = Self::new();

        for LabelledExamples { label, examples } in classes {
            if store.indexes.contains_key(&label) {
                return Err(OrchestratorError::InvalidConfig(
                    "a label appears more than once".into(),
                ));
            }

            let index = store.push_label(label.clone());

            for features in examples {
                store.check_features(&features)?;
                store.classes[index].examples.push(features);
            }
        }

        Ok(store)
    }

    /// Adds a labelled example.
    ///
    /// # Arguments
    /// * `features` - The example's feature vector.
    /// * `label` - The example's class label.
    ///
    /// # Returns
    /// The class index of the label, or an error if the feature vector's length
    /// differs from the previous examples'.
    pub fn add(&mut self, features: Vec<f64>, label: L) -> Result<usize> {
        self.check_features(&features)?;

        let index = match self.indexes.get(&label) {
            Some(&index) => index,
            None => self.push_label(label),
        };

        self.classes[index].examples.push(features);
        Ok(index)
    }

    pub fn classes(&self) -> usize {
        self.classes.len()
    }

    /// The total amount of examples.
    pub fn len(&self) -> usize {
        self.classes.iter().map(|c| c.examples.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The length of every feature vector, once an example was added.
    pub fn features(&self) -> Option<usize> {
        self.features
    }

    pub fn label(&self, index: usize) -> Option<&L> {
        self.classes.get(index).map(|c| &c.label)
    }

    pub fn index_of(&self, label: &L) -> Option<usize> {
        self.indexes.get(label).copied()
    }

    pub fn labels(&self) -> impl Iterator<Item = &L> {
        self.classes.iter().map(|c| &c.label)
    }

    /// Builds the design and classification matrices, class after class and in
    /// insertion order within each class.
    pub fn training_set(&self) -> Result<TrainingSet> {
        let (rows, classes) = (self.len(), self.classes());
        let features = self.features.unwrap_or_default();

        if rows == 0 || classes == 0 {
            return Err(OrchestratorError::NoExamples);
        }

        let mut design = Vec::with_capacity(rows * features);
        let mut classification = vec![0.; rows * classes];
        let mut row = 0;

        for (class, LabelledExamples { examples, .. }) in self.classes.iter().enumerate() {
            for example in examples {
                design.extend_from_slice(example);
                classification[row * classes + class] = 1.;
                row += 1;
            }
        }

        Ok(TrainingSet::from_raw(
            rows,
            features,
            classes,
            design,
            classification,
        )?)
    }

    /// The examples of every class, in class index order.
    pub fn as_classes(&self) -> &[LabelledExamples<L>] {
        &self.classes
    }

    fn push_label(&mut self, label: L) -> usize {
        let index = self.classes.len();
        self.indexes.insert(label.clone(), index);
        self.classes.push(LabelledExamples {
            label,
            examples: Vec::new(),
        });

        index
    }

    fn check_features(&mut self, features: &[f64]) -> Result<()> {
        match self.features {
            Some(expected) if expected != features.len() => Err(OrchestratorError::FeatureMismatch {
                got: features.len(),
                expected,
            }),
            Some(_) => Ok(()),
            None => {
                self.features = Some(features.len());
                Ok(())
            }
        }
    }
}
