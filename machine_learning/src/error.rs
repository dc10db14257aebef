use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    Diverged {
        iterations: usize,
    },
    EmptyDataset,
    InvalidConfig(&'static str),
    UnknownClass {
        class: usize,
        classes: usize,
    },
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => {
                format!(
                    "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
                )
            }
            MlErr::Diverged { iterations } => {
                format!("Unable to find minimum, gave up after {iterations} iterations")
            }
            MlErr::EmptyDataset => "The dataset has no examples".to_string(),
            MlErr::InvalidConfig(reason) => format!("Invalid descent configuration: {reason}"),
            MlErr::UnknownClass { class, classes } => {
                format!("Class index {class} is out of range, there are {classes} classes")
            }
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {}
