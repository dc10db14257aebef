mod gradient_descent;
mod logistic;

pub use gradient_descent::{Descent, DescentConfig, GradientDescent};
pub use logistic::{cost, hypothesis, sigmoid};
