#![cfg(test)]

use ndarray::{Array2, array};

use crate::{
    TrainingSet, WeightMatrix,
    optimization::{DescentConfig, GradientDescent},
};

fn clusters() -> TrainingSet {
    let points = [
        [-0.176, -0.349],
        [0.151, -0.428],
        [0.036, -0.134],
        [-0.442, 0.007],
        [-0.463, -0.066],
        [3.57, -0.409],
        [3.925, 0.327],
        [3.624, -0.277],
        [4.127, 0.448],
        [4.077, -0.103],
        [0.476, 3.547],
        [0.358, 3.79],
        [-0.356, 3.618],
        [-0.192, 4.316],
        [-0.319, 4.082],
    ];

    let design = Array2::from_shape_fn((15, 2), |(row, col)| points[row][col]);
    let classification = Array2::from_shape_fn((15, 3), |(row, class)| {
        if row / 5 == class { 1. } else { 0. }
    });

    TrainingSet::new(design, classification).unwrap()
}

#[test]
fn test_ml_one_vs_all_three_clusters() {
    let set = clusters();
    let gd = GradientDescent::new(DescentConfig::default()).unwrap();

    let thetas = (0..set.classes()).map(|class| {
        let descent = gd.optimize_class(&set, class).unwrap();
        assert!(descent.iterations < 500 * set.rows());
        assert!(descent.cost.is_finite());
        descent.theta
    });

    let matrix = WeightMatrix::from_thetas(set.features(), thetas.collect::<Vec<_>>()).unwrap();
    assert_eq!((matrix.classes(), matrix.features()), (3, 2));

    let queries = [array![0., 0.], array![4., 0.], array![0., 4.]];

    for (expected, query) in queries.iter().enumerate() {
        let scores = matrix.scores(query.view()).unwrap();
        let best = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(class, _)| class)
            .unwrap();

        assert_eq!(best, expected, "query {query} scored {scores}");
        assert!(scores.iter().all(|&s| s > 0. && s < 1.));
        assert!(scores[expected] > 0.9);
    }
}

#[test]
fn test_ml_optimizing_a_class_is_deterministic() {
    let set = clusters();
    let gd = GradientDescent::default();

    let a = gd.optimize_class(&set, 1).unwrap();
    let b = gd.optimize_class(&set, 1).unwrap();

    assert_eq!(a, b);
}
