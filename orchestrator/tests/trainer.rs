mod common;

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};

use machine_learning::optimization::DescentConfig;
use orchestrator::{Classifier, OneVsAllTrainer, OrchestratorError, TrainerBuilder};

use common::{CLUSTERS, two_clusters};

fn pool_size(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn clusters_trainer(n: usize) -> OneVsAllTrainer<&'static str> {
    let mut trainer = TrainerBuilder::new().pool_size(pool_size(n)).build().unwrap();

    for (features, label) in CLUSTERS {
        trainer.add_example(features.to_vec(), label).unwrap();
    }

    trainer
}

#[tokio::test]
async fn classify_ranks_every_class() {
    for n in 1..=4 {
        let mut trainer = clusters_trainer(n);
        trainer.train().await.unwrap();

        let queries = [([0., 0.], "origin"), ([4., 0.], "east"), ([0., 4.], "north")];

        for (query, expected) in queries {
            let ranked = trainer.classify(&query).unwrap();

            assert_eq!(ranked.len(), 3);
            assert_eq!(ranked[0].label, expected);
            assert!(ranked[0].score > 0.9);
            assert!(ranked.iter().all(|c| c.score > 0. && c.score < 1.));
            assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }
}

#[tokio::test]
async fn two_clusters_converge() {
    let mut trainer = OneVsAllTrainer::new(pool_size(2), |_, _| {});

    for (features, label) in two_clusters() {
        trainer.add_example(features, label).unwrap();
    }

    trainer.train().await.unwrap();

    let near_a = trainer.classify(&[0.1]).unwrap();
    assert_eq!(near_a[0].label, "A");
    assert!(near_a[0].score > 0.9);

    let near_b = trainer.classify(&[10.1]).unwrap();
    assert_eq!(near_b[0].label, "B");
    assert!(near_b[0].score > 0.9 && near_b[0].score < 1.);

    for ranked in [&near_a, &near_b] {
        assert!(ranked.iter().all(|c| c.score > 0. && c.score < 1.));
    }
}

#[tokio::test]
async fn classification_is_idempotent() {
    let mut trainer = clusters_trainer(3);
    trainer.train().await.unwrap();

    let query = [1.5, 2.5];
    let first = trainer.classify(&query).unwrap();
    let second = trainer.classify(&query).unwrap();

    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.label, b.label);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
    }
}

#[tokio::test]
async fn tiny_iteration_cap_diverges() {
    let descent = DescentConfig {
        iterations_per_example: NonZeroUsize::MIN,
        ..Default::default()
    };

    let mut trainer = TrainerBuilder::new()
        .pool_size(pool_size(2))
        .descent(descent)
        .build()
        .unwrap();

    for (features, label) in CLUSTERS {
        trainer.add_example(features.to_vec(), label).unwrap();
    }

    let err = trainer.train().await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Diverged { iterations: 15, .. }
    ));
    assert!(trainer.weights().is_none());
}

#[tokio::test]
async fn progress_is_aggregated_over_the_pool() {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);

    let mut trainer = TrainerBuilder::new()
        .pool_size(pool_size(2))
        .on_progress(move |completed, total| sink.lock().unwrap().push((completed, total)))
        .build()
        .unwrap();

    for (features, label) in CLUSTERS {
        trainer.add_example(features.to_vec(), label).unwrap();
    }

    trainer.train().await.unwrap();

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports.last(), Some(&(3, 3)));
    assert!(reports.windows(2).all(|w| w[0].0 < w[1].0));
}

#[tokio::test]
async fn progress_can_be_disabled() {
    let reports = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&reports);

    let mut trainer = TrainerBuilder::new()
        .report_progress(false)
        .on_progress(move |_, _| *sink.lock().unwrap() += 1)
        .build()
        .unwrap();

    for (features, label) in CLUSTERS {
        trainer.add_example(features.to_vec(), label).unwrap();
    }

    trainer.train().await.unwrap();
    assert_eq!(*reports.lock().unwrap(), 0);
    assert!(trainer.weights().is_some());
}

#[tokio::test]
async fn training_without_examples_fails() {
    let mut trainer = TrainerBuilder::new().build::<String>().unwrap();

    let err = trainer.train().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NoExamples));
}

#[tokio::test]
async fn observations_must_match_the_features() {
    let mut trainer = clusters_trainer(1);

    let err = trainer.add_example(vec![1.], "east").unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::FeatureMismatch {
            got: 1,
            expected: 2
        }
    ));

    trainer.train().await.unwrap();

    let err = trainer.classify(&[1., 2., 3.]).unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::FeatureMismatch {
            got: 3,
            expected: 2
        }
    ));
}

#[tokio::test]
async fn restored_trainer_classifies_identically() {
    let mut trainer = clusters_trainer(2);
    trainer.train().await.unwrap();

    let json = trainer.save().unwrap();
    let restored = TrainerBuilder::new().restore::<String>(&json).unwrap();

    assert_eq!(restored.examples().index_of(&"north".to_string()), Some(2));

    for query in [[0., 0.], [1.5, 2.5], [-3., 7.]] {
        let expected = trainer.classify(&query).unwrap();
        let got = restored.classify(&query).unwrap();

        assert_eq!(expected.len(), got.len());

        for (a, b) in expected.iter().zip(&got) {
            assert_eq!(a.label, b.label);
            assert_eq!(a.score.to_bits(), b.score.to_bits());
        }
    }
}

async fn train_through_the_trait<C: Classifier<&'static str>>(classifier: &mut C) {
    for (features, label) in two_clusters() {
        classifier.add_example(features, label).unwrap();
    }

    classifier.train().await.unwrap();
}

#[tokio::test]
async fn trainer_is_a_classifier() {
    let mut trainer = TrainerBuilder::new().build().unwrap();
    train_through_the_trait(&mut trainer).await;

    let ranked = Classifier::classify(&trainer, &[0.]).unwrap();
    assert_eq!(ranked.iter().map(|c| c.label).collect::<Vec<_>>(), ["A", "B"]);
}
