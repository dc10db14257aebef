use std::{borrow::Cow, hash::Hash, num::NonZeroUsize, sync::Arc};

use log::{debug, info};
use machine_learning::{WeightMatrix, optimization::DescentConfig};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

use crate::{
    classifier::{Classification, Classifier},
    configs::TrainerConfig,
    error::{OrchestratorError, Result},
    launcher::{InProcessLauncher, Launcher},
    pool::WorkerPool,
    store::{ExampleStore, LabelledExamples},
};

type ProgressFn = Box<dyn FnMut(usize, usize) + Send>;

/// Everything needed to rebuild a trainer.
#[derive(Serialize, Deserialize)]
struct Snapshot<'a, L: Clone> {
    classes: Cow<'a, [LabelledExamples<L>]>,
    weights: Option<Cow<'a, WeightMatrix>>,
}

/// One-vs-all logistic regression classifier, trained over a pool of isolated workers.
///
/// Each label is a class, fitted on its own against every other label.
pub struct OneVsAllTrainer<L, P: Launcher = InProcessLauncher> {
    store: ExampleStore<L>,
    pool: WorkerPool<P>,
    on_progress: Option<ProgressFn>,
    theta: Option<WeightMatrix>,
}

impl<L> OneVsAllTrainer<L>
where
    L: Clone + Eq + Hash + Send + Sync,
{
    /// Creates a trainer running its workers as tasks of the current runtime.
    ///
    /// # Arguments
    /// * `pool_size` - The maximum amount of workers.
    /// * `on_progress` - Called with the classes completed so far over the total.
    pub fn new<F>(pool_size: NonZeroUsize, on_progress: F) -> Self
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        let config = TrainerConfig {
            pool_size,
            ..Default::default()
        };

        Self::with_parts(
            ExampleStore::new(),
            WorkerPool::new(InProcessLauncher::default(), config),
            Some(Box::new(on_progress)),
            None,
        )
    }
}

impl<L, P> OneVsAllTrainer<L, P>
where
    L: Clone + Eq + Hash + Send + Sync,
    P: Launcher,
{
    fn with_parts(
        store: ExampleStore<L>,
        pool: WorkerPool<P>,
        on_progress: Option<ProgressFn>,
        theta: Option<WeightMatrix>,
    ) -> Self {
        Self {
            store,
            pool,
            on_progress,
            theta,
        }
    }

    /// Adds a labelled example, new labels get the next class index.
    ///
    /// # Returns
    /// The class index of the label, or `FeatureMismatch` if the example's
    /// length differs from the first example's.
    pub fn add_example(&mut self, features: Vec<f64>, label: L) -> Result<usize> {
        self.store.add(features, label)
    }

    /// Fits one theta per class over the worker pool.
    ///
    /// The previous weights are discarded first, so they're absent if the training fails.
    pub async fn train(&mut self) -> Result<()> {
        self.train_with_cancel(CancellationToken::new()).await
    }

    /// Same as `train`, rejecting with `Cancelled` once the token is cancelled.
    pub async fn train_with_cancel(&mut self, cancel: CancellationToken) -> Result<()> {
        self.theta = None;

        let set = Arc::new(self.store.training_set()?);
        info!(
            classes = set.classes(), examples = set.rows(), features = set.features();
            "training one-vs-all classifier"
        );

        let on_progress = &mut self.on_progress;
        let theta = self
            .pool
            .compute_thetas(
                set,
                |completed, total| {
                    debug!("{completed}/{total} classes trained");

                    if let Some(on_progress) = on_progress.as_mut() {
                        on_progress(completed, total);
                    }
                },
                cancel,
            )
            .await?;

        info!("training finished");
        self.theta = Some(theta);
        Ok(())
    }

    /// Ranks the labels known at training time for an observation.
    ///
    /// # Returns
    /// Every label with its score, by descending score. Ties keep the class order.
    pub fn classify(&self, observation: &[f64]) -> Result<Vec<Classification<L>>> {
        let theta = self.theta.as_ref().ok_or(OrchestratorError::NotTrained)?;

        if observation.len() != theta.features() {
            return Err(OrchestratorError::FeatureMismatch {
                got: observation.len(),
                expected: theta.features(),
            });
        }

        let scores = theta.scores(ArrayView1::from(observation))?;

        let mut ranked: Vec<_> = scores
            .iter()
            .zip(self.store.labels())
            .map(|(&score, label)| Classification {
                label: label.clone(),
                score,
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(ranked)
    }

    /// The weights of the last successful training.
    pub fn weights(&self) -> Option<&WeightMatrix> {
        self.theta.as_ref()
    }

    pub fn examples(&self) -> &ExampleStore<L> {
        &self.store
    }

    pub fn config(&self) -> &TrainerConfig {
        self.pool.config()
    }

    /// Serializes the examples, their class indices and the weights to JSON.
    pub fn save(&self) -> Result<String>
    where
        L: Serialize,
    {
        let snapshot = Snapshot {
            classes: Cow::Borrowed(self.store.as_classes()),
            weights: self.theta.as_ref().map(Cow::Borrowed),
        };

        Ok(serde_json::to_string(&snapshot)?)
    }
}

impl<L, P> Classifier<L> for OneVsAllTrainer<L, P>
where
    L: Clone + Eq + Hash + Send + Sync,
    P: Launcher,
{
    fn add_example(&mut self, features: Vec<f64>, label: L) -> Result<usize> {
        OneVsAllTrainer::add_example(self, features, label)
    }

    fn train(&mut self) -> impl Future<Output = Result<()>> + Send {
        OneVsAllTrainer::train(self)
    }

    fn classify(&self, observation: &[f64]) -> Result<Vec<Classification<L>>> {
        OneVsAllTrainer::classify(self, observation)
    }
}

/// Configures and builds a `OneVsAllTrainer`.
pub struct TrainerBuilder<P: Launcher = InProcessLauncher> {
    config: TrainerConfig,
    launcher: P,
    on_progress: Option<ProgressFn>,
}

impl TrainerBuilder {
    /// Creates a builder with the default settings and in-process workers.
    pub fn new() -> Self {
        Self {
            config: TrainerConfig::default(),
            launcher: InProcessLauncher::default(),
            on_progress: None,
        }
    }
}

impl Default for TrainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Launcher> TrainerBuilder<P> {
    pub fn pool_size(mut self, pool_size: NonZeroUsize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    pub fn descent(mut self, descent: DescentConfig) -> Self {
        self.config.descent = descent;
        self
    }

    /// Whether workers report progress after each class, on by default.
    pub fn report_progress(mut self, report_progress: bool) -> Self {
        self.config.report_progress = report_progress;
        self
    }

    pub fn on_progress<F>(mut self, on_progress: F) -> Self
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Replaces the way workers are started.
    pub fn launcher<Q: Launcher>(self, launcher: Q) -> TrainerBuilder<Q> {
        TrainerBuilder {
            config: self.config,
            launcher,
            on_progress: self.on_progress,
        }
    }

    /// Builds an untrained trainer.
    ///
    /// # Errors
    /// `InvalidConfig` if the descent settings can't make progress.
    pub fn build<L>(self) -> Result<OneVsAllTrainer<L, P>>
    where
        L: Clone + Eq + Hash + Send + Sync,
    {
        self.build_with(ExampleStore::new(), None)
    }

    /// Rebuilds a trainer out of the output of `OneVsAllTrainer::save`.
    ///
    /// # Arguments
    /// * `json` - The saved snapshot.
    pub fn restore<L>(self, json: &str) -> Result<OneVsAllTrainer<L, P>>
    where
        L: Clone + Eq + Hash + Send + Sync + DeserializeOwned,
    {
        let Snapshot { classes, weights } = serde_json::from_str::<Snapshot<L>>(json)?;
        let store = ExampleStore::from_classes(classes.into_owned())?;
        let weights = weights.map(Cow::into_owned);

        if let Some(weights) = &weights {
            let features = store.features().unwrap_or_default();

            if weights.classes() != store.classes() || weights.features() != features {
                return Err(OrchestratorError::InvalidConfig(format!(
                    "snapshot weights are {}x{}, its examples have {} classes of {features} features",
                    weights.classes(),
                    weights.features(),
                    store.classes(),
                )));
            }
        }

        debug!(classes = store.classes(), trained = weights.is_some(); "restored trainer");
        self.build_with(store, weights)
    }

    fn build_with<L>(
        self,
        store: ExampleStore<L>,
        theta: Option<WeightMatrix>,
    ) -> Result<OneVsAllTrainer<L, P>>
    where
        L: Clone + Eq + Hash + Send + Sync,
    {
        self.config.validate()?;

        let pool = WorkerPool::new(self.launcher, self.config);
        Ok(OneVsAllTrainer::with_parts(
            store,
            pool,
            self.on_progress,
            theta,
        ))
    }
}
