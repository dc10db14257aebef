use std::{io, ops::Range, sync::Arc};

use comms::{
    msg::{Command, Msg, Payload},
    specs::TaskSpec,
};
use log::{debug, info, warn};
use machine_learning::{TrainingSet, WeightMatrix};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    configs::{TrainerConfig, to_task_spec},
    error::{OrchestratorError, Result},
    launcher::{Launcher, Spawned},
    merge::{PlacementError, ThetaSlots},
};

/// Splits `0..classes` into contiguous chunks of `ceil(classes / pool_size)` classes.
///
/// Only the last chunk may be shorter and no chunk is empty, so fewer than
/// `pool_size` chunks are returned when there aren't enough classes.
///
/// # Arguments
/// * `classes` - The amount of classes.
/// * `pool_size` - The maximum amount of chunks.
pub fn partition(classes: usize, pool_size: usize) -> Vec<Range<usize>> {
    let chunk_size = classes.div_ceil(pool_size.max(1));

    if chunk_size == 0 {
        return Vec::new();
    }

    (0..classes)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(classes))
        .collect()
}

/// A progress report of a single worker.
#[derive(Debug, Clone, Copy)]
struct Progress {
    worker_id: usize,
    completed: usize,
}

/// What a worker sent back once it finished.
#[derive(Debug)]
struct WorkerResult {
    worker_id: usize,
    start_index: usize,
    width: usize,
    values: Vec<f64>,
}

/// Fans the classes of a training set out to isolated workers and merges
/// their thetas back into a single weight matrix.
pub struct WorkerPool<P: Launcher> {
    launcher: Arc<P>,
    config: TrainerConfig,
}

impl<P: Launcher> WorkerPool<P> {
    /// Creates a new `WorkerPool`.
    ///
    /// # Arguments
    /// * `launcher` - Starts the workers.
    /// * `config` - The pool size and the settings handed to every worker.
    pub fn new(launcher: P, config: TrainerConfig) -> Self {
        Self {
            launcher: Arc::new(launcher),
            config,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Computes the theta of every class of the training set.
    ///
    /// # Arguments
    /// * `set` - The training set, sent in full to every worker.
    /// * `on_progress` - Called with the classes completed so far over the total.
    /// * `cancel` - Aborts every worker and rejects once cancelled.
    ///
    /// # Returns
    /// The complete weight matrix, or the first error surfaced by any worker.
    pub async fn compute_thetas<F>(
        &self,
        set: Arc<TrainingSet>,
        mut on_progress: F,
        cancel: CancellationToken,
    ) -> Result<WeightMatrix>
    where
        F: FnMut(usize, usize) + Send,
    {
        let classes = set.classes();

        if classes == 0 || set.rows() == 0 {
            return Err(OrchestratorError::NoExamples);
        }

        let chunks = partition(classes, self.config.pool_size.get());
        info!("training {classes} classes over {} worker(s)", chunks.len());

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();

        for (worker_id, indexes) in chunks.iter().cloned().enumerate() {
            let spawned = self
                .launcher
                .launch(worker_id)
                .map_err(|source| OrchestratorError::Launch { worker_id, source })?;

            let spec = to_task_spec(worker_id, indexes, &set, &self.config);
            workers.spawn(drive(spawned, spec, Arc::clone(&set), events_tx.clone()));
        }

        drop(events_tx);

        let mut slots = ThetaSlots::new(classes, set.features());
        let mut tracker = ProgressTracker::new(chunks.len());

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    warn!("training cancelled, aborting {} worker(s)", workers.len());
                    workers.abort_all();
                    return Err(OrchestratorError::Cancelled);
                }

                Some(progress) = events_rx.recv() => {
                    on_progress(tracker.update(progress), classes);
                }

                joined = workers.join_next() => {
                    let Some(joined) = joined else {
                        break;
                    };

                    let result = match joined {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => {
                            warn!("{e}, aborting the remaining worker(s)");
                            workers.abort_all();
                            return Err(e);
                        }
                        Err(e) => {
                            workers.abort_all();
                            return Err(OrchestratorError::Join(e));
                        }
                    };

                    merge(&mut slots, &chunks, result)?;
                }
            }
        }

        while let Ok(progress) = events_rx.try_recv() {
            on_progress(tracker.update(progress), classes);
        }

        slots.into_matrix().map_err(|e| {
            let worker_id = match e {
                PlacementError::Missing { class_index } => owner(&chunks, class_index),
                _ => 0,
            };

            OrchestratorError::Protocol {
                worker_id,
                msg: e.to_string(),
            }
        })
    }
}

/// Aggregates the per worker progress into the classes completed by the whole pool.
struct ProgressTracker {
    reported: Vec<usize>,
    completed: usize,
}

impl ProgressTracker {
    fn new(workers: usize) -> Self {
        Self {
            reported: vec![0; workers],
            completed: 0,
        }
    }

    fn update(&mut self, progress: Progress) -> usize {
        let Progress {
            worker_id,
            completed,
        } = progress;

        if let Some(last) = self.reported.get_mut(worker_id) {
            self.completed += completed.saturating_sub(*last);
            *last = (*last).max(completed);
        }

        self.completed
    }
}

/// Places a worker's thetas, checking they're exactly the ones it was handed.
fn merge(slots: &mut ThetaSlots, chunks: &[Range<usize>], result: WorkerResult) -> Result<()> {
    let WorkerResult {
        worker_id,
        start_index,
        width,
        values,
    } = result;

    let protocol = |msg: String| OrchestratorError::Protocol { worker_id, msg };
    let chunk = &chunks[worker_id];

    if start_index != chunk.start || values.len() != chunk.len() * width {
        return Err(protocol(format!(
            "expected the thetas of classes {chunk:?}, got {} values of width {width} starting at {start_index}",
            values.len()
        )));
    }

    let placed = slots
        .place(start_index, width, &values)
        .map_err(|e| protocol(e.to_string()))?;

    debug!(worker_id = worker_id, start_index = start_index; "merged {placed} thetas");
    Ok(())
}

fn owner(chunks: &[Range<usize>], class_index: usize) -> usize {
    chunks
        .iter()
        .position(|chunk| chunk.contains(&class_index))
        .unwrap_or_default()
}

/// Room for control messages and error details.
const REPORT_SLACK: usize = 64 * 1024;

/// The longest frame a worker may send back, its thetas frame plus some slack.
fn max_report_len(spec: &TaskSpec) -> usize {
    let words = spec.indexes.len().saturating_mul(spec.features + 1) + 3;
    words
        .saturating_mul(size_of::<f64>())
        .saturating_add(REPORT_SLACK)
}

/// Runs the conversation with a single worker: hands it the task, forwards its
/// progress and waits for its thetas and its termination.
async fn drive<R, W>(
    spawned: Spawned<R, W>,
    spec: TaskSpec,
    set: Arc<TrainingSet>,
    events: mpsc::UnboundedSender<Progress>,
) -> Result<WorkerResult>
where
    R: tokio::io::AsyncRead + Unpin + Send,
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    let Spawned { rx, tx, exit } = spawned;
    let (mut rx, mut tx) = comms::channel(rx, tx);
    let worker_id = spec.worker_id;
    rx.set_max_frame_len(max_report_len(&spec));
    let failed = |e: io::Error| OrchestratorError::WorkerFailed {
        worker_id,
        msg: e.to_string(),
    };

    debug!(worker_id = worker_id; "sending classes {:?}", spec.indexes);
    tx.send(&Msg::Control(Command::Train(spec)))
        .await
        .map_err(failed)?;

    let design = set.design_values();
    tx.send(&Msg::Data(Payload::Design(&design)))
        .await
        .map_err(failed)?;

    let classification = set.classification_values();
    tx.send(&Msg::Data(Payload::Classification(&classification)))
        .await
        .map_err(failed)?;

    let mut rx_buf: Vec<f64> = Vec::new();

    let result = loop {
        let msg = match rx.recv_into(&mut rx_buf).await {
            Ok(msg) => msg,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(OrchestratorError::WorkerFailed {
                    worker_id,
                    msg: "the channel closed before the result".into(),
                });
            }
            Err(e) => {
                return Err(OrchestratorError::Protocol {
                    worker_id,
                    msg: e.to_string(),
                });
            }
        };

        match msg {
            Msg::Control(Command::Progress { completed, .. }) => {
                let _ = events.send(Progress {
                    worker_id,
                    completed,
                });
            }
            Msg::Data(Payload::Thetas {
                start_index,
                width,
                values,
            }) => {
                break WorkerResult {
                    worker_id,
                    start_index,
                    width,
                    values: values.to_vec(),
                };
            }
            Msg::Control(Command::Diverged {
                class_index,
                iterations,
            }) => {
                return Err(OrchestratorError::Diverged {
                    class_index,
                    iterations,
                });
            }
            Msg::Err(detail) => {
                return Err(OrchestratorError::WorkerFailed {
                    worker_id,
                    msg: detail.into_owned(),
                });
            }
            other => {
                return Err(OrchestratorError::Protocol {
                    worker_id,
                    msg: format!("unexpected {} message", other.kind()),
                });
            }
        }
    };

    drop(tx);
    exit.await
        .map_err(|msg| OrchestratorError::WorkerFailed { worker_id, msg })?;

    debug!(worker_id = worker_id; "worker terminated");
    Ok(result)
}
