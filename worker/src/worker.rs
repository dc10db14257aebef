use std::{borrow::Cow, ops::Range, sync::Arc};

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use log::{debug, info, warn};
use machine_learning::{MlErr, TrainingSet, optimization::GradientDescent};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task,
};

use super::Result;
use crate::{builder::WorkerBuilder, error::WorkerErr};

/// Fits the thetas of a contiguous range of classes.
pub struct Worker {
    worker_id: usize,
    indexes: Range<usize>,
    set: Arc<TrainingSet>,
    descent: GradientDescent,
    report_progress: bool,
}

impl Worker {
    /// Creates a new `Worker`.
    ///
    /// # Args
    /// * `worker_id` - Identifier used for observability.
    /// * `indexes` - The classes this worker owns.
    /// * `set` - The complete training set.
    /// * `descent` - The optimizer run once per owned class.
    /// * `report_progress` - Whether to send a progress message after each class.
    ///
    /// # Returns
    /// A new worker instance.
    pub fn new(
        worker_id: usize,
        indexes: Range<usize>,
        set: TrainingSet,
        descent: GradientDescent,
        report_progress: bool,
    ) -> Self {
        Self {
            worker_id,
            indexes,
            set: Arc::new(set),
            descent,
            report_progress,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn indexes(&self) -> Range<usize> {
        self.indexes.clone()
    }

    /// Optimizes every owned class in order and sends their thetas as a single message.
    ///
    /// # Args
    /// * `tx` - Sending end of the orchestrator channel.
    ///
    /// # Errors
    /// Returns `WorkerErr::Diverged` if a class can't be fitted, or any other
    /// `WorkerErr` on I/O failures.
    pub async fn run<W>(self, tx: &mut OnoSender<W>) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let Self {
            worker_id,
            indexes,
            set,
            descent,
            report_progress,
        } = self;

        let total = indexes.len();
        let width = set.features() + 1;
        let mut values = Vec::with_capacity(total * width);

        for (done, class_index) in indexes.clone().enumerate() {
            let set = Arc::clone(&set);
            let gd = descent.clone();

            let fitted = match task::spawn_blocking(move || gd.optimize_class(&set, class_index))
                .await?
            {
                Ok(fitted) => fitted,
                Err(MlErr::Diverged { iterations }) => {
                    return Err(WorkerErr::Diverged {
                        class_index,
                        iterations,
                    });
                }
                Err(e) => return Err(e.into()),
            };

            debug!(
                worker_id = worker_id,
                class_index = class_index,
                iterations = fitted.iterations,
                learning_rate = fitted.learning_rate;
                "class converged"
            );

            fitted.theta.write_augmented(&mut values);

            if report_progress {
                let completed = done + 1;
                let msg = Msg::Control(Command::Progress { completed, total });
                tx.send(&msg).await?;
            }
        }

        let msg = Msg::Data(Payload::Thetas {
            start_index: indexes.start,
            width,
            values: &values,
        });

        tx.send(&msg).await?;
        info!(worker_id = worker_id; "sent thetas for {total} classes");
        Ok(())
    }
}

/// Serves a single training task through the given channel.
///
/// Waits for the task specification, the design matrix and the classification
/// matrix, in that order, trains the owned classes and answers with their thetas.
/// Any failure is reported back through `tx` before being returned.
///
/// # Args
/// * `rx` - Receiving end of the orchestrator channel.
/// * `tx` - Sending end of the orchestrator channel.
///
/// # Errors
/// Returns `WorkerErr` on I/O failures, protocol violations or a diverging class.
pub async fn serve<R, W>(mut rx: OnoReceiver<R>, mut tx: OnoSender<W>) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let result = match receive_task(&mut rx).await {
        Ok(worker) => {
            info!(worker_id = worker.worker_id(); "training classes {:?}", worker.indexes());
            worker.run(&mut tx).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        warn!("worker failed: {e}");
        report_failure(&mut tx, e).await;
    }

    result
}

/// Serves a single training task over the process' standard input and output.
pub async fn serve_stdio() -> Result<()> {
    let (rx, tx) = comms::channel(tokio::io::stdin(), tokio::io::stdout());
    serve(rx, tx).await
}

async fn receive_task<R>(rx: &mut OnoReceiver<R>) -> Result<Worker>
where
    R: AsyncRead + Unpin + Send,
{
    let mut rx_buf: Vec<f64> = Vec::new();

    let spec = match rx.recv_into(&mut rx_buf).await? {
        Msg::Control(Command::Train(spec)) => spec,
        other => return Err(unexpected("control/train", &other)),
    };

    debug!(worker_id = spec.worker_id; "received task spec");
    rx.set_max_frame_len(max_data_len(spec.rows, spec.features.max(spec.classes)));

    let design = match rx.recv_into(&mut rx_buf).await? {
        Msg::Data(Payload::Design(values)) => values.to_vec(),
        other => return Err(unexpected("data/design", &other)),
    };

    let classification = match rx.recv_into(&mut rx_buf).await? {
        Msg::Data(Payload::Classification(values)) => values.to_vec(),
        other => return Err(unexpected("data/classification", &other)),
    };

    WorkerBuilder::new().build(spec, design, classification)
}

async fn report_failure<W>(tx: &mut OnoSender<W>, err: &WorkerErr)
where
    W: AsyncWrite + Unpin + Send,
{
    let msg = match err {
        &WorkerErr::Diverged {
            class_index,
            iterations,
        } => Msg::Control(Command::Diverged {
            class_index,
            iterations,
        }),
        other => Msg::Err(Cow::Owned(other.to_string())),
    };

    if let Err(e) = tx.send(&msg).await {
        warn!("couldn't report the failure to the orchestrator: {e}");
    }
}

/// The length of a data frame of `rows x columns` values.
fn max_data_len(rows: usize, columns: usize) -> usize {
    rows.saturating_mul(columns)
        .saturating_add(1)
        .saturating_mul(size_of::<f64>())
}

fn unexpected(expected: &'static str, got: &Msg<'_>) -> WorkerErr {
    WorkerErr::UnexpectedMessage {
        expected,
        got: got.kind(),
    }
}
