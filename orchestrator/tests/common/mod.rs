#![allow(dead_code)]

use std::{io, sync::Arc, time::Duration};

use comms::{
    OnoReceiver,
    msg::{Command, Msg},
    specs::TaskSpec,
};
use futures::FutureExt;
use orchestrator::{Launcher, Spawned};
use tokio::io::{AsyncRead, DuplexStream, ReadHalf, WriteHalf};

/// Three clusters around (0, 0), (4, 0) and (0, 4), five examples each.
pub const CLUSTERS: [([f64; 2], &str); 15] = [
    ([-0.176, -0.349], "origin"),
    ([0.151, -0.428], "origin"),
    ([0.036, -0.134], "origin"),
    ([-0.442, 0.007], "origin"),
    ([-0.463, -0.066], "origin"),
    ([3.57, -0.409], "east"),
    ([3.925, 0.327], "east"),
    ([3.624, -0.277], "east"),
    ([4.127, 0.448], "east"),
    ([4.077, -0.103], "east"),
    ([0.476, 3.547], "north"),
    ([0.358, 3.79], "north"),
    ([-0.356, 3.618], "north"),
    ([-0.192, 4.316], "north"),
    ([-0.319, 4.082], "north"),
];

/// The examples of two one dimensional clusters, "A" near 0 and "B" near 10.
pub fn two_clusters() -> Vec<(Vec<f64>, &'static str)> {
    (0..20)
        .map(|i| (vec![0.05 * i as f64], "A"))
        .chain((0..20).map(|i| (vec![10. + 0.05 * i as f64], "B")))
        .collect()
}

/// Runs the real worker behind an in-memory pipe once the worker's delay elapses.
pub struct DelayedLauncher {
    pub delays: Arc<Vec<Duration>>,
}

impl Launcher for DelayedLauncher {
    type Rx = ReadHalf<DuplexStream>;
    type Tx = WriteHalf<DuplexStream>;

    fn launch(&self, worker_id: usize) -> io::Result<Spawned<Self::Rx, Self::Tx>> {
        let delay = self.delays.get(worker_id).copied().unwrap_or_default();

        spawn_worker(move |rx, tx| async move {
            tokio::time::sleep(delay).await;
            let (rx, tx) = comms::channel(rx, tx);
            worker::serve(rx, tx).await.map_err(|e| e.to_string())
        })
    }
}

/// Spawns a worker task on one end of a pipe and hands back the other end.
pub fn spawn_worker<F, Fut>(worker: F) -> io::Result<Spawned<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>>
where
    F: FnOnce(ReadHalf<DuplexStream>, WriteHalf<DuplexStream>) -> Fut,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    let (ours, theirs) = tokio::io::duplex(64 * 1024);
    let (wk_rx, wk_tx) = tokio::io::split(theirs);
    let handle = tokio::spawn(worker(wk_rx, wk_tx));

    let exit = async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(e.to_string()),
        }
    }
    .boxed();

    let (rx, tx) = tokio::io::split(ours);
    Ok(Spawned { rx, tx, exit })
}

/// Reads the three frames of a task the way a worker does, keeping only its spec.
pub async fn receive_task<R: AsyncRead + Unpin>(rx: &mut OnoReceiver<R>) -> Result<TaskSpec, String> {
    let mut rx_buf: Vec<f64> = Vec::new();

    let msg: Msg = rx.recv_into(&mut rx_buf).await.map_err(|e| e.to_string())?;
    let Msg::Control(Command::Train(spec)) = msg else {
        return Err("expected a task".into());
    };

    for _ in 0..2 {
        let _: Msg = rx.recv_into(&mut rx_buf).await.map_err(|e| e.to_string())?;
    }

    Ok(spec)
}
