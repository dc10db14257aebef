use std::{
    env,
    ffi::OsString,
    io,
    path::PathBuf,
    process::Stdio,
};

use futures::{FutureExt, future::BoxFuture};
use log::debug;
use tokio::{
    io::{AsyncRead, AsyncWrite, DuplexStream, ReadHalf, WriteHalf},
    process::{ChildStdin, ChildStdout, Command},
    task::JoinHandle,
};

/// A freshly started worker.
pub struct Spawned<R, W> {
    /// Reads what the worker sends.
    pub rx: R,
    /// Writes to the worker.
    pub tx: W,
    /// Resolves once the worker terminates, with the failure detail if it didn't
    /// terminate cleanly. Dropping it tears the worker down.
    pub exit: BoxFuture<'static, Result<(), String>>,
}

/// Starts isolated workers that speak the worker protocol.
pub trait Launcher: Send + Sync + 'static {
    type Rx: AsyncRead + Unpin + Send + 'static;
    type Tx: AsyncWrite + Unpin + Send + 'static;

    /// Starts a new worker.
    ///
    /// # Arguments
    /// * `worker_id` - The id the worker will be known by.
    ///
    /// # Returns
    /// The worker's channel halves and exit handle, or an io error if it couldn't be started.
    fn launch(&self, worker_id: usize) -> io::Result<Spawned<Self::Rx, Self::Tx>>;
}

/// Runs every worker as a child process talking through its stdin and stdout.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessLauncher {
    /// Creates a new `ProcessLauncher`.
    ///
    /// # Arguments
    /// * `program` - The worker executable.
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Creates a `ProcessLauncher` that re-executes the running binary.
    ///
    /// # Arguments
    /// * `mode` - The argument that switches the binary into worker mode.
    pub fn current_exe(mode: &str) -> io::Result<Self> {
        Ok(Self::new(env::current_exe()?).arg(mode))
    }

    /// Appends an argument to the worker's command line.
    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Launcher for ProcessLauncher {
    type Rx = ChildStdout;
    type Tx = ChildStdin;

    fn launch(&self, worker_id: usize) -> io::Result<Spawned<Self::Rx, Self::Tx>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        debug!(worker_id = worker_id; "spawned worker process {:?}", child.id());

        let tx = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("the worker's stdin isn't piped"))?;
        let rx = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("the worker's stdout isn't piped"))?;

        let exit = async move {
            match child.wait().await {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(format!("worker process exited with {status}")),
                Err(e) => Err(format!("couldn't wait for the worker process: {e}")),
            }
        }
        .boxed();

        Ok(Spawned { rx, tx, exit })
    }
}

/// Runs every worker as a task of the current runtime, connected through an
/// in-memory pipe.
#[derive(Debug, Clone)]
pub struct InProcessLauncher {
    buffer: usize,
}

impl InProcessLauncher {
    /// Creates a new `InProcessLauncher`.
    ///
    /// # Arguments
    /// * `buffer` - The capacity in bytes of each direction of the pipe.
    pub fn new(buffer: usize) -> Self {
        Self { buffer }
    }
}

impl Default for InProcessLauncher {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

impl Launcher for InProcessLauncher {
    type Rx = ReadHalf<DuplexStream>;
    type Tx = WriteHalf<DuplexStream>;

    fn launch(&self, worker_id: usize) -> io::Result<Spawned<Self::Rx, Self::Tx>> {
        let (ours, theirs) = tokio::io::duplex(self.buffer);

        let (wk_rx, wk_tx) = tokio::io::split(theirs);
        let handle = tokio::spawn(async move {
            let (rx, tx) = comms::channel(wk_rx, wk_tx);
            worker::serve(rx, tx).await.map_err(|e| e.to_string())
        });

        debug!(worker_id = worker_id; "spawned in-process worker");

        let mut guard = AbortOnDrop(handle);
        let exit = async move {
            match (&mut guard.0).await {
                Ok(result) => result,
                Err(e) => Err(format!("worker task failed: {e}")),
            }
        }
        .boxed();

        let (rx, tx) = tokio::io::split(ours);
        Ok(Spawned { rx, tx, exit })
    }
}

/// Aborts the wrapped task once dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
