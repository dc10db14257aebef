use std::io;

use log::info;

/// Standalone worker process, it serves a single task over stdin and stdout.
#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    info!("waiting for a task on stdin");
    worker::serve_stdio().await?;
    info!("wrapping up");

    Ok(())
}
