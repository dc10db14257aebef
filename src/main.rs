mod dataset;

use std::{
    env,
    io::{self, Write},
    num::NonZeroUsize,
};

use anyhow::{Context, anyhow, bail};
use log::info;
use orchestrator::{ProcessLauncher, TrainerBuilder};

use dataset::{Dataset, Example, Ranking};

const WORKER_MODE: &str = "worker";
const POOL_SIZE_VAR: &str = "OVA_POOL_SIZE";
const DEFAULT_POOL_SIZE: usize = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("ova");

    match args.get(1).map(String::as_str) {
        Some("train") => {
            let path = args.get(2).ok_or_else(|| anyhow!(usage(program)))?;
            let pool_size = pool_size(args.get(3))?;

            train(path, pool_size).await
        }
        Some(WORKER_MODE) => {
            // stdout is the channel to the trainer, logs go to stderr.
            worker::serve_stdio().await?;
            Ok(())
        }
        Some(mode) => bail!("unknown mode {mode}\n{}", usage(program)),
        None => bail!(usage(program)),
    }
}

fn usage(program: &str) -> String {
    format!("Usage: {program} <train <dataset.json> [pool_size] | {WORKER_MODE}>")
}

/// The pool size argument, else `OVA_POOL_SIZE`, else the default.
fn pool_size(arg: Option<&String>) -> anyhow::Result<NonZeroUsize> {
    let raw = match arg {
        Some(arg) => arg.clone(),
        None => match env::var(POOL_SIZE_VAR) {
            Ok(var) => var,
            Err(_) => DEFAULT_POOL_SIZE.to_string(),
        },
    };

    raw.parse()
        .with_context(|| format!("the pool size must be a positive integer, got {raw:?}"))
}

async fn train(path: &str, pool_size: NonZeroUsize) -> anyhow::Result<()> {
    let Dataset { examples, queries } = Dataset::from_path(path)?;

    let launcher = ProcessLauncher::current_exe(WORKER_MODE)
        .context("couldn't locate the worker executable")?;

    let mut trainer = TrainerBuilder::new()
        .pool_size(pool_size)
        .launcher(launcher)
        .on_progress(|completed, total| eprintln!("trained {completed}/{total} classes"))
        .build()?;

    for Example { features, label } in examples {
        trainer.add_example(features, label)?;
    }

    info!("training over {pool_size} worker process(es)");
    trainer.train().await?;

    let mut out = io::stdout().lock();

    for query in &queries {
        let ranking = trainer.classify(query)?;
        serde_json::to_writer(&mut out, &Ranking { query, ranking })?;
        writeln!(out)?;
    }

    Ok(())
}
