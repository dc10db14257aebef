use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context;
use orchestrator::Classification;
use serde::{Deserialize, Serialize};

/// A labelled example of the training input.
#[derive(Debug, Deserialize)]
pub struct Example {
    pub features: Vec<f64>,
    pub label: String,
}

/// The training input, the examples to learn from and the observations to classify.
#[derive(Debug, Deserialize)]
pub struct Dataset {
    pub examples: Vec<Example>,
    #[serde(default)]
    pub queries: Vec<Vec<f64>>,
}

impl Dataset {
    /// Reads a dataset out of a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("couldn't open {}", path.display()))?;

        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("{} isn't a valid dataset", path.display()))
    }
}

/// The classification of a single query, as printed.
#[derive(Debug, Serialize)]
pub struct Ranking<'a> {
    pub query: &'a [f64],
    pub ranking: Vec<Classification<String>>,
}
