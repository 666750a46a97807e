//! The outcome of a run.

use std::{path::PathBuf, time::Duration};

/// The progress a run made until it shut down.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// The weighted mean accuracy in percent of every evaluation.
    pub accuracies: Vec<f64>,
    /// The round of every evaluation and the time elapsed since the start of the run.
    pub checkpoints: Vec<(u64, Duration)>,
    /// The duration of the whole run.
    pub total_time: Duration,
    /// Where the final global model was saved.
    pub checkpoint_path: Option<PathBuf>,
}

impl RunReport {
    /// Gets the rounds after which the global model was evaluated.
    pub fn evaluation_rounds(&self) -> Vec<u64> {
        self.checkpoints.iter().map(|(round, _)| *round).collect()
    }

    /// Gets the elapsed time of every evaluation in seconds.
    pub fn cumulative_times(&self) -> Vec<f64> {
        self.checkpoints
            .iter()
            .map(|(_, elapsed)| elapsed.as_secs_f64())
            .collect()
    }
}
