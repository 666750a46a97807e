use async_trait::async_trait;
use thiserror::Error;
use tracing::error;

use crate::{
    model::AggregationError,
    state_machine::{
        phases::{EvaluationError, Phase, PhaseName, PhaseState, Shared, Shutdown, TrainingError},
        StateMachine,
    },
    storage::CheckpointError,
};

/// Errors which can occur during the execution of the [`StateMachine`].
#[derive(Error, Debug)]
pub enum PhaseError {
    #[error("training phase failed: {0}")]
    Training(#[from] TrainingError),
    #[error("aggregation phase failed: {0}")]
    Aggregation(#[from] AggregationError),
    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("failed to save the global model: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// The failure state.
#[derive(Debug)]
pub struct Failure {
    error: PhaseError,
}

#[async_trait]
impl Phase for PhaseState<Failure> {
    const NAME: PhaseName = PhaseName::Failure;

    async fn process(&mut self) -> Result<(), PhaseError> {
        error!("phase state error: {}", self.private.error);
        Ok(())
    }

    /// Moves from the failure state to the shutdown state.
    ///
    /// A failed run is never resumed.
    fn next(self) -> StateMachine {
        PhaseState::<Shutdown>::new(self.shared, Some(self.private.error)).into()
    }
}

impl PhaseState<Failure> {
    /// Creates a new error state.
    pub fn new(shared: Shared, error: PhaseError) -> Self {
        Self {
            private: Failure { error },
            shared,
        }
    }
}
