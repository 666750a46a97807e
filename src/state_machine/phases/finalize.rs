use async_trait::async_trait;
use tracing::info;

use crate::state_machine::{
    phases::{Phase, PhaseError, PhaseName, PhaseState, Shared, Shutdown},
    StateMachine,
};

/// The finalize state.
#[derive(Debug)]
pub struct Finalize;

#[async_trait]
impl Phase for PhaseState<Finalize> {
    const NAME: PhaseName = PhaseName::Finalize;

    /// Saves the global model and logs the progress of the run.
    async fn process(&mut self) -> Result<(), PhaseError> {
        let path = self
            .shared
            .checkpoints
            .save(
                &self.shared.state.dataset,
                &self.shared.state.model,
                &self.shared.global,
            )
            .await?;
        info!("model saved in {}", path.display());
        self.shared.report.checkpoint_path = Some(path);

        info!("accuracies: {:?}", self.shared.report.accuracies);
        info!("cumulative times: {:?}", self.shared.report.cumulative_times());
        Ok(())
    }

    fn next(self) -> StateMachine {
        PhaseState::<Shutdown>::new(self.shared, None).into()
    }
}

impl PhaseState<Finalize> {
    /// Creates a new finalize state.
    pub fn new(shared: Shared) -> Self {
        Self {
            private: Finalize,
            shared,
        }
    }
}
