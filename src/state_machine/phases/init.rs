use async_trait::async_trait;
use tracing::info;

use crate::state_machine::{
    phases::{Phase, PhaseError, PhaseName, PhaseState, Shared},
    StateMachine,
};

/// The initial state.
#[derive(Debug)]
pub struct Init;

#[async_trait]
impl Phase for PhaseState<Init> {
    const NAME: PhaseName = PhaseName::Init;

    /// Evaluates the initial global model on all participants.
    async fn process(&mut self) -> Result<(), PhaseError> {
        let population = self.shared.participants.len();
        info!("evaluating the initial model on {} participants", population);
        let all = (0..population).collect::<Vec<_>>();
        self.evaluate(&all).await?;
        Ok(())
    }

    fn next(self) -> StateMachine {
        self.shared.next_round()
    }
}

impl PhaseState<Init> {
    /// Creates a new init state.
    pub fn new(shared: Shared) -> Self {
        Self {
            private: Init,
            shared,
        }
    }
}
