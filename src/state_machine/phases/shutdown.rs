use tracing::info;

use crate::state_machine::{
    phases::{PhaseError, PhaseName, PhaseState, Shared},
    RunReport,
};

/// The shutdown state.
///
/// This is the terminal state of every run, it carries the error of a failed run.
#[derive(Debug)]
pub struct Shutdown {
    error: Option<PhaseError>,
}

impl PhaseState<Shutdown> {
    /// Creates a new shutdown state.
    pub fn new(shared: Shared, error: Option<PhaseError>) -> Self {
        Self {
            private: Shutdown { error },
            shared,
        }
    }

    /// Shuts down the [`StateMachine`] and hands out the outcome of the run.
    ///
    /// # Errors
    /// Fails with the error of the phase which made the run fail.
    ///
    /// [`StateMachine`]: crate::state_machine::StateMachine
    pub fn finish(mut self) -> Result<RunReport, PhaseError> {
        self.shared.events.broadcast_phase(PhaseName::Shutdown);
        self.shared.report.total_time = self.shared.started.elapsed();
        info!(
            "shut down after {} rounds in {:.3}s",
            self.shared.round_id(),
            self.shared.report.total_time.as_secs_f64(),
        );

        match self.private.error {
            Some(error) => Err(error),
            None => Ok(self.shared.report),
        }
    }
}
