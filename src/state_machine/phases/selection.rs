use async_trait::async_trait;
use tracing::info;

use crate::state_machine::{
    phases::{Phase, PhaseError, PhaseName, PhaseState, Shared, Training},
    StateMachine,
};

/// The selection state.
#[derive(Debug)]
pub struct Selection;

#[async_trait]
impl Phase for PhaseState<Selection> {
    const NAME: PhaseName = PhaseName::Selection;

    /// Selects the participants of the round.
    async fn process(&mut self) -> Result<(), PhaseError> {
        let round_id = self.shared.round_id();
        let population = self.shared.participants.len();
        let count = self.shared.state.schedule.clients_per_round.min(population);

        self.shared.selected = self.shared.selector.select(round_id, population, count);
        info!(
            "round {} of {}: training {} participants",
            round_id,
            self.shared.state.schedule.num_rounds,
            self.shared.selected.len(),
        );
        Ok(())
    }

    fn next(self) -> StateMachine {
        PhaseState::<Training>::new(self.shared).into()
    }
}

impl PhaseState<Selection> {
    /// Creates a new selection state and starts the next round.
    pub fn new(mut shared: Shared) -> Self {
        shared.set_round_id(shared.round_id() + 1);
        Self {
            private: Selection,
            shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::state_machine::{
        phases::{PhaseState, Selection},
        tests::{builder::StateMachineBuilder, utils},
    };

    #[tokio::test]
    async fn test_selection_starts_the_next_round() {
        let dir = tempfile::TempDir::new().unwrap();
        let (state_machine, event_subscriber) = StateMachineBuilder::new(dir.path())
            .with_participants(utils::participants(10))
            .with_clients_per_round(3)
            .with_round_id(4)
            .with_phase(|shared| PhaseState::<Selection>::new(shared).into())
            .build();
        assert!(state_machine.is_selection());

        let state_machine = state_machine.next().await;
        let state = state_machine.into_training_phase_state();
        assert_eq!(state.shared.round_id(), 5);
        assert_eq!(state.shared.selected.len(), 3);
        assert!(state.shared.selected.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(state.shared.selected.iter().all(|index| *index < 10));
        assert_eq!(event_subscriber.phase_listener().get_latest().round_id, 5);
    }

    #[tokio::test]
    async fn test_select_whole_small_population() {
        let dir = tempfile::TempDir::new().unwrap();
        let (state_machine, _) = StateMachineBuilder::new(dir.path())
            .with_participants(utils::participants(2))
            .with_clients_per_round(5)
            .with_phase(|shared| PhaseState::<Selection>::new(shared).into())
            .build();

        let state = state_machine.next().await.into_training_phase_state();
        assert_eq!(state.shared.selected, [0, 1]);
    }
}
