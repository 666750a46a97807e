use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    model::{Aggregation as ModelAggregation, Model},
    state_machine::{
        phases::{Evaluation, Phase, PhaseError, PhaseName, PhaseState, Shared},
        StateMachine,
    },
};

/// The aggregation state.
#[derive(Debug)]
pub struct Aggregation {
    /// The local models and their aggregation weights.
    updates: Vec<(f64, Model)>,
}

#[async_trait]
impl Phase for PhaseState<Aggregation> {
    const NAME: PhaseName = PhaseName::Aggregation;

    /// Replaces the global model by the weighted average of the local models.
    ///
    /// The global model is kept if there are no local models with a positive weight.
    async fn process(&mut self) -> Result<(), PhaseError> {
        let mut aggregation = ModelAggregation::new(self.shared.global.len());
        for (weight, model) in self.private.updates.iter() {
            aggregation.aggregate(*weight, model)?;
        }

        match aggregation.finish() {
            Some(global) => {
                info!("aggregated {} local models", self.private.updates.len());
                self.shared.global = global;
                self.shared
                    .events
                    .broadcast_model(Arc::new(self.shared.global.clone()));
            }
            None => warn!("no local model to aggregate: keeping the global model"),
        }
        Ok(())
    }

    fn next(self) -> StateMachine {
        if self.shared.state.is_evaluation_round() {
            PhaseState::<Evaluation>::new(self.shared).into()
        } else {
            self.shared.next_round()
        }
    }
}

impl PhaseState<Aggregation> {
    /// Creates a new aggregation state.
    pub fn new(shared: Shared, updates: Vec<(f64, Model)>) -> Self {
        Self {
            private: Aggregation { updates },
            shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::Model,
        state_machine::{
            phases::{Aggregation, PhaseState, Shared},
            tests::{builder::StateMachineBuilder, utils},
            StateMachine,
        },
    };

    fn aggregation(updates: Vec<(f64, Model)>) -> impl FnOnce(Shared) -> StateMachine {
        move |shared| PhaseState::<Aggregation>::new(shared, updates).into()
    }

    #[tokio::test]
    async fn test_weighted_average() {
        let dir = tempfile::TempDir::new().unwrap();
        let updates = vec![
            (1., Model::from(vec![1., 0., 0., 0., 0.])),
            (3., Model::from(vec![0., 1., 0., 0., 0.])),
        ];
        let (state_machine, event_subscriber) = StateMachineBuilder::new(dir.path())
            .with_round_id(1)
            .with_eval_every(2)
            .with_phase(aggregation(updates))
            .build();

        let state_machine = state_machine.next().await;
        // round 1 isn't evaluated
        let state = state_machine.into_selection_phase_state();
        let expected = Model::from(vec![0.25, 0.75, 0., 0., 0.]);
        assert_eq!(state.shared.global, expected);
        assert_eq!(
            *event_subscriber.model_listener().get_latest().event,
            expected
        );
    }

    #[tokio::test]
    async fn test_keep_global_model_without_updates() {
        let dir = tempfile::TempDir::new().unwrap();
        let (state_machine, _) = StateMachineBuilder::new(dir.path())
            .with_round_id(2)
            .with_eval_every(2)
            .with_phase(aggregation(Vec::new()))
            .build();
        let initial = utils::model().params();

        let state_machine = state_machine.next().await;
        assert!(state_machine.is_evaluation());
        assert_eq!(state_machine.into_evaluation_phase_state().shared.global, initial);
    }

    #[tokio::test]
    async fn test_last_round_is_evaluated() {
        let dir = tempfile::TempDir::new().unwrap();
        let (state_machine, _) = StateMachineBuilder::new(dir.path())
            .with_num_rounds(5)
            .with_eval_every(3)
            .with_round_id(5)
            .with_phase(aggregation(Vec::new()))
            .build();

        assert!(state_machine.next().await.is_evaluation());
    }

    #[tokio::test]
    async fn test_mismatching_update_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let (state_machine, _) = StateMachineBuilder::new(dir.path())
            .with_round_id(1)
            .with_phase(aggregation(vec![(1., Model::zeros(2))]))
            .build();

        let state_machine = state_machine.next().await;
        assert!(matches!(state_machine, StateMachine::Failure(_)));
    }
}
