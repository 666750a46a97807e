//! This module provides the `PhaseStates` of the [`StateMachine`].

mod aggregation;
mod evaluation;
mod failure;
mod finalize;
mod init;
mod selection;
mod shutdown;
mod training;

use std::{collections::BTreeMap, fmt, time::Instant};

use async_trait::async_trait;
use derive_more::Display;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{error_span, info, warn};
use tracing_futures::Instrument;

pub use self::{
    aggregation::Aggregation,
    evaluation::{Evaluation, EvaluationError},
    failure::{Failure, PhaseError},
    finalize::Finalize,
    init::Init,
    selection::Selection,
    shutdown::Shutdown,
    training::{Training, TrainingError},
};
use crate::{
    metrics::MetricsWriter,
    model::{ClientModel, Model},
    participant::Participant,
    selector::Selector,
    state_machine::{
        coordinator::CoordinatorState,
        events::EventPublisher,
        RunReport,
        StateMachine,
    },
    storage::CheckpointStore,
};

/// The name of the current phase.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum PhaseName {
    #[display(fmt = "Init")]
    Init,
    #[display(fmt = "Selection")]
    Selection,
    #[display(fmt = "Training")]
    Training,
    #[display(fmt = "Aggregation")]
    Aggregation,
    #[display(fmt = "Evaluation")]
    Evaluation,
    #[display(fmt = "Finalize")]
    Finalize,
    #[display(fmt = "Failure")]
    Failure,
    #[display(fmt = "Shutdown")]
    Shutdown,
}

/// A trait that must be implemented by a state in order to move to a next state.
///
/// See the [module level documentation] for more details.
///
/// [module level documentation]: crate::state_machine
#[async_trait]
pub trait Phase {
    /// The name of the current phase.
    const NAME: PhaseName;

    /// Performs the tasks of this phase.
    async fn process(&mut self) -> Result<(), PhaseError>;

    /// Moves from this phase to the next phase.
    fn next(self) -> StateMachine;
}

/// A struct that contains the coordinator state and the I/O interfaces that are shared and
/// accessible by all `PhaseState`s.
pub struct Shared {
    /// The coordinator state.
    pub(in crate::state_machine) state: CoordinatorState,
    /// All participants, sorted by id.
    pub(in crate::state_machine) participants: Vec<Participant>,
    /// The group of every participant which has one.
    pub(in crate::state_machine) groups: BTreeMap<String, String>,
    /// The indices of the participants of the current round.
    pub(in crate::state_machine) selected: Vec<usize>,
    /// The participant selection.
    pub(in crate::state_machine) selector: Box<dyn Selector + Send>,
    /// The model which is trained and evaluated on behalf of every participant.
    pub(in crate::state_machine) model: Box<dyn ClientModel>,
    /// The global model.
    pub(in crate::state_machine) global: Model,
    /// The randomness of the local trainings.
    pub(in crate::state_machine) rng: ChaCha20Rng,
    /// The event publisher.
    pub(in crate::state_machine) events: EventPublisher,
    /// The writer of the metric logs.
    pub(in crate::state_machine) metrics: MetricsWriter,
    /// The store of the final model.
    pub(in crate::state_machine) checkpoints: CheckpointStore,
    /// The accuracies and timings collected so far.
    pub(in crate::state_machine) report: RunReport,
    /// The start of the run.
    pub(in crate::state_machine) started: Instant,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("state", &self.state)
            .field("participants", &self.participants.len())
            .field("selected", &self.selected)
            .field("global", &self.global.len())
            .field("events", &self.events)
            .field("metrics", &self.metrics)
            .field("checkpoints", &self.checkpoints)
            .field("report", &self.report)
            .finish()
    }
}

impl Shared {
    /// Creates a new shared state.
    ///
    /// The global model starts from the current parameters of the client model.
    pub fn new(
        coordinator_state: CoordinatorState,
        participants: Vec<Participant>,
        selector: Box<dyn Selector + Send>,
        model: Box<dyn ClientModel>,
        publisher: EventPublisher,
        metrics: MetricsWriter,
        checkpoints: CheckpointStore,
    ) -> Self {
        let groups = participants
            .iter()
            .filter_map(|participant| {
                let group = participant.group()?;
                Some((participant.id().to_string(), group.to_string()))
            })
            .collect();
        let rng = ChaCha20Rng::seed_from_u64(coordinator_state.seed);
        let global = model.params();

        Self {
            state: coordinator_state,
            participants,
            groups,
            selected: Vec::new(),
            selector,
            model,
            global,
            rng,
            events: publisher,
            metrics,
            checkpoints,
            report: RunReport::default(),
            started: Instant::now(),
        }
    }

    /// Sets the round ID to the given value.
    pub fn set_round_id(&mut self, id: u64) {
        self.state.round_id = id;
        self.events.set_round_id(id);
    }

    /// Returns the current round ID.
    pub fn round_id(&self) -> u64 {
        self.state.round_id
    }

    /// Moves to the next round after this one, or finalizes the run after the last round.
    fn next_round(self) -> StateMachine {
        if self.state.is_last_round() {
            PhaseState::<Finalize>::new(self).into()
        } else {
            PhaseState::<Selection>::new(self).into()
        }
    }
}

/// The state corresponding to a phase of the simulation.
///
/// This contains the state-dependent `private` state and the state-independent `shared` state
/// which is shared across state transitions.
#[derive(Debug)]
pub struct PhaseState<S> {
    /// The private state.
    pub(in crate::state_machine) private: S,
    /// The shared coordinator state and I/O interfaces.
    pub(in crate::state_machine) shared: Shared,
}

impl<S> PhaseState<S>
where
    S: Send,
    Self: Phase,
{
    /// Runs the current phase to completion.
    ///
    /// 1. Performs the phase tasks.
    /// 2. Transitions to the next phase, or to the failure phase if the tasks failed.
    pub async fn run_phase(mut self) -> StateMachine {
        let phase = Self::NAME;
        let span = error_span!("run_phase", phase = %phase, round_id = self.shared.round_id());

        async move {
            info!("starting phase");
            self.shared.events.broadcast_phase(phase);

            if let Err(err) = self.process().await {
                warn!("failed to perform the phase tasks");
                return self.into_failure_state(err);
            }
            info!("phase ran successfully");

            info!("transitioning to the next phase");
            self.next()
        }
        .instrument(span)
        .await
    }
}

impl<S> PhaseState<S> {
    fn into_failure_state(self, err: PhaseError) -> StateMachine {
        PhaseState::<Failure>::new(self.shared, err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::tests::utils;

    #[test]
    fn test_update_round_id() {
        let dir = tempfile::TempDir::new().unwrap();
        let (mut shared, event_subscriber) = utils::init_shared(
            utils::coordinator_state(),
            utils::participants(4),
            utils::model(),
            dir.path(),
        );

        let phases = event_subscriber.phase_listener();
        // When starting the round ID should be 0
        let id = phases.get_latest().round_id;
        assert_eq!(id, 0);

        shared.set_round_id(1);
        assert_eq!(shared.state.round_id, 1);

        // Old events should still have the same round ID
        let id = phases.get_latest().round_id;
        assert_eq!(id, 0);

        // But new events should have the new round ID
        shared.events.broadcast_phase(PhaseName::Selection);
        let id = phases.get_latest().round_id;
        assert_eq!(id, 1);
    }

    #[test]
    fn test_groups_of_participants() {
        let dir = tempfile::TempDir::new().unwrap();
        let (shared, _) = utils::init_shared(
            utils::coordinator_state(),
            utils::participants(3),
            utils::model(),
            dir.path(),
        );

        assert_eq!(shared.groups.len(), 3);
        assert_eq!(shared.groups.get("p01").map(String::as_str), Some("g1"));
        assert_eq!(shared.global, shared.model.params());
    }
}
