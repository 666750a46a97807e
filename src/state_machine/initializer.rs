use std::sync::Arc;

use crate::{
    metrics::MetricsWriter,
    model::ClientModel,
    participant::Participant,
    selector::{RandomSelector, Selector},
    state_machine::{
        coordinator::CoordinatorState,
        events::{EventPublisher, EventSubscriber},
        phases::{Init, PhaseName, PhaseState, Shared},
        StateMachine,
    },
    storage::CheckpointStore,
};

/// The state machine initializer that initializes a new state machine.
pub struct StateMachineInitializer {
    coordinator_state: CoordinatorState,
    participants: Vec<Participant>,
    model: Box<dyn ClientModel>,
    selector: Box<dyn Selector + Send>,
    metrics: MetricsWriter,
    checkpoints: CheckpointStore,
}

impl StateMachineInitializer {
    /// Creates a new [`StateMachineInitializer`].
    ///
    /// The participants are selected uniformly at random, seeded by the coordinator state.
    pub fn new(
        coordinator_state: CoordinatorState,
        participants: Vec<Participant>,
        model: Box<dyn ClientModel>,
        metrics: MetricsWriter,
        checkpoints: CheckpointStore,
    ) -> Self {
        let selector = Box::new(RandomSelector::new(coordinator_state.seed));
        Self {
            coordinator_state,
            participants,
            model,
            selector,
            metrics,
            checkpoints,
        }
    }

    /// Replaces the participant selection.
    pub fn with_selector(mut self, selector: impl Selector + Send + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    /// Initializes a new [`StateMachine`] in the init phase.
    ///
    /// The global model starts from the current parameters of the model.
    pub fn init(self) -> (StateMachine, EventSubscriber) {
        let (event_publisher, event_subscriber) = EventPublisher::init(
            self.coordinator_state.round_id,
            PhaseName::Init,
            Arc::new(self.model.params()),
        );

        let shared = Shared::new(
            self.coordinator_state,
            self.participants,
            self.selector,
            self.model,
            event_publisher,
            self.metrics,
            self.checkpoints,
        );
        (PhaseState::<Init>::new(shared).into(), event_subscriber)
    }
}
