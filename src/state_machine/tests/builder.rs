use std::path::{Path, PathBuf};

use crate::{
    model::ClientModel,
    participant::Participant,
    state_machine::{
        coordinator::CoordinatorState,
        events::EventSubscriber,
        phases::{Init, PhaseState, Shared},
        tests::utils,
        StateMachine,
    },
};

type PhaseFactory = Box<dyn FnOnce(Shared) -> StateMachine>;

pub struct StateMachineBuilder {
    coordinator_state: CoordinatorState,
    participants: Vec<Participant>,
    model: Box<dyn ClientModel>,
    selected: Vec<usize>,
    phase: PhaseFactory,
    dir: PathBuf,
}

impl StateMachineBuilder {
    /// Creates a builder of a state machine in the init phase which writes its metrics and
    /// checkpoints to `dir`.
    pub fn new(dir: &Path) -> Self {
        Self {
            coordinator_state: utils::coordinator_state(),
            participants: utils::participants(4),
            model: utils::model(),
            selected: Vec::new(),
            phase: Box::new(|shared| PhaseState::<Init>::new(shared).into()),
            dir: dir.to_path_buf(),
        }
    }

    pub fn build(self) -> (StateMachine, EventSubscriber) {
        let Self {
            coordinator_state,
            participants,
            model,
            selected,
            phase,
            dir,
        } = self;

        let round_id = coordinator_state.round_id;
        let (mut shared, event_subscriber) =
            utils::init_shared(coordinator_state, participants, model, &dir);
        shared.set_round_id(round_id);
        shared.selected = selected;

        (phase(shared), event_subscriber)
    }

    /// Starts the state machine in another phase.
    pub fn with_phase(mut self, phase: impl FnOnce(Shared) -> StateMachine + 'static) -> Self {
        self.phase = Box::new(phase);
        self
    }

    pub fn with_round_id(mut self, id: u64) -> Self {
        self.coordinator_state.round_id = id;
        self
    }

    pub fn with_num_rounds(mut self, num_rounds: u64) -> Self {
        self.coordinator_state.schedule.num_rounds = num_rounds;
        self
    }

    pub fn with_eval_every(mut self, eval_every: u64) -> Self {
        self.coordinator_state.schedule.eval_every = eval_every;
        self
    }

    pub fn with_clients_per_round(mut self, clients_per_round: usize) -> Self {
        self.coordinator_state.schedule.clients_per_round = clients_per_round;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.coordinator_state.seed = seed;
        self
    }

    pub fn with_test_all(mut self, test_all: bool) -> Self {
        self.coordinator_state.test_all = test_all;
        self
    }

    pub fn with_participants(mut self, participants: Vec<Participant>) -> Self {
        self.participants = participants;
        self
    }

    pub fn with_model(mut self, model: Box<dyn ClientModel>) -> Self {
        self.model = model;
        self
    }

    /// Sets the participants of the current round.
    pub fn with_selected(mut self, selected: Vec<usize>) -> Self {
        self.selected = selected;
        self
    }
}
