use crate::state_machine::{
    phases::{self, PhaseState},
    StateMachine,
};

impl StateMachine {
    pub fn is_init(&self) -> bool {
        matches!(self, StateMachine::Init(_))
    }

    pub fn is_selection(&self) -> bool {
        matches!(self, StateMachine::Selection(_))
    }

    pub fn into_selection_phase_state(self) -> PhaseState<phases::Selection> {
        match self {
            StateMachine::Selection(state) => state,
            _ => panic!("not in selection state"),
        }
    }

    pub fn is_training(&self) -> bool {
        matches!(self, StateMachine::Training(_))
    }

    pub fn into_training_phase_state(self) -> PhaseState<phases::Training> {
        match self {
            StateMachine::Training(state) => state,
            _ => panic!("not in training state"),
        }
    }

    pub fn is_aggregation(&self) -> bool {
        matches!(self, StateMachine::Aggregation(_))
    }

    pub fn is_evaluation(&self) -> bool {
        matches!(self, StateMachine::Evaluation(_))
    }

    pub fn into_evaluation_phase_state(self) -> PhaseState<phases::Evaluation> {
        match self {
            StateMachine::Evaluation(state) => state,
            _ => panic!("not in evaluation state"),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, StateMachine::Shutdown(_))
    }
}
