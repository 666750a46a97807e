//! Coordinator state and round parameter types.

use serde::{Deserialize, Serialize};

use crate::{
    model::TrainingParams,
    participant::DataSet,
    settings::{FederationSettings, RoundSchedule},
};

/// The coordinator state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorState {
    /// The current round, `0` before the first round.
    pub round_id: u64,
    /// The number of rounds, the evaluation frequency and the participants per round.
    pub schedule: RoundSchedule,
    /// The seed of the participant selection and the model randomness.
    pub seed: u64,
    /// The local training parameters.
    pub training: TrainingParams,
    /// The held-out data set of the evaluations.
    pub eval_set: DataSet,
    /// Whether to evaluate all participants instead of the selected ones.
    pub test_all: bool,
    /// The dataset name.
    pub dataset: String,
    /// The model name.
    pub model: String,
}

impl CoordinatorState {
    pub fn new(settings: &FederationSettings, schedule: RoundSchedule) -> Self {
        Self {
            round_id: 0,
            schedule,
            seed: settings.seed,
            training: settings.training(),
            eval_set: settings.eval_set(),
            test_all: settings.test_all,
            dataset: settings.dataset.clone(),
            model: settings.model.clone(),
        }
    }

    /// Checks whether the current round is followed by an evaluation.
    ///
    /// That's every `eval_every`-th round and the last round.
    pub fn is_evaluation_round(&self) -> bool {
        self.round_id > 0
            && (self.round_id.checked_rem(self.schedule.eval_every) == Some(0)
                || self.round_id == self.schedule.num_rounds)
    }

    /// Checks whether all rounds have been run.
    pub fn is_last_round(&self) -> bool {
        self.round_id >= self.schedule.num_rounds
    }
}
