//! The state machine that orchestrates the rounds of a simulation.
//!
//! # Overview
//!
//! The [`StateMachine`] runs a fixed number of rounds. Every round selects some participants,
//! trains the global model locally on each of them and aggregates the local models into the
//! next global model. The global model is evaluated before the first round, every few rounds
//! and after the last round.
//!
//! Furthermore, the [`StateMachine`] publishes events and writes the metric logs.
//!
//! The [`StateMachine`] as well as the round schedule can be configured in the config file.
//! See [here][settings] for more details.
//!
//! # Phase states
//!
//! **Init**
//!
//! Publishes [`PhaseName::Init`] and evaluates the initial global model on all participants.
//!
//! **Selection**
//!
//! Increments the `round id` by `1`, publishes [`PhaseName::Selection`] and selects the
//! participants of the round.
//!
//! **Training**
//!
//! Publishes [`PhaseName::Training`], trains the global model on the training data of every
//! selected participant and writes their system metrics.
//!
//! **Aggregation**
//!
//! Publishes [`PhaseName::Aggregation`] and averages the local models, weighted by the number
//! of samples they were trained on, into the new global model which is published.
//!
//! **Evaluation**
//!
//! Publishes [`PhaseName::Evaluation`], evaluates the global model on the held-out data of the
//! selected participants, or of all participants, and writes and publishes their metrics.
//!
//! **Finalize**
//!
//! Publishes [`PhaseName::Finalize`] and saves the global model.
//!
//! **Failure**
//!
//! Publishes [`PhaseName::Failure`] and logs the [`PhaseError`] which made a phase fail. A
//! failed run is never resumed.
//!
//! **Shutdown**
//!
//! Publishes [`PhaseName::Shutdown`] and hands out the [`RunReport`], or the error of a
//! failed run.
//!
//! # Events
//!
//! During the execution of the simulation, the [`StateMachine`] publishes various events
//! (see [`EventPublisher`]). Everyone who is interested in one or more events can request an
//! [`EventListener`] for the event(s) via the [`EventSubscriber`]. Each listener only yields
//! the latest event.
//!
//! [settings]: crate::settings
//! [`EventPublisher`]: crate::state_machine::events::EventPublisher
//! [`EventListener`]: crate::state_machine::events::EventListener
//! [`EventSubscriber`]: crate::state_machine::events::EventSubscriber

pub mod coordinator;
pub mod events;
pub mod initializer;
pub mod phases;
pub mod report;

use derive_more::From;

pub use self::{initializer::StateMachineInitializer, report::RunReport};
use self::phases::{
    Aggregation,
    Evaluation,
    Failure,
    Finalize,
    Init,
    PhaseError,
    PhaseState,
    Selection,
    Shutdown,
    Training,
};

/// The state machine with all its states.
#[derive(Debug, From)]
pub enum StateMachine {
    Init(PhaseState<Init>),
    Selection(PhaseState<Selection>),
    Training(PhaseState<Training>),
    Aggregation(PhaseState<Aggregation>),
    Evaluation(PhaseState<Evaluation>),
    Finalize(PhaseState<Finalize>),
    Failure(PhaseState<Failure>),
    Shutdown(PhaseState<Shutdown>),
}

impl StateMachine {
    /// Moves the [`StateMachine`] to the next state and consumes the current one.
    ///
    /// The state [`Shutdown`] is terminal and stays as it is.
    pub async fn next(self) -> Self {
        match self {
            StateMachine::Init(state) => state.run_phase().await,
            StateMachine::Selection(state) => state.run_phase().await,
            StateMachine::Training(state) => state.run_phase().await,
            StateMachine::Aggregation(state) => state.run_phase().await,
            StateMachine::Evaluation(state) => state.run_phase().await,
            StateMachine::Finalize(state) => state.run_phase().await,
            StateMachine::Failure(state) => state.run_phase().await,
            shutdown @ StateMachine::Shutdown(_) => shutdown,
        }
    }

    /// Runs the state machine until it shuts down.
    ///
    /// # Errors
    /// Fails with the error of the first phase which failed.
    pub async fn run(mut self) -> Result<RunReport, PhaseError> {
        loop {
            self = match self {
                StateMachine::Shutdown(state) => return state.finish(),
                state => state.next().await,
            };
        }
    }
}

#[cfg(test)]
pub(crate) mod tests;
