//! This module provides the [`StateMachine`]'s `Events`, `EventSubscriber` and `EventPublisher`
//! types.
//!
//! [`StateMachine`]: crate::state_machine::StateMachine

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::watch;

use crate::{model::Model, participant::DataSet, state_machine::phases::PhaseName, stats::Summary};

/// An event emitted by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    /// Metadata that associates this event to the round in which it is
    /// emitted.
    pub round_id: u64,
    /// The event itself
    pub event: E,
}

/// The aggregated metrics of an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundEvaluation {
    /// The data set the participants were evaluated on.
    pub set: DataSet,
    /// The summary of every metric, weighted by the number of samples.
    pub metrics: BTreeMap<String, Summary>,
}

/// Evaluation update event.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationUpdate {
    Invalidate,
    New(Arc<RoundEvaluation>),
}

/// A convenience type to emit any coordinator event.
#[derive(Debug)]
pub struct EventPublisher {
    /// Round ID that is attached to all the events.
    round_id: u64,
    phase_tx: EventBroadcaster<PhaseName>,
    model_tx: EventBroadcaster<Arc<Model>>,
    evaluation_tx: EventBroadcaster<EvaluationUpdate>,
}

/// The `EventSubscriber` hands out `EventListener`s for any
/// coordinator event.
#[derive(Debug)]
pub struct EventSubscriber {
    phase_rx: EventListener<PhaseName>,
    model_rx: EventListener<Arc<Model>>,
    evaluation_rx: EventListener<EvaluationUpdate>,
}

impl EventPublisher {
    /// Initialize a new event publisher with the given initial events.
    pub fn init(round_id: u64, phase: PhaseName, model: Arc<Model>) -> (Self, EventSubscriber) {
        let (phase_tx, phase_rx) = watch::channel::<Event<PhaseName>>(Event {
            round_id,
            event: phase,
        });

        let (model_tx, model_rx) = watch::channel::<Event<Arc<Model>>>(Event {
            round_id,
            event: model,
        });

        let (evaluation_tx, evaluation_rx) = watch::channel::<Event<EvaluationUpdate>>(Event {
            round_id,
            event: EvaluationUpdate::Invalidate,
        });

        let publisher = EventPublisher {
            round_id,
            phase_tx: phase_tx.into(),
            model_tx: model_tx.into(),
            evaluation_tx: evaluation_tx.into(),
        };

        let subscriber = EventSubscriber {
            phase_rx: phase_rx.into(),
            model_rx: model_rx.into(),
            evaluation_rx: evaluation_rx.into(),
        };

        (publisher, subscriber)
    }

    /// Set the round ID that is attached to the events the publisher broadcasts.
    pub fn set_round_id(&mut self, id: u64) {
        self.round_id = id;
    }

    fn event<T>(&self, event: T) -> Event<T> {
        Event {
            round_id: self.round_id,
            event,
        }
    }

    /// Emit a phase event
    pub fn broadcast_phase(&mut self, phase: PhaseName) {
        self.phase_tx.broadcast(self.event(phase));
    }

    /// Emit a global model event
    pub fn broadcast_model(&mut self, model: Arc<Model>) {
        self.model_tx.broadcast(self.event(model));
    }

    /// Emit an evaluation event
    pub fn broadcast_evaluation(&mut self, update: EvaluationUpdate) {
        self.evaluation_tx.broadcast(self.event(update));
    }
}

impl EventSubscriber {
    /// Get a listener for new phase events
    pub fn phase_listener(&self) -> EventListener<PhaseName> {
        self.phase_rx.clone()
    }

    /// Get a listener for new global model events
    pub fn model_listener(&self) -> EventListener<Arc<Model>> {
        self.model_rx.clone()
    }

    /// Get a listener for new evaluation events
    pub fn evaluation_listener(&self) -> EventListener<EvaluationUpdate> {
        self.evaluation_rx.clone()
    }
}

/// A listener for coordinator events. It can be used to either
/// retrieve the latest `Event<E>` emitted by the coordinator (with
/// `EventListener::get_latest`) or to wait for the next one (with
/// `EventListener::changed`).
#[derive(Debug, Clone)]
pub struct EventListener<E>(watch::Receiver<Event<E>>);

impl<E> From<watch::Receiver<Event<E>>> for EventListener<E> {
    fn from(receiver: watch::Receiver<Event<E>>) -> Self {
        EventListener(receiver)
    }
}

impl<E> EventListener<E>
where
    E: Clone,
{
    pub fn get_latest(&self) -> Event<E> {
        self.0.borrow().clone()
    }

    /// Waits for an event which hasn't been seen yet.
    ///
    /// Returns `None` once the coordinator is gone.
    pub async fn changed(&mut self) -> Option<Event<E>> {
        self.0.changed().await.ok()?;
        Some(self.0.borrow_and_update().clone())
    }
}

/// A channel to send `Event<E>` to all the `EventListener<E>`.
#[derive(Debug)]
pub struct EventBroadcaster<E>(watch::Sender<Event<E>>);

impl<E> EventBroadcaster<E> {
    /// Send `event` to all the `EventListener<E>`
    fn broadcast(&self, event: Event<E>) {
        // the latest event is kept even without listeners
        self.0.send_replace(event);
    }
}

impl<E> From<watch::Sender<Event<E>>> for EventBroadcaster<E> {
    fn from(sender: watch::Sender<Event<E>>) -> Self {
        Self(sender)
    }
}
