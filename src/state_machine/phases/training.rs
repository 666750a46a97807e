use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    metrics::{MetricRecord, MetricsError},
    model::{MetricValues, Model, ModelError},
    state_machine::{
        phases::{Aggregation, Phase, PhaseError, PhaseName, PhaseState, Shared},
        StateMachine,
    },
};

/// Errors which can occur during the training phase.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("local training of participant `{id}` failed: {error:#}")]
    Model { id: String, error: ModelError },
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// The training state.
#[derive(Debug, Default)]
pub struct Training {
    /// The local models and their aggregation weights.
    updates: Vec<(f64, Model)>,
}

#[async_trait]
impl Phase for PhaseState<Training> {
    const NAME: PhaseName = PhaseName::Training;

    /// Trains the global model locally on every selected participant.
    ///
    /// The system metrics of the local trainings are appended to the metric logs.
    async fn process(&mut self) -> Result<(), PhaseError> {
        let round_id = self.shared.round_id();
        let record = self.train_selected()?;
        info!("trained {} local models", self.private.updates.len());

        self.shared
            .metrics
            .write_sys(round_id, &record, &self.shared.groups)
            .await
            .map_err(TrainingError::from)?;
        Ok(())
    }

    fn next(self) -> StateMachine {
        PhaseState::<Aggregation>::new(self.shared, self.private.updates).into()
    }
}

impl PhaseState<Training> {
    /// Creates a new training state.
    pub fn new(shared: Shared) -> Self {
        Self {
            private: Training::default(),
            shared,
        }
    }

    fn train_selected(&mut self) -> Result<MetricRecord, TrainingError> {
        let training = self.shared.state.training;
        let global = &self.shared.global;
        let bytes_read = global.size_in_bytes() as f64;
        let participants = &self.shared.participants;
        let model = &mut self.shared.model;
        let rng = &mut self.shared.rng;

        let mut record = MetricRecord::new();
        for participant in self
            .shared
            .selected
            .iter()
            .filter_map(|index| participants.get(*index))
        {
            let model_error = |error| TrainingError::Model {
                id: participant.id().to_string(),
                error,
            };

            model.set_params(global).map_err(model_error)?;
            let started = Instant::now();
            let update = model
                .train(participant.train_data(), &training, &mut *rng)
                .map_err(model_error)?;
            let training_time = started.elapsed();
            debug!(
                "participant {} trained on {} samples",
                participant.id(),
                update.num_samples,
            );

            let mut metrics = MetricValues::new();
            metrics.insert("bytes_read".to_string(), bytes_read);
            metrics.insert(
                "bytes_written".to_string(),
                update.model.size_in_bytes() as f64,
            );
            metrics.insert(
                "local_computations".to_string(),
                update.computations as f64,
            );
            metrics.insert("training_time".to_string(), training_time.as_secs_f64());
            record.insert(participant.id(), participant.num_samples() as f64, metrics);

            self.private
                .updates
                .push((update.num_samples as f64, update.model));
        }
        Ok(record)
    }
}
