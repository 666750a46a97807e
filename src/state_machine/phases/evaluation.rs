use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::{
    metrics::{aggregate_weighted, MetricRecord, MetricsError},
    model::{ModelError, ACCURACY_KEY},
    state_machine::{
        events::{EvaluationUpdate, RoundEvaluation},
        phases::{Phase, PhaseError, PhaseName, PhaseState, Shared},
        StateMachine,
    },
};

/// Errors which can occur during an evaluation.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("failed to load the global model: {0:#}")]
    Params(ModelError),
    #[error("evaluation of participant `{id}` failed: {error:#}")]
    Model { id: String, error: ModelError },
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// The evaluation state.
#[derive(Debug)]
pub struct Evaluation;

#[async_trait]
impl Phase for PhaseState<Evaluation> {
    const NAME: PhaseName = PhaseName::Evaluation;

    /// Evaluates the global model on the participants of the round, or on all participants.
    async fn process(&mut self) -> Result<(), PhaseError> {
        let indices = if self.shared.state.test_all {
            (0..self.shared.participants.len()).collect()
        } else {
            self.shared.selected.clone()
        };
        info!(
            "evaluating the global model on {} participants",
            indices.len()
        );
        self.evaluate(&indices).await?;
        Ok(())
    }

    fn next(self) -> StateMachine {
        self.shared.next_round()
    }
}

impl PhaseState<Evaluation> {
    /// Creates a new evaluation state.
    pub fn new(shared: Shared) -> Self {
        Self {
            private: Evaluation,
            shared,
        }
    }
}

impl<S> PhaseState<S> {
    /// Evaluates the global model on the held-out data of the given participants.
    ///
    /// The metrics of every participant are appended to the metric logs, their summaries
    /// weighted by the number of samples are logged and broadcasted. The weighted accuracy and
    /// the elapsed time are recorded in the report.
    pub(in crate::state_machine) async fn evaluate(
        &mut self,
        indices: &[usize],
    ) -> Result<(), EvaluationError> {
        let round_id = self.shared.round_id();
        let set = self.shared.state.eval_set;
        let record = self.test_participants(indices)?;

        self.shared
            .metrics
            .write_stat(round_id, set, &record, &self.shared.groups)
            .await?;

        let metrics = aggregate_weighted(&record);
        for (name, summary) in metrics.iter() {
            info!(
                "{}_{}: {}, 10th percentile: {}, 50th percentile: {}, 90th percentile {}",
                set, name, summary.mean, summary.p10, summary.p50, summary.p90,
            );
        }

        if let Some(accuracy) = metrics.get(ACCURACY_KEY) {
            self.shared.report.accuracies.push(accuracy.mean * 100.);
        }
        self.shared
            .report
            .checkpoints
            .push((round_id, self.shared.started.elapsed()));
        self.shared
            .events
            .broadcast_evaluation(EvaluationUpdate::New(Arc::new(RoundEvaluation {
                set,
                metrics,
            })));
        Ok(())
    }

    fn test_participants(&mut self, indices: &[usize]) -> Result<MetricRecord, EvaluationError> {
        let set = self.shared.state.eval_set;
        let participants = &self.shared.participants;
        let model = &mut self.shared.model;
        model
            .set_params(&self.shared.global)
            .map_err(EvaluationError::Params)?;

        let mut record = MetricRecord::new();
        for participant in indices.iter().filter_map(|index| participants.get(*index)) {
            let metrics = model
                .test(participant.data(set))
                .map_err(|error| EvaluationError::Model {
                    id: participant.id().to_string(),
                    error,
                })?;
            record.insert(participant.id(), participant.num_samples() as f64, metrics);
        }
        Ok(record)
    }
}
