use std::path::Path;

use anyhow::anyhow;
use rand::RngCore;
use serde_json::{json, Value};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::{
    metrics::MetricsWriter,
    model::{
        ClientModel,
        LocalUpdate,
        MajorityModel,
        MetricValues,
        Model,
        ModelError,
        ModelParams,
        TrainingParams,
    },
    participant::{DataSet, Participant, Partition},
    selector::RandomSelector,
    settings::RoundSchedule,
    state_machine::{
        coordinator::CoordinatorState,
        events::{EventPublisher, EventSubscriber},
        phases::{PhaseName, Shared},
    },
    storage::CheckpointStore,
};

pub fn enable_logging() {
    let _fmt_subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(true)
        .try_init();
}

pub fn coordinator_state() -> CoordinatorState {
    CoordinatorState {
        round_id: 0,
        schedule: RoundSchedule::new(10, 3, 2),
        seed: 42,
        training: TrainingParams {
            num_epochs: 1,
            batch_size: 4,
            minibatch: None,
        },
        eval_set: DataSet::Test,
        test_all: false,
        dataset: "synthetic".to_string(),
        model: "majority".to_string(),
    }
}

fn partition(labels: &[u64]) -> Partition {
    Partition {
        x: (0..labels.len()).map(|i| json!([i, i + 1])).collect(),
        y: labels.iter().map(|label| Value::from(*label)).collect(),
    }
}

/// Creates `n` participants `p00, p01, ...` in two groups with 8 training and 4 test samples.
///
/// Class `1` is the majority of every participant.
pub fn participants(n: usize) -> Vec<Participant> {
    (0..n)
        .map(|i| {
            let other = (i % 3 + 2) as u64;
            Participant::new(
                format!("p{:02}", i),
                Some(format!("g{}", i % 2)),
                partition(&[1, 1, 1, 1, 1, other, other, 0]),
                partition(&[1, 1, other, 1]),
            )
        })
        .collect()
}

/// A majority classifier with five classes.
pub fn model() -> Box<dyn ClientModel> {
    MajorityModel::boxed(
        7,
        &ModelParams {
            lr: 0.5,
            num_classes: 5,
        },
    )
}

/// A model which fails to train and to evaluate.
#[derive(Debug)]
pub struct FailingModel;

impl ClientModel for FailingModel {
    fn params(&self) -> Model {
        Model::zeros(5)
    }

    fn set_params(&mut self, _params: &Model) -> Result<(), ModelError> {
        Ok(())
    }

    fn train(
        &mut self,
        _data: &Partition,
        _params: &TrainingParams,
        _rng: &mut dyn RngCore,
    ) -> Result<LocalUpdate, ModelError> {
        Err(anyhow!("out of memory"))
    }

    fn test(&mut self, _data: &Partition) -> Result<MetricValues, ModelError> {
        Err(anyhow!("out of memory"))
    }
}

pub fn init_shared(
    coordinator_state: CoordinatorState,
    participants: Vec<Participant>,
    model: Box<dyn ClientModel>,
    dir: &Path,
) -> (Shared, EventSubscriber) {
    let (event_publisher, event_subscriber) = EventPublisher::init(
        coordinator_state.round_id,
        PhaseName::Init,
        std::sync::Arc::new(model.params()),
    );

    let shared = Shared::new(
        coordinator_state.clone(),
        participants,
        Box::new(RandomSelector::new(coordinator_state.seed)),
        model,
        event_publisher,
        MetricsWriter::new(dir.join("metrics"), "metrics"),
        CheckpointStore::new(dir.join("checkpoints")),
    );
    (shared, event_subscriber)
}

/// Checks that two models are equal up to the precision of their JSON representation.
pub fn assert_models_close(left: &Model, right: &Model) {
    assert_eq!(left.len(), right.len());
    for (left, right) in left.iter().zip(right.iter()) {
        assert!((left - right).abs() < 1e-12, "{} != {}", left, right);
    }
}
