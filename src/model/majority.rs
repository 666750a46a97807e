//! A framework-free baseline model which predicts the most frequent label.

use anyhow::{anyhow, ensure};
use rand::{
    seq::{index, SliceRandom},
    Rng,
    RngCore,
    SeedableRng,
};
use rand_chacha::ChaCha20Rng;
use serde_json::Value;

use crate::{
    model::{
        ClientModel,
        LocalUpdate,
        MetricValues,
        Model,
        ModelError,
        ModelParams,
        TrainingParams,
        ACCURACY_KEY,
    },
    participant::Partition,
};

/// The character vocabulary of the next-character prediction datasets.
pub const LETTERS: &str =
    "\n !\"&'(),-.0123456789:;>?ABCDEFGHIJKLMNOPQRSTUVWXYZ[]abcdefghijklmnopqrstuvwxyz}";

/// The smallest probability used for the loss.
const MIN_PROB: f64 = 1e-12;

/// A model which keeps a score per class and always predicts the best scored class.
///
/// Every batch moves the scores towards the label distribution of the batch by the learning
/// rate, hence the scores stay a probability distribution.
#[derive(Debug, Clone)]
pub struct MajorityModel {
    scores: Vec<f64>,
    lr: f64,
}

impl MajorityModel {
    /// Creates a model with uniform scores plus a small seeded jitter.
    pub fn new(seed: u64, params: &ModelParams) -> Self {
        let num_classes = params.num_classes.max(1);
        let uniform = 1. / num_classes as f64;
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let scores = (0..num_classes)
            .map(|_| uniform * (1. + rng.gen_range(-0.01..0.01)))
            .collect();
        Self {
            scores,
            lr: params.lr,
        }
    }

    /// Creates a boxed model, see [`ModelFactory`](crate::model::ModelFactory).
    pub fn boxed(seed: u64, params: &ModelParams) -> Box<dyn ClientModel> {
        Box::new(Self::new(seed, params))
    }

    pub fn num_classes(&self) -> usize {
        self.scores.len()
    }

    /// Gets the class with the highest score, the first one on ties.
    pub fn predict(&self) -> usize {
        self.scores
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(best, max), (class, score)| {
                if *score > max {
                    (class, *score)
                } else {
                    (best, max)
                }
            })
            .0
    }

    /// Maps a raw label to its class.
    ///
    /// Labels are either class indices or single characters of the [`LETTERS`].
    pub fn label_index(&self, label: &Value) -> Option<usize> {
        let class = match label {
            Value::Number(number) => match number.as_u64() {
                Some(class) => class as usize,
                None => {
                    let class = number.as_f64()?;
                    if class < 0. || class.fract() != 0. {
                        return None;
                    }
                    class as usize
                }
            },
            Value::Bool(label) => *label as usize,
            Value::String(label) => {
                let mut chars = label.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => LETTERS.find(c)?,
                    _ => return None,
                }
            }
            _ => return None,
        };
        Some(class).filter(|class| *class < self.num_classes())
    }

    fn step(&mut self, data: &Partition, batch: &[usize]) {
        let mut histogram = vec![0.; self.num_classes()];
        let mut count = 0;
        for class in batch.iter().filter_map(|i| self.label_index(&data.y[*i])) {
            histogram[class] += 1.;
            count += 1;
        }
        if count == 0 {
            return;
        }

        for (score, frequency) in self.scores.iter_mut().zip(histogram) {
            *score += self.lr * (frequency / count as f64 - *score);
        }
    }
}

impl ClientModel for MajorityModel {
    fn params(&self) -> Model {
        self.scores.clone().into()
    }

    fn set_params(&mut self, params: &Model) -> Result<(), ModelError> {
        ensure!(
            params.len() == self.num_classes(),
            "expected {} parameters, got {}",
            self.num_classes(),
            params.len()
        );
        self.scores.clear();
        self.scores.extend(params.iter());
        Ok(())
    }

    fn train(
        &mut self,
        data: &Partition,
        params: &TrainingParams,
        rng: &mut dyn RngCore,
    ) -> Result<LocalUpdate, ModelError> {
        let len = data.len();
        let batch_size = params.batch_size.max(1);
        let passes: Vec<Vec<usize>> = match params.minibatch_len(len) {
            Some(amount) => vec![index::sample(rng, len, amount.min(len)).into_vec()],
            None => (0..params.num_epochs)
                .map(|_| {
                    let mut indices: Vec<usize> = (0..len).collect();
                    indices.shuffle(rng);
                    indices
                })
                .collect(),
        };

        let mut computations = 0;
        for pass in passes.iter() {
            for batch in pass.chunks(batch_size) {
                self.step(data, batch);
                computations += (batch.len() * self.num_classes()) as u64;
            }
        }

        let num_samples = passes.first().map_or(0, Vec::len);
        Ok(LocalUpdate {
            num_samples,
            computations,
            model: self.params(),
        })
    }

    fn test(&mut self, data: &Partition) -> Result<MetricValues, ModelError> {
        let len = data.len();
        let prediction = self.predict();
        let total = self.scores.iter().sum::<f64>();
        if total <= 0. {
            return Err(anyhow!("the scores don't form a distribution"));
        }

        let mut correct = 0;
        let mut loss = 0.;
        for label in data.y.iter().take(len) {
            let class = self.label_index(label);
            if class == Some(prediction) {
                correct += 1;
            }
            let prob = class.map_or(MIN_PROB, |class| self.scores[class] / total);
            loss -= prob.max(MIN_PROB).ln();
        }

        let (accuracy, loss) = if len == 0 {
            (0., 0.)
        } else {
            (correct as f64 / len as f64, loss / len as f64)
        };
        Ok(vec![
            (ACCURACY_KEY.to_string(), accuracy),
            ("loss".to_string(), loss),
        ]
        .into_iter()
        .collect())
    }
}
