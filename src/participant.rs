//! Simulated participants and their data partitions.

use std::sync::Arc;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The samples of one participant for one data set.
///
/// Features and labels are kept in their raw JSON representation, it's up to the model to
/// interpret them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// The features.
    pub x: Vec<Value>,
    /// The labels.
    pub y: Vec<Value>,
}

impl Partition {
    /// Gets the number of samples.
    ///
    /// Features without a label don't count.
    pub fn len(&self) -> usize {
        self.x.len().min(self.y.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The data set a participant is evaluated or trained on.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSet {
    #[display(fmt = "train")]
    Train,
    #[display(fmt = "test")]
    Test,
    #[display(fmt = "val")]
    Val,
}

impl DataSet {
    /// Gets the held-out data set.
    pub fn eval(use_val_set: bool) -> Self {
        if use_val_set {
            Self::Val
        } else {
            Self::Test
        }
    }
}

/// A simulated participant.
///
/// The identity and the partitions never change once the participant is created. Partitions
/// are shared, cloning a participant is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    id: String,
    group: Option<String>,
    train: Arc<Partition>,
    eval: Arc<Partition>,
}

impl Participant {
    /// Creates a participant.
    pub fn new(
        id: impl Into<String>,
        group: Option<String>,
        train: Partition,
        eval: Partition,
    ) -> Self {
        Self {
            id: id.into(),
            group,
            train: Arc::new(train),
            eval: Arc::new(eval),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Gets the training partition.
    pub fn train_data(&self) -> &Partition {
        &self.train
    }

    /// Gets the held-out partition, i.e. either the test or the validation data.
    pub fn eval_data(&self) -> &Partition {
        &self.eval
    }

    /// Gets the partition of a data set.
    pub fn data(&self, set: DataSet) -> &Partition {
        match set {
            DataSet::Train => self.train_data(),
            DataSet::Test | DataSet::Val => self.eval_data(),
        }
    }

    pub fn num_train_samples(&self) -> usize {
        self.train.len()
    }

    pub fn num_eval_samples(&self) -> usize {
        self.eval.len()
    }

    /// Gets the total number of samples, which weighs the metrics of this participant.
    pub fn num_samples(&self) -> usize {
        self.num_train_samples() + self.num_eval_samples()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn partition(len: usize) -> Partition {
        Partition {
            x: (0..len).map(|i| json!([i])).collect(),
            y: (0..len).map(|i| json!(i % 2)).collect(),
        }
    }

    #[test]
    fn test_sample_counts() {
        let participant = Participant::new("f_0001", Some("writer".into()), partition(8), partition(2));
        assert_eq!(participant.id(), "f_0001");
        assert_eq!(participant.group(), Some("writer"));
        assert_eq!(participant.num_train_samples(), 8);
        assert_eq!(participant.num_eval_samples(), 2);
        assert_eq!(participant.num_samples(), 10);
        assert_eq!(participant.data(DataSet::Val).len(), 2);
    }

    #[test]
    fn test_unlabeled_features_dont_count() {
        let mut partition = partition(3);
        partition.y.pop();
        assert_eq!(partition.len(), 2);
        assert!(Partition::default().is_empty());
    }

    #[test]
    fn test_data_set_names() {
        assert_eq!(DataSet::Train.to_string(), "train");
        assert_eq!(DataSet::eval(false).to_string(), "test");
        assert_eq!(DataSet::eval(true).to_string(), "val");
        assert_eq!(serde_json::to_string(&DataSet::Val).unwrap(), r#""val""#);
    }
}
