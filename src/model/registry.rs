//! Resolution of models by dataset and model name.

use std::{collections::HashMap, fmt};

use thiserror::Error;
use tracing::debug;

use crate::model::{majority::MajorityModel, ClientModel};

/// The hyperparameters a model is created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    /// The learning rate.
    pub lr: f64,
    /// The number of classes.
    pub num_classes: usize,
}

/// Creates a model from a seed and its hyperparameters.
pub type ModelFactory = fn(u64, &ModelParams) -> Box<dyn ClientModel>;

/// Errors which can occur when resolving a model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown model `{model}` for dataset `{dataset}`")]
    UnknownModel { dataset: String, model: String },
}

/// The default learning rate of the baseline.
const MAJORITY_LR: f64 = 0.1;

/// The datasets of the baseline and their number of classes.
const MAJORITY_DATASETS: [(&str, usize); 6] = [
    ("sent140", 2),
    ("femnist", 62),
    ("shakespeare", 80),
    ("celeba", 2),
    ("synthetic", 5),
    ("reddit", 10),
];

/// A registry of models by dataset and model name.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<(String, String), (ModelFactory, ModelParams)>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<_> = self.models.keys().collect();
        models.sort();
        f.debug_struct("ModelRegistry")
            .field("models", &models)
            .finish()
    }
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the `majority` baseline for every known dataset.
    pub fn with_defaults() -> Self {
        MAJORITY_DATASETS
            .iter()
            .fold(Self::new(), |registry, (dataset, num_classes)| {
                registry.register(
                    *dataset,
                    "majority",
                    MajorityModel::boxed,
                    ModelParams {
                        lr: MAJORITY_LR,
                        num_classes: *num_classes,
                    },
                )
            })
    }

    /// Registers a model, replacing any model of the same name.
    pub fn register(
        mut self,
        dataset: impl Into<String>,
        model: impl Into<String>,
        factory: ModelFactory,
        params: ModelParams,
    ) -> Self {
        self.models
            .insert((dataset.into(), model.into()), (factory, params));
        self
    }

    /// Checks whether a model is registered.
    pub fn contains(&self, dataset: &str, model: &str) -> bool {
        self.models
            .contains_key(&(dataset.to_string(), model.to_string()))
    }

    /// Creates a model, optionally overriding its default learning rate.
    ///
    /// # Errors
    /// Fails if no such model is registered.
    pub fn resolve(
        &self,
        dataset: &str,
        model: &str,
        seed: u64,
        lr: Option<f64>,
    ) -> Result<Box<dyn ClientModel>, RegistryError> {
        let (factory, params) = self
            .models
            .get(&(dataset.to_string(), model.to_string()))
            .ok_or_else(|| RegistryError::UnknownModel {
                dataset: dataset.to_string(),
                model: model.to_string(),
            })?;

        let params = ModelParams {
            lr: lr.unwrap_or(params.lr),
            ..*params
        };
        debug!("creating {}.{} with {:?}", dataset, model, params);
        Ok(factory(seed, &params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let registry = ModelRegistry::with_defaults();
        let model = registry.resolve("femnist", "majority", 0, None).unwrap();
        assert_eq!(model.params().len(), 62);

        let model = registry.resolve("shakespeare", "majority", 0, Some(0.8)).unwrap();
        assert_eq!(model.params().len(), 80);
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::with_defaults();
        assert!(!registry.contains("femnist", "cnn"));
        assert_eq!(
            registry.resolve("femnist", "cnn", 0, None).err(),
            Some(RegistryError::UnknownModel {
                dataset: "femnist".to_string(),
                model: "cnn".to_string(),
            })
        );
        assert!(ModelRegistry::new()
            .resolve("femnist", "majority", 0, None)
            .is_err());
    }

    #[test]
    fn test_register_custom_model() {
        fn tiny(seed: u64, params: &ModelParams) -> Box<dyn ClientModel> {
            MajorityModel::boxed(seed, &ModelParams {
                num_classes: 3,
                ..*params
            })
        }

        let registry = ModelRegistry::new().register(
            "custom",
            "tiny",
            tiny,
            ModelParams {
                lr: 0.5,
                num_classes: 7,
            },
        );
        assert!(registry.contains("custom", "tiny"));
        let model = registry.resolve("custom", "tiny", 3, None).unwrap();
        assert_eq!(model.params().len(), 3);
    }
}
