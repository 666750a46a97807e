//! Loading of participant data and persistence of models.

pub mod checkpoint;
pub mod leaf;

pub use self::{
    checkpoint::{CheckpointError, CheckpointStore},
    leaf::{load_participants, DataError},
};
