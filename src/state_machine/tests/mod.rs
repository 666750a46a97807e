//! State machine test utilities.

pub mod builder;
pub mod impls;
pub mod utils;
