//! Data access for the measurement store.

pub mod measurement_service;

pub use measurement_service::*;
