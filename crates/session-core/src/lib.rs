//! Core types for the astro session correlation engine.
//!
//! Defines the normalized time representation, the record shapes handed over
//! by the log adapters, timestamp normalization, run configuration and the
//! guiding-statistics math shared by the data pipeline.

pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod stats;
pub mod timevalue;

pub use error::{Result, SessionError};
pub use timevalue::{TimePrecision, TimeValue};
