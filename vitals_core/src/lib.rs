#![forbid(unsafe_code)]

//! Core domain model and business logic for the Vitals health tracker.
//!
//! This crate provides:
//! - Domain types (timestamped values, sleep sessions, biometrics, advisories)
//! - Time-bucketed aggregation for trend charts
//! - Health snapshot derivation
//! - Rule-based advisory engine
//! - Staged, cancellable advisory delivery
//! - Crash-recoverable sleep timer
//! - Persistence collaborators (event store, profile state, CSV export)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod bucket;
pub mod snapshot;
pub mod rules;
pub mod engine;
pub mod delivery;
pub mod sleep_timer;
pub mod store;
pub mod state;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use bucket::{bucketize, sum_for_day};
pub use snapshot::build_snapshot;
pub use engine::{evaluate, AdvisoryEngine};
pub use delivery::{DeliveryEvent, DeliveryScheduler, DeliveryState, DeliveryTiming, DeliveryToken};
pub use sleep_timer::SleepTimer;
pub use store::{EventStore, ValueCategory};
pub use state::ProfileState;
