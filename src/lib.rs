//! dmsweep library
//!
//! Exposes the coordinator, worker loop and CLI for integration testing

pub mod bridge;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod factory;
pub mod worker;

// Re-export commonly used types for external use
pub use config::{load_config, Config, LoadedConfig, WorkerTimings};
pub use coordinator::{Coordinator, ResumeOutcome, StartOutcome};
pub use factory::{DefaultWorkerFactory, WorkerFactory};
pub use worker::{TotalEstimator, WorkerContext, WorkerExit, WorkerLoop, WorkerParts};
