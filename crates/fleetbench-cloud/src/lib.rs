//! FleetBench lifecycle controller
//!
//! Provisions a fleet of ephemeral workers from a declarative template, waits
//! for every worker to publish its measurements to a shared key-value store,
//! collects them and tears everything down again.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 FleetBench CLI                   │
//! │            (fleetbench run / cleanup)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               fleetbench-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │              Orchestrator                 │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌───────────┐ ┌───────────┐ ┌──────────────┐   │
//! │  │   Stack   │ │ Discovery │ │  Collector   │   │
//! │  │ Lifecycle │ │           │ │   Cleanup    │   │
//! │  └───────────┘ └───────────┘ └──────────────┘   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │     RetryPolicy  (all waits go here)      │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │  capability   │ │   in-memory   │
//! │ traits (AWS)  │ │  (test-utils) │
//! └───────────────┘ └───────────────┘
//! ```

pub mod cleanup;
pub mod collector;
pub mod discovery;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod retry;
pub mod stack;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use cleanup::{CleanupCoordinator, CleanupFailure, CleanupReport, CleanupResource};
pub use collector::{CollectedResult, FanInPolicy, PartialCollection, ResultCollector, WorkerFailure};
pub use discovery::WorkerDiscovery;
pub use error::{CloudError, Result};
pub use model::{
    ParameterValue, ProvisioningRequest, ProvisioningState, RunResult, StackDescriptor, WorkerId,
    WorkerResult,
};
pub use orchestrator::{LifecycleSettings, Orchestrator, RunObserver, RunOutcome, SilentObserver};
pub use provider::{
    CloudCapabilities, GroupMembership, KeyValueStore, ProvisioningService, Sleeper, TokioSleeper,
};
pub use retry::{AttemptLimit, RetryConfig, RetryPolicy};
pub use stack::StackLifecycleController;
