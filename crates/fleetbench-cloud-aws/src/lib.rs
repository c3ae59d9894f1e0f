//! AWS bindings for FleetBench
//!
//! Implements the capability traits of `fleetbench-cloud` on top of the AWS
//! SDK:
//!
//! - [`CloudFormationService`]: `ProvisioningService` (CreateStack / DescribeStacks / DeleteStack)
//! - [`AutoScalingMembership`]: `GroupMembership` (DescribeAutoScalingGroups)
//! - [`SsmParameterStore`]: `KeyValueStore` (GetParameter / DeleteParameter)
//!
//! # Requirements
//!
//! - Credentials are resolved through the default AWS provider chain
//!   (environment, profile, instance metadata)
//!
//! # Example
//!
//! ```ignore
//! use fleetbench_cloud::{LifecycleSettings, Orchestrator};
//! use fleetbench_cloud_aws::AwsClients;
//!
//! let clients = AwsClients::load(Some("eu-west-1")).await;
//! let orchestrator = Orchestrator::new(clients.capabilities(), LifecycleSettings::default());
//! ```

pub mod autoscaling;
pub mod clients;
pub mod cloudformation;
pub mod error;
pub mod ssm;

pub use autoscaling::AutoScalingMembership;
pub use clients::AwsClients;
pub use cloudformation::CloudFormationService;
pub use error::{AwsError, Result};
pub use ssm::SsmParameterStore;
