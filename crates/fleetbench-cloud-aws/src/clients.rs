//! Shared SDK configuration and clients

use crate::{AutoScalingMembership, CloudFormationService, SsmParameterStore};
use aws_config::{BehaviorVersion, Region};
use fleetbench_cloud::CloudCapabilities;
use std::sync::Arc;

/// One client per service, built from a single shared SDK config
#[derive(Clone, Debug)]
pub struct AwsClients {
    pub cloudformation: aws_sdk_cloudformation::Client,
    pub autoscaling: aws_sdk_autoscaling::Client,
    pub ssm: aws_sdk_ssm::Client,
}

impl AwsClients {
    /// Load the SDK config from the environment
    ///
    /// `region` overrides the region found by the default provider chain.
    pub async fn load(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let shared = loader.load().await;

        tracing::debug!(
            region = shared.region().map(|r| r.as_ref()).unwrap_or("<unset>"),
            "Loaded AWS config"
        );

        Self {
            cloudformation: aws_sdk_cloudformation::Client::new(&shared),
            autoscaling: aws_sdk_autoscaling::Client::new(&shared),
            ssm: aws_sdk_ssm::Client::new(&shared),
        }
    }

    /// Capabilities backed by these clients, sleeping on the tokio timer
    pub fn capabilities(&self) -> CloudCapabilities {
        CloudCapabilities::new(
            Arc::new(CloudFormationService::new(self.cloudformation.clone())),
            Arc::new(AutoScalingMembership::new(self.autoscaling.clone())),
            Arc::new(SsmParameterStore::new(self.ssm.clone())),
        )
    }
}
