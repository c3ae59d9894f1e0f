//! Auto Scaling group membership

use crate::error::AwsError;
use async_trait::async_trait;
use aws_sdk_autoscaling::Client;
use aws_sdk_autoscaling::types::AutoScalingGroup;
use fleetbench_cloud::{GroupMembership, Result, WorkerId};

pub struct AutoScalingMembership {
    client: Client,
}

impl AutoScalingMembership {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn members_of(group: &AutoScalingGroup) -> Vec<WorkerId> {
    group
        .instances()
        .iter()
        .map(|instance| WorkerId::new(instance.instance_id()))
        .collect()
}

#[async_trait]
impl GroupMembership for AutoScalingMembership {
    async fn list_members(&self, group: &str) -> Result<Vec<WorkerId>> {
        let output = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(group)
            .send()
            .await
            .map_err(|err| AwsError::sdk("DescribeAutoScalingGroups", &err))?;

        let found = output
            .auto_scaling_groups()
            .first()
            .ok_or_else(|| AwsError::GroupNotFound(group.to_string()))?;

        let members = members_of(found);
        tracing::debug!(group, count = members.len(), "Listed group members");
        Ok(members)
    }
}
