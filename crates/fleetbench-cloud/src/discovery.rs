//! Worker discovery
//!
//! Resolves the workers a completed stack launched, via the group handle the
//! template exposes as an output.

use crate::error::{CloudError, Result};
use crate::model::{ProvisioningState, StackDescriptor, WorkerId};
use crate::provider::GroupMembership;
use std::sync::Arc;

/// Output key under which the worker template exposes its group name
pub const DEFAULT_GROUP_OUTPUT_KEY: &str = "ChildASGName";

pub struct WorkerDiscovery {
    membership: Arc<dyn GroupMembership>,
    output_key: String,
    expected_workers: Option<usize>,
}

impl WorkerDiscovery {
    pub fn new(membership: Arc<dyn GroupMembership>) -> Self {
        Self {
            membership,
            output_key: DEFAULT_GROUP_OUTPUT_KEY.to_string(),
            expected_workers: None,
        }
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    /// Require the group to report exactly `count` members
    pub fn with_expected_workers(mut self, count: usize) -> Self {
        self.expected_workers = Some(count);
        self
    }

    /// Name of the worker group a completed stack exposes
    pub fn group_name<'a>(&self, stack: &'a StackDescriptor) -> Result<&'a str> {
        stack
            .output(&self.output_key)
            .ok_or_else(|| CloudError::OutputNotFound {
                stack: stack.name.clone(),
                key: self.output_key.clone(),
            })
    }

    /// Resolve the workers of a COMPLETE stack
    ///
    /// The member listing is a single call: it runs right after the stack
    /// was confirmed complete.
    pub async fn resolve(&self, stack: &StackDescriptor) -> Result<Vec<WorkerId>> {
        if stack.state() != ProvisioningState::Complete {
            return Err(CloudError::StackNotComplete {
                name: stack.name.clone(),
                status: stack.status.clone(),
            });
        }

        let group = self.group_name(stack)?;
        let workers = self.membership.list_members(group).await?;

        if let Some(expected) = self.expected_workers {
            if workers.len() != expected {
                return Err(CloudError::WorkerCountMismatch { expected, workers });
            }
        }

        tracing::info!(stack = %stack.name, group, count = workers.len(), "Resolved workers");
        Ok(workers)
    }
}
