//! Stack lifecycle controller
//!
//! Drives one provisioning request through submit → poll → terminal and
//! deprovisions it afterwards.

use crate::cleanup::{CleanupFailure, CleanupResource};
use crate::error::{CloudError, Result};
use crate::model::{ProvisioningRequest, STATUS_DELETE_COMPLETE, StackDescriptor};
use crate::provider::ProvisioningService;
use crate::retry::{RetryConfig, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

/// Default wait between status polls
pub const DEFAULT_STACK_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of status polls (about eight minutes at the default interval)
pub const DEFAULT_STACK_POLL_ATTEMPTS: u32 = 100;

pub struct StackLifecycleController {
    provisioning: Arc<dyn ProvisioningService>,
    retry: RetryPolicy,
    poll: RetryConfig,
    deletion: RetryConfig,
}

impl StackLifecycleController {
    pub fn new(
        provisioning: Arc<dyn ProvisioningService>,
        retry: RetryPolicy,
        poll: RetryConfig,
        deletion: RetryConfig,
    ) -> Self {
        Self {
            provisioning,
            retry,
            poll,
            deletion,
        }
    }

    /// Send the creation call exactly once
    ///
    /// Never retried: a second submission would create a conflicting stack.
    /// Only [`CloudError::ProvisioningRejected`] means nothing was created;
    /// any other error leaves the outcome of the call unknown.
    pub async fn submit(&self, request: &ProvisioningRequest) -> Result<()> {
        tracing::info!(stack = %request.name, "Submitting stack");
        self.provisioning.create(request).await.inspect_err(|err| {
            tracing::warn!(stack = %request.name, "Stack submission failed: {}", err);
        })
    }

    /// Fetch the current descriptor once
    ///
    /// A stack the provider no longer knows about is reported with status
    /// `DELETE_COMPLETE`, which maps to FAILED.
    pub async fn describe(&self, name: &str) -> Result<StackDescriptor> {
        match self.provisioning.describe(name).await {
            Err(err) if err.is_not_found() => Ok(StackDescriptor::new(name, STATUS_DELETE_COMPLETE)),
            other => other,
        }
    }

    /// Poll until the stack reaches a terminal state
    ///
    /// Both COMPLETE and FAILED descriptors are returned; the caller decides
    /// whether FAILED is fatal.
    pub async fn await_completion(&self, name: &str) -> Result<StackDescriptor> {
        let config = self.poll.for_subject(name);

        let descriptor = self
            .retry
            .execute(&config, || async move {
                let descriptor = self.describe(name).await?;

                if descriptor.state().is_terminal() {
                    return Ok(descriptor);
                }
                tracing::debug!(stack = %name, status = %descriptor.status, "Stack not yet terminal");
                Err(CloudError::StackNotComplete {
                    name: name.to_string(),
                    status: descriptor.status,
                })
            })
            .await?;

        tracing::info!(
            stack = %name,
            status = %descriptor.status,
            state = %descriptor.state(),
            "Stack reached a terminal state"
        );
        Ok(descriptor)
    }

    /// Submit the request and wait for it to settle
    pub async fn create(&self, request: &ProvisioningRequest) -> Result<StackDescriptor> {
        self.submit(request).await?;
        self.await_completion(&request.name).await
    }

    /// Best-effort deletion of the stack
    ///
    /// The delete call is retried under the deletion config; a final failure
    /// is logged and handed back, never raised.
    pub async fn teardown(&self, name: &str) -> std::result::Result<(), CleanupFailure> {
        let resource = CleanupResource::Stack(name.to_string());
        let config = self.deletion.for_subject(&resource);

        match self
            .retry
            .execute(&config, || self.provisioning.delete(name))
            .await
        {
            Ok(()) => {
                tracing::info!(stack = %name, "Stack deletion requested");
                Ok(())
            }
            Err(err) => {
                let failure = CleanupFailure::new(resource, &err);
                tracing::warn!("{}", failure);
                Err(failure)
            }
        }
    }
}
