//! Capability traits the lifecycle controller talks to
//!
//! Every remote service is reached through one of these narrow traits and
//! injected as `Arc<dyn ...>`, so a run can be driven against the real cloud
//! bindings or against the in-memory fakes in [`crate::testing`].

use crate::error::Result;
use crate::model::{ProvisioningRequest, StackDescriptor, WorkerId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Declarative provisioning service (e.g. CloudFormation)
#[async_trait]
pub trait ProvisioningService: Send + Sync {
    /// Submit a creation request
    ///
    /// Synchronous rejection by the service is reported as
    /// [`CloudError::ProvisioningRejected`](crate::CloudError::ProvisioningRejected).
    async fn create(&self, request: &ProvisioningRequest) -> Result<()>;

    /// Fetch the current status and outputs of a request
    async fn describe(&self, name: &str) -> Result<StackDescriptor>;

    /// Request deletion of everything the request created
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Membership of a worker group (e.g. an Auto Scaling group)
#[async_trait]
pub trait GroupMembership: Send + Sync {
    async fn list_members(&self, group: &str) -> Result<Vec<WorkerId>>;
}

/// Shared key-value store workers publish their results to
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value; a missing key is [`CloudError::NotFound`](crate::CloudError::NotFound)
    async fn get(&self, key: &str) -> Result<String>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Suspends the current task between retry attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// The set of remote capabilities one run needs
#[derive(Clone)]
pub struct CloudCapabilities {
    pub provisioning: Arc<dyn ProvisioningService>,
    pub membership: Arc<dyn GroupMembership>,
    pub store: Arc<dyn KeyValueStore>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl CloudCapabilities {
    pub fn new(
        provisioning: Arc<dyn ProvisioningService>,
        membership: Arc<dyn GroupMembership>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            provisioning,
            membership,
            store,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper used between retry attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }
}
