//! In-memory implementations of the capability traits
//!
//! Used by the unit and integration tests; enabled outside this crate with
//! the `test-utils` feature.

use crate::error::{CloudError, Result};
use crate::model::{ProvisioningRequest, StackDescriptor, STATUS_CREATE_COMPLETE, WorkerId};
use crate::provider::{CloudCapabilities, GroupMembership, KeyValueStore, ProvisioningService, Sleeper};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct StackEntry {
    pending_statuses: VecDeque<String>,
}

#[derive(Debug, Default)]
struct ProvisioningInner {
    stacks: HashMap<String, StackEntry>,
    scripts: HashMap<String, Vec<String>>,
    outputs: HashMap<String, String>,
    rejection: Option<String>,
    lost_response: Option<String>,
    failing_deletes: u32,
    created: Vec<ProvisioningRequest>,
    describe_calls: u32,
    delete_calls: Vec<String>,
}

/// Provisioning service that keeps stacks in memory
///
/// A created stack walks through its scripted statuses, one per `describe`,
/// and then stays on the last one. Without a script it is `CREATE_COMPLETE`
/// immediately.
#[derive(Debug, Default)]
pub struct InMemoryProvisioning {
    inner: Mutex<ProvisioningInner>,
}

impl InMemoryProvisioning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses reported by successive `describe` calls for `name`
    pub fn script_statuses(&self, name: &str, statuses: &[&str]) {
        lock(&self.inner).scripts.insert(
            name.to_string(),
            statuses.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Output attached to every stack created from now on
    pub fn set_output(&self, key: &str, value: &str) {
        lock(&self.inner)
            .outputs
            .insert(key.to_string(), value.to_string());
    }

    /// Reject every subsequent `create` with `reason`
    pub fn reject_with(&self, reason: &str) {
        lock(&self.inner).rejection = Some(reason.to_string());
    }

    /// Accept every subsequent `create`, then report `message` as an API error
    pub fn fail_creates_after_accepting(&self, message: &str) {
        lock(&self.inner).lost_response = Some(message.to_string());
    }

    /// Fail the next `count` delete calls
    pub fn fail_deletes(&self, count: u32) {
        lock(&self.inner).failing_deletes = count;
    }

    pub fn created(&self) -> Vec<ProvisioningRequest> {
        lock(&self.inner).created.clone()
    }

    pub fn create_calls(&self) -> usize {
        lock(&self.inner).created.len()
    }

    pub fn describe_calls(&self) -> u32 {
        lock(&self.inner).describe_calls
    }

    pub fn delete_calls(&self) -> Vec<String> {
        lock(&self.inner).delete_calls.clone()
    }

    /// Whether a live stack named `name` exists
    pub fn exists(&self, name: &str) -> bool {
        lock(&self.inner).stacks.contains_key(name)
    }
}

#[async_trait]
impl ProvisioningService for InMemoryProvisioning {
    async fn create(&self, request: &ProvisioningRequest) -> Result<()> {
        let mut inner = lock(&self.inner);
        if let Some(reason) = inner.rejection.clone() {
            return Err(CloudError::ProvisioningRejected {
                name: request.name.clone(),
                reason,
            });
        }
        if inner.stacks.contains_key(&request.name) {
            return Err(CloudError::ProvisioningRejected {
                name: request.name.clone(),
                reason: "stack already exists".to_string(),
            });
        }

        let statuses: VecDeque<String> = inner
            .scripts
            .get(&request.name)
            .cloned()
            .unwrap_or_else(|| vec![STATUS_CREATE_COMPLETE.to_string()])
            .into();
        let entry = StackEntry {
            pending_statuses: statuses,
        };
        inner.stacks.insert(request.name.clone(), entry);
        inner.created.push(request.clone());
        match inner.lost_response.clone() {
            Some(message) => Err(CloudError::ApiError(message)),
            None => Ok(()),
        }
    }

    async fn describe(&self, name: &str) -> Result<StackDescriptor> {
        let mut inner = lock(&self.inner);
        inner.describe_calls += 1;
        let outputs = inner.outputs.clone();
        let entry = inner
            .stacks
            .get_mut(name)
            .ok_or_else(|| CloudError::NotFound(format!("stack {}", name)))?;

        let status = if entry.pending_statuses.len() > 1 {
            entry.pending_statuses.pop_front()
        } else {
            entry.pending_statuses.front().cloned()
        }
        .ok_or_else(|| CloudError::ApiError(format!("stack {} has no status", name)))?;

        let mut descriptor = StackDescriptor::new(name, status);
        descriptor.outputs = outputs;
        Ok(descriptor)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner.delete_calls.push(name.to_string());
        if inner.failing_deletes > 0 {
            inner.failing_deletes -= 1;
            return Err(CloudError::ApiError(format!("delete of {} throttled", name)));
        }
        inner.stacks.remove(name);
        Ok(())
    }
}

/// Worker groups kept in memory
#[derive(Debug, Default)]
pub struct InMemoryGroups {
    groups: Mutex<HashMap<String, Vec<WorkerId>>>,
}

impl InMemoryGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_members(&self, group: &str, members: &[&str]) {
        lock(&self.groups).insert(
            group.to_string(),
            members.iter().map(|m| WorkerId::new(*m)).collect(),
        );
    }
}

#[async_trait]
impl GroupMembership for InMemoryGroups {
    async fn list_members(&self, group: &str) -> Result<Vec<WorkerId>> {
        lock(&self.groups)
            .get(group)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("group {}", group)))
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    values: HashMap<String, String>,
    /// Keys that report NotFound for this many more reads
    delayed: HashMap<String, u32>,
    failing_gets: HashSet<String>,
    /// Keys whose deletes fail for this many more attempts
    failing_deletes: HashMap<String, u32>,
    get_calls: HashMap<String, u32>,
}

/// Parameter store kept in memory
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, value: &str) {
        lock(&self.inner)
            .values
            .insert(key.to_string(), value.to_string());
    }

    /// Make `key` invisible for the next `reads` reads
    pub fn delay(&self, key: &str, reads: u32) {
        lock(&self.inner).delayed.insert(key.to_string(), reads);
    }

    /// Make every read of `key` fail
    pub fn fail_gets(&self, key: &str) {
        lock(&self.inner).failing_gets.insert(key.to_string());
    }

    /// Make every delete of `key` fail
    pub fn fail_deletes(&self, key: &str) {
        self.fail_next_deletes(key, u32::MAX);
    }

    /// Make the next `count` deletes of `key` fail
    pub fn fail_next_deletes(&self, key: &str, count: u32) {
        lock(&self.inner)
            .failing_deletes
            .insert(key.to_string(), count);
    }

    pub fn get_calls(&self, key: &str) -> u32 {
        lock(&self.inner).get_calls.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.inner).values.contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryParameterStore {
    async fn get(&self, key: &str) -> Result<String> {
        let mut inner = lock(&self.inner);
        *inner.get_calls.entry(key.to_string()).or_default() += 1;

        if inner.failing_gets.contains(key) {
            return Err(CloudError::ApiError(format!("read of {} failed", key)));
        }
        if let Some(remaining) = inner.delayed.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CloudError::NotFound(format!("parameter {}", key)));
            }
        }
        inner
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("parameter {}", key)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = lock(&self.inner);
        if let Some(remaining) = inner.failing_deletes.get_mut(key) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(CloudError::ApiError(format!("delete of {} failed", key)));
            }
        }
        inner
            .values
            .remove(key)
            .ok_or_else(|| CloudError::NotFound(format!("parameter {}", key)))?;
        Ok(())
    }
}

/// Sleeper that records requested waits and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.waits).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.waits).push(duration);
    }
}

/// Every in-memory capability, wired together
#[derive(Clone, Default)]
pub struct InMemoryCloud {
    pub provisioning: Arc<InMemoryProvisioning>,
    pub groups: Arc<InMemoryGroups>,
    pub store: Arc<InMemoryParameterStore>,
    pub sleeper: Arc<RecordingSleeper>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capabilities(&self) -> CloudCapabilities {
        CloudCapabilities::new(
            self.provisioning.clone(),
            self.groups.clone(),
            self.store.clone(),
        )
        .with_sleeper(self.sleeper.clone())
    }
}
