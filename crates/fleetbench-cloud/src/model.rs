//! Data model shared by every lifecycle component

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Separator between the fields of an encoded [`WorkerResult`]
pub const RESULT_DELIMITER: char = ',';

/// Status string reported by the provider once creation succeeded
pub const STATUS_CREATE_COMPLETE: &str = "CREATE_COMPLETE";

/// Status reported for a stack the provider no longer knows about
pub const STATUS_DELETE_COMPLETE: &str = "DELETE_COMPLETE";

/// Opaque handle of one worker instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the worker publishes its result
    pub fn result_key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for WorkerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Measurements reported by a single worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResult {
    pub creation_time_ms: u64,
    pub copy_time_ms: u64,
    pub deletion_time_ms: u64,
}

impl WorkerResult {
    pub fn new(creation_time_ms: u64, copy_time_ms: u64, deletion_time_ms: u64) -> Self {
        Self {
            creation_time_ms,
            copy_time_ms,
            deletion_time_ms,
        }
    }

    /// Encode as the comma-joined triple workers write to the store
    pub fn encode(&self) -> String {
        format!(
            "{}{d}{}{d}{}",
            self.creation_time_ms,
            self.copy_time_ms,
            self.deletion_time_ms,
            d = RESULT_DELIMITER
        )
    }

    /// Parse the raw value a worker stored under its key
    ///
    /// Exactly three non-negative decimal fields are accepted, in the order
    /// creation, copy, deletion. Whitespace around a field is ignored.
    pub fn parse(worker_id: &WorkerId, raw: &str) -> Result<Self> {
        let malformed = || CloudError::MalformedResult {
            worker_id: worker_id.to_string(),
            value: raw.to_string(),
        };

        let fields = raw
            .split(RESULT_DELIMITER)
            .map(|field| field.trim().parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| malformed())?;

        match fields.as_slice() {
            [creation, copy, deletion] => Ok(Self::new(*creation, *copy, *deletion)),
            _ => Err(malformed()),
        }
    }
}

/// Results of one run, index-aligned with the worker resolution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunResult(Vec<WorkerResult>);

impl RunResult {
    pub fn new(results: Vec<WorkerResult>) -> Self {
        Self(results)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerResult> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<WorkerResult> {
        self.0
    }
}

impl std::ops::Index<usize> for RunResult {
    type Output = WorkerResult;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Value of a template parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Integer(i64),
    Text(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Integer(v) => write!(f, "{}", v),
            ParameterValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        ParameterValue::Text(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Integer(v)
    }
}

impl From<u32> for ParameterValue {
    fn from(v: u32) -> Self {
        ParameterValue::Integer(i64::from(v))
    }
}

/// A named request to create a group of workers from a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    /// Unique name; the only identity of the request after submission
    pub name: String,

    /// Template body, passed to the provider untouched
    pub template_body: String,

    /// Template parameters
    pub parameters: BTreeMap<String, ParameterValue>,

    /// Elevated-privilege grants the template requires
    pub capabilities: BTreeSet<String>,
}

impl ProvisioningRequest {
    pub fn new(name: impl Into<String>, template_body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template_body: template_body.into(),
            parameters: BTreeMap::new(),
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }
}

/// Lifecycle state derived from a provider status string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningState {
    InProgress,
    Complete,
    Failed,
}

impl ProvisioningState {
    /// Map a provider status string to a lifecycle state
    pub fn from_status(status: &str) -> Self {
        if status == STATUS_CREATE_COMPLETE {
            ProvisioningState::Complete
        } else if status.ends_with("_FAILED")
            || status.contains("ROLLBACK")
            || status.starts_with("DELETE_")
        {
            ProvisioningState::Failed
        } else {
            ProvisioningState::InProgress
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProvisioningState::InProgress)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningState::InProgress => write!(f, "in-progress"),
            ProvisioningState::Complete => write!(f, "complete"),
            ProvisioningState::Failed => write!(f, "failed"),
        }
    }
}

/// Provider view of a provisioning request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescriptor {
    pub name: String,

    /// Raw provider status
    pub status: String,

    /// Provider explanation of the status, if any
    pub status_reason: Option<String>,

    /// Resolved template outputs
    pub outputs: HashMap<String, String>,
}

impl StackDescriptor {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            status_reason: None,
            outputs: HashMap::new(),
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    pub fn state(&self) -> ProvisioningState {
        ProvisioningState::from_status(&self.status)
    }

    pub fn has_failed(&self) -> bool {
        self.state() == ProvisioningState::Failed
    }

    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }
}
