//! CloudFormation-backed provisioning

use crate::error::AwsError;
use async_trait::async_trait;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::{Capability, OnFailure, Parameter, Stack};
use fleetbench_cloud::{CloudError, ProvisioningRequest, ProvisioningService, Result, StackDescriptor};

pub struct CloudFormationService {
    client: Client,
}

impl CloudFormationService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// CreateStack error codes after which no stack exists
const REJECTION_CODES: [&str; 5] = [
    "ValidationError",
    "AlreadyExistsException",
    "InsufficientCapabilitiesException",
    "LimitExceededException",
    "TokenAlreadyExistsException",
];

fn is_rejection(code: Option<&str>) -> bool {
    code.is_some_and(|code| REJECTION_CODES.contains(&code))
}

/// DescribeStacks reports an unknown stack as a validation error
fn is_missing_stack(message: &str) -> bool {
    message.contains("does not exist")
}

fn descriptor_from_stack(name: &str, stack: &Stack) -> std::result::Result<StackDescriptor, AwsError> {
    let status = stack
        .stack_status()
        .ok_or(AwsError::MissingField("StackStatus"))?;

    let mut descriptor = StackDescriptor::new(name, status.as_str());
    descriptor.status_reason = stack.stack_status_reason().map(str::to_string);
    for output in stack.outputs() {
        if let (Some(key), Some(value)) = (output.output_key(), output.output_value()) {
            descriptor.outputs.insert(key.to_string(), value.to_string());
        }
    }
    Ok(descriptor)
}

#[async_trait]
impl ProvisioningService for CloudFormationService {
    async fn create(&self, request: &ProvisioningRequest) -> Result<()> {
        let mut call = self
            .client
            .create_stack()
            .stack_name(&request.name)
            .template_body(&request.template_body)
            // a stack that fails to create is deleted by CloudFormation itself
            .on_failure(OnFailure::Delete);

        for (key, value) in &request.parameters {
            call = call.parameters(
                Parameter::builder()
                    .parameter_key(key)
                    .parameter_value(value.to_string())
                    .build(),
            );
        }
        for capability in &request.capabilities {
            call = call.capabilities(Capability::from(capability.as_str()));
        }

        // throttling, timeouts and dispatch failures stay ApiErrors: the stack may exist
        let output = call.send().await.map_err(|err| {
            let wrapped = AwsError::sdk("CreateStack", &err);
            if is_rejection(err.as_service_error().and_then(|service| service.code())) {
                CloudError::ProvisioningRejected {
                    name: request.name.clone(),
                    reason: wrapped.to_string(),
                }
            } else {
                CloudError::from(wrapped)
            }
        })?;

        tracing::debug!(
            stack = %request.name,
            stack_id = output.stack_id().unwrap_or("-"),
            "CreateStack accepted"
        );
        Ok(())
    }

    async fn describe(&self, name: &str) -> Result<StackDescriptor> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(name)
            .send()
            .await
            .map_err(|err| {
                let err = AwsError::sdk("DescribeStacks", &err);
                if is_missing_stack(&err.to_string()) {
                    AwsError::StackNotFound(name.to_string())
                } else {
                    err
                }
            })?;

        let stack = output
            .stacks()
            .first()
            .ok_or_else(|| AwsError::StackNotFound(name.to_string()))?;

        Ok(descriptor_from_stack(name, stack)?)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(|err| AwsError::sdk("DeleteStack", &err))?;
        Ok(())
    }
}
