//! SSM Parameter Store as the shared result store

use crate::error::AwsError;
use async_trait::async_trait;
use aws_sdk_ssm::Client;
use fleetbench_cloud::{KeyValueStore, Result};

pub struct SsmParameterStore {
    client: Client,
}

impl SsmParameterStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyValueStore for SsmParameterStore {
    async fn get(&self, key: &str) -> Result<String> {
        let output = self
            .client
            .get_parameter()
            .name(key)
            .with_decryption(false)
            .send()
            .await
            .map_err(|err| {
                let wrapped = AwsError::sdk("GetParameter", &err);
                if err.into_service_error().is_parameter_not_found() {
                    AwsError::ParameterNotFound(key.to_string())
                } else {
                    wrapped
                }
            })?;

        let value = output
            .parameter()
            .and_then(|parameter| parameter.value())
            .ok_or(AwsError::MissingField("Parameter.Value"))?;
        Ok(value.to_string())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_parameter()
            .name(key)
            .send()
            .await
            .map_err(|err| {
                let wrapped = AwsError::sdk("DeleteParameter", &err);
                if err.into_service_error().is_parameter_not_found() {
                    AwsError::ParameterNotFound(key.to_string())
                } else {
                    wrapped
                }
            })?;
        tracing::debug!(parameter = key, "Deleted parameter");
        Ok(())
    }
}
