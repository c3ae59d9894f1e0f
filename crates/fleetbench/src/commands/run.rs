use crate::progress::ConsoleProgress;
use crate::render;
use chrono::{DateTime, Utc};
use colored::Colorize;
use fleetbench_cloud::{Orchestrator, ProvisioningRequest};
use fleetbench_cloud_aws::AwsClients;
use fleetbench_config::BenchConfig;
use std::path::Path;
use std::sync::Arc;

/// ワーカーテンプレートが要求する権限
const TEMPLATE_CAPABILITIES: [&str; 2] = ["CAPABILITY_IAM", "CAPABILITY_NAMED_IAM"];

pub struct RunOptions {
    pub json: bool,
    pub allow_partial: bool,
    pub instances: Option<u32>,
}

pub async fn handle(config_path: Option<&Path>, options: RunOptions) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(instances) = options.instances {
        config.child_number_of_instances = Some(instances);
    }
    if options.allow_partial {
        config.allow_partial_results = true;
    }
    config.validate()?;

    let template = fleetbench_config::template::load(&config.template_path, &config.boot_script_path)?;
    let request = build_request(&config, template, Utc::now())?;
    let expected_workers = config.child_number_of_instances.map(|n| n as usize);

    let clients = AwsClients::load(config.aws_region.as_deref()).await;
    let orchestrator = Orchestrator::new(clients.capabilities(), super::lifecycle_settings(&config))
        .with_observer(Arc::new(ConsoleProgress));

    eprintln!(
        "{}",
        format!("スタック '{}' を作成中...", request.name).cyan()
    );
    let outcome = orchestrator.run(&request, expected_workers).await?;

    if options.json {
        println!("{}", render::json(&outcome)?);
    } else {
        print!("{}", render::human(&outcome));
    }
    Ok(())
}

fn required<'a>(value: &'a Option<String>, key: &str) -> anyhow::Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("{} が設定されていません", key))
}

/// 実行ごとに一意な名前でスタック作成リクエストを組み立てる
pub fn build_request(
    config: &BenchConfig,
    template_body: String,
    now: DateTime<Utc>,
) -> anyhow::Result<ProvisioningRequest> {
    let name = format!("{}-{}", config.stack_name_prefix, now.timestamp_millis());
    let instances = config
        .child_number_of_instances
        .ok_or_else(|| anyhow::anyhow!("child_number_of_instances が設定されていません"))?;

    let mut request = ProvisioningRequest::new(name, template_body)
        .with_parameter("SubnetIds", required(&config.child_subnet_ids, "child_subnet_ids")?)
        .with_parameter("AMIId", required(&config.child_ami_id, "child_ami_id")?)
        .with_parameter(
            "InstanceType",
            required(&config.child_instance_type, "child_instance_type")?,
        )
        .with_parameter("NumberOfInstances", instances);
    for capability in TEMPLATE_CAPABILITIES {
        request = request.with_capability(capability);
    }
    Ok(request)
}
