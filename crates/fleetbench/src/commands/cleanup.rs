use crate::progress::ConsoleProgress;
use crate::render;
use colored::Colorize;
use fleetbench_cloud::{Orchestrator, WorkerId};
use fleetbench_cloud_aws::AwsClients;
use std::path::Path;
use std::sync::Arc;

pub async fn handle(
    config_path: Option<&Path>,
    stack: &str,
    workers: Vec<String>,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    println!("{}", format!("スタック '{}' を片付けています...", stack).yellow());

    let clients = AwsClients::load(config.aws_region.as_deref()).await;
    let orchestrator = Orchestrator::new(clients.capabilities(), super::lifecycle_settings(&config))
        .with_observer(Arc::new(ConsoleProgress));

    let workers = workers.into_iter().map(WorkerId::from).collect();
    let report = orchestrator.reconcile(stack, workers).await?;

    print!("{}", render::cleanup_report(&report));
    if !report.is_clean() {
        anyhow::bail!("{} 件のリソースを削除できませんでした", report.failures.len());
    }
    Ok(())
}
