pub mod cleanup;
pub mod config;
pub mod run;

use fleetbench_cloud::{FanInPolicy, LifecycleSettings, RetryConfig};
use fleetbench_config::BenchConfig;
use std::path::Path;

/// 設定を読み込む (`--config` 指定時はそのファイル、なければ自動検索)
pub fn load_config(path: Option<&Path>) -> anyhow::Result<BenchConfig> {
    let config = match path {
        Some(path) => BenchConfig::load_from(Some(path))?,
        None => BenchConfig::load()?,
    };
    Ok(config)
}

/// 設定から各待ち合わせのリトライ設定を組み立てる
pub fn lifecycle_settings(config: &BenchConfig) -> LifecycleSettings {
    LifecycleSettings {
        stack_poll: RetryConfig::bounded(
            "Waiting for stack completion failed",
            config.stack_poll_interval(),
            config.stack_poll_max_attempts,
        ),
        result_poll: RetryConfig::bounded(
            "Fetching SSM parameter failed",
            config.result_poll_interval(),
            config.result_poll_max_attempts,
        ),
        cleanup: RetryConfig::bounded(
            "Deletion failed",
            config.cleanup_interval(),
            config.cleanup_max_attempts,
        ),
        group_output_key: config.group_output_key.clone(),
        fan_in: if config.allow_partial_results {
            FanInPolicy::PartialSuccess
        } else {
            FanInPolicy::AllOrNothing
        },
    }
}
