pub mod error;
pub mod template;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 設定ファイルのパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "FLEETBENCH_CONFIG_PATH";

/// FleetBench の実行設定
///
/// 読み込み順 (後勝ち):
/// 1. 組み込みのデフォルト値
/// 2. 設定ファイル (TOML)
/// 3. 環境変数 (`CHILD_AMI_ID` → `child_ami_id` のように小文字化したキー)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// AWS リージョン (未設定なら SDK のデフォルト解決に任せる)
    pub aws_region: Option<String>,
    /// ワーカーを配置するサブネット (カンマ区切り)
    pub child_subnet_ids: Option<String>,
    pub child_ami_id: Option<String>,
    pub child_instance_type: Option<String>,
    pub child_number_of_instances: Option<u32>,

    /// ワーカースタックのテンプレート
    pub template_path: PathBuf,
    /// テンプレートに埋め込むブートスクリプト
    pub boot_script_path: PathBuf,
    /// スタック名の接頭辞 (`<prefix>-<unix millis>`)
    pub stack_name_prefix: String,
    /// ワーカーグループ名を出力するスタック出力のキー
    pub group_output_key: String,

    pub stack_poll_interval_ms: u64,
    pub stack_poll_max_attempts: u32,
    pub result_poll_interval_ms: u64,
    pub result_poll_max_attempts: u32,
    pub cleanup_interval_ms: u64,
    pub cleanup_max_attempts: u32,

    /// 一部のワーカーが結果を返さなくても実行を成功扱いにする
    pub allow_partial_results: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            aws_region: None,
            child_subnet_ids: None,
            child_ami_id: None,
            child_instance_type: None,
            child_number_of_instances: None,
            template_path: PathBuf::from("child_stack.yaml"),
            boot_script_path: PathBuf::from("child_boot.sh"),
            stack_name_prefix: "ChildStack".to_string(),
            group_output_key: "ChildASGName".to_string(),
            stack_poll_interval_ms: 5000,
            stack_poll_max_attempts: 100,
            result_poll_interval_ms: 3000,
            result_poll_max_attempts: 60,
            cleanup_interval_ms: 2000,
            cleanup_max_attempts: 5,
            allow_partial_results: false,
        }
    }
}

impl BenchConfig {
    /// 設定ファイルを探して読み込む (見つからなければデフォルト値と環境変数のみ)
    pub fn load() -> Result<Self> {
        let path = match find_config_file() {
            Ok(path) => Some(path),
            Err(ConfigError::ConfigFileNotFound) => None,
            Err(e) => return Err(e),
        };
        Self::load_from(path.as_deref())
    }

    /// 指定した設定ファイルから読み込む
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&BenchConfig::default())?);

        if let Some(path) = path {
            tracing::debug!(path = %path.display(), "Loading config file");
            builder = builder.add_source(config::File::new(
                &path.to_string_lossy(),
                config::FileFormat::Toml,
            ));
        }

        builder = builder.add_source(config::Environment::default().try_parsing(true));

        Ok(builder.build()?.try_deserialize()?)
    }

    /// 実行に必要な値をすべて検証し、問題をまとめて返す
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();

        for (key, value) in [
            ("child_subnet_ids", &self.child_subnet_ids),
            ("child_ami_id", &self.child_ami_id),
            ("child_instance_type", &self.child_instance_type),
        ] {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                issues.push(ValidationIssue::MissingValue { key });
            }
        }

        if self.child_subnet_ids.is_some() && self.subnet_ids().iter().any(|id| id.is_empty()) {
            issues.push(ValidationIssue::InvalidValue {
                key: "child_subnet_ids",
                reason: "空のサブネット ID が含まれています".to_string(),
            });
        }

        match self.child_number_of_instances {
            None => issues.push(ValidationIssue::MissingValue {
                key: "child_number_of_instances",
            }),
            Some(0) => issues.push(ValidationIssue::InvalidValue {
                key: "child_number_of_instances",
                reason: "1 以上を指定してください".to_string(),
            }),
            Some(_) => {}
        }

        if !is_valid_stack_prefix(&self.stack_name_prefix) {
            issues.push(ValidationIssue::InvalidValue {
                key: "stack_name_prefix",
                reason: format!(
                    "'{}' はスタック名に使えません (英字で始まり、英数字とハイフンのみ)",
                    self.stack_name_prefix
                ),
            });
        }

        for (key, attempts) in [
            ("stack_poll_max_attempts", self.stack_poll_max_attempts),
            ("result_poll_max_attempts", self.result_poll_max_attempts),
            ("cleanup_max_attempts", self.cleanup_max_attempts),
        ] {
            if attempts == 0 {
                issues.push(ValidationIssue::InvalidValue {
                    key,
                    reason: "1 以上を指定してください".to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    /// サブネット ID の一覧
    pub fn subnet_ids(&self) -> Vec<&str> {
        self.child_subnet_ids
            .as_deref()
            .map(|ids| ids.split(',').map(str::trim).collect())
            .unwrap_or_default()
    }

    pub fn stack_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stack_poll_interval_ms)
    }

    pub fn result_poll_interval(&self) -> Duration {
        Duration::from_millis(self.result_poll_interval_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

fn is_valid_stack_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        _ => false,
    }
}

/// FleetBench のグローバル設定ディレクトリ
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("fleetbench"))
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 FLEETBENCH_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: fleetbench.toml
/// 3. ./.fleetbench/config.toml
/// 4. ~/.config/fleetbench/config.toml (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{} points to a missing file", CONFIG_PATH_ENV);
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリ
    let local = current_dir.join("fleetbench.toml");
    if local.exists() {
        return Ok(local);
    }

    // 3. ./.fleetbench/ ディレクトリ
    let project = current_dir.join(".fleetbench").join("config.toml");
    if project.exists() {
        return Ok(project);
    }

    // 4. グローバル設定
    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join("config.toml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}
