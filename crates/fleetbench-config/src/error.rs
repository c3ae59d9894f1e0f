use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// 設定値の検証で見つかった問題
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// 必須の値が設定されていない
    MissingValue { key: &'static str },
    /// 値が不正
    InvalidValue { key: &'static str, reason: String },
}

impl ValidationIssue {
    pub fn key(&self) -> &'static str {
        match self {
            ValidationIssue::MissingValue { key } => key,
            ValidationIssue::InvalidValue { key, .. } => key,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingValue { key } => {
                write!(f, "{} が設定されていません ({})", key, key.to_uppercase())
            }
            ValidationIssue::InvalidValue { key, reason } => {
                write!(f, "{} の値が不正です: {}", key, reason)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: fleetbench.toml\n\
        - ./.fleetbench/config.toml\n\
        - ~/.config/fleetbench/config.toml\n\
        または FLEETBENCH_CONFIG_PATH 環境変数で直接指定できます"
    )]
    ConfigFileNotFound,

    #[error("設定の読み込みに失敗しました: {0}")]
    Load(#[from] config::ConfigError),

    #[error("設定が不正です:\n{}", format_issues(.0))]
    Invalid(Vec<ValidationIssue>),

    #[error("ファイルを読み込めません: {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("テンプレートにプレースホルダ {placeholder} がありません")]
    PlaceholderMissing { placeholder: &'static str },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {}", issue))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, ConfigError>;
