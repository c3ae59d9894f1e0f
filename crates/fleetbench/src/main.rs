mod commands;
mod progress;
mod render;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fleetbench")]
#[command(about = "ワーカーを並べて、測って、片付ける。", long_about = None)]
struct Cli {
    /// 設定ファイル (省略時は fleetbench.toml などを自動検索)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ワーカーを起動し、計測結果を集めてから片付ける
    Run {
        /// 結果を JSON で出力
        #[arg(long)]
        json: bool,
        /// 一部のワーカーが結果を返さなくても成功扱いにする
        #[arg(long)]
        allow_partial: bool,
        /// 起動するワーカー数 (CHILD_NUMBER_OF_INSTANCES を上書き)
        #[arg(short = 'n', long)]
        instances: Option<u32>,
    },
    /// 以前の実行で残ったスタックと結果パラメータを削除
    Cleanup {
        /// スタック名
        stack: String,
        /// 削除する結果パラメータのワーカー ID (省略時はスタックから解決)
        #[arg(short, long = "worker")]
        workers: Vec<String>,
    },
    /// 解決済みの設定を表示
    Config,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout は結果出力 (--json) に使うので、ログは stderr へ
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            json,
            allow_partial,
            instances,
        } => {
            let options = commands::run::RunOptions {
                json,
                allow_partial,
                instances,
            };
            commands::run::handle(config_path, options).await
        }
        Commands::Cleanup { stack, workers } => {
            commands::cleanup::handle(config_path, &stack, workers).await
        }
        Commands::Config => commands::config::handle(config_path),
        Commands::Version => {
            println!("fleetbench {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
