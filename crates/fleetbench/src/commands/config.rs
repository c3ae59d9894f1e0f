use colored::Colorize;
use std::path::Path;

pub fn handle(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    let source = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => fleetbench_config::find_config_file().ok(),
    };
    match source {
        Some(path) => eprintln!("{} {}", "設定ファイル:".bold(), path.display().to_string().cyan()),
        None => eprintln!("{}", "設定ファイルなし (デフォルト値と環境変数のみ)".dimmed()),
    }

    println!("{}", serde_json::to_string_pretty(&config)?);

    if let Err(e) = config.validate() {
        eprintln!();
        eprintln!("{}", e.to_string().yellow());
    }
    Ok(())
}
