use colored::Colorize;
use fleetbench_cloud::{CleanupReport, RunObserver, StackDescriptor, WorkerId};

/// 実行の進捗を stderr に表示する
pub struct ConsoleProgress;

impl RunObserver for ConsoleProgress {
    fn stack_submitted(&self, name: &str) {
        eprintln!("  {} スタック作成を受け付けました: {}", "✓".green(), name.cyan());
        eprintln!("{}", "  ワーカーの起動を待っています...".dimmed());
    }

    fn stack_settled(&self, descriptor: &StackDescriptor) {
        if descriptor.has_failed() {
            eprintln!(
                "  {} スタックの作成に失敗しました: {}",
                "✗".red(),
                descriptor.status.red()
            );
            if let Some(reason) = &descriptor.status_reason {
                eprintln!("    {}", reason.dimmed());
            }
        } else {
            eprintln!("  {} スタック作成完了", "✓".green());
        }
    }

    fn workers_resolved(&self, workers: &[WorkerId]) {
        let ids: Vec<&str> = workers.iter().map(WorkerId::as_str).collect();
        eprintln!(
            "  {} ワーカー {} 台: {}",
            "✓".green(),
            workers.len(),
            ids.join(", ").cyan()
        );
        eprintln!("{}", "  結果を待っています...".dimmed());
    }

    fn results_collected(&self, collected: usize, failed: usize) {
        if failed == 0 {
            eprintln!("  {} {} 台分の結果を取得しました", "✓".green(), collected);
        } else {
            eprintln!(
                "  {} {} 台分の結果を取得、{} 台は取得できませんでした",
                "⚠".yellow(),
                collected,
                failed
            );
        }
        eprintln!("{}", "  インスタンスを停止し、リソースを削除しています...".dimmed());
    }

    fn cleanup_finished(&self, report: &CleanupReport) {
        if report.is_clean() {
            eprintln!("  {} 片付け完了", "✓".green());
        } else {
            eprintln!(
                "  {} 片付けで {} 件のリソースを削除できませんでした",
                "⚠".yellow(),
                report.failures.len()
            );
        }
    }
}
