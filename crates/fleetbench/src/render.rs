//! 実行結果の表示 (人間向け / JSON)

use colored::Colorize;
use fleetbench_cloud::{CleanupFailure, CleanupReport, CollectedResult, RunOutcome, WorkerId};
use serde::Serialize;
use std::fmt::Write;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonFailure<'a> {
    worker_id: &'a WorkerId,
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    stack: &'a str,
    results: &'a [CollectedResult],
    failures: Vec<JsonFailure<'a>>,
    cleanup_failures: &'a [CleanupFailure],
}

pub fn json(outcome: &RunOutcome) -> serde_json::Result<String> {
    let report = JsonReport {
        stack: &outcome.stack_name,
        results: &outcome.results,
        failures: outcome
            .failures
            .iter()
            .map(|f| JsonFailure {
                worker_id: &f.worker_id,
                error: f.error.to_string(),
            })
            .collect(),
        cleanup_failures: &outcome.cleanup.failures,
    };
    serde_json::to_string_pretty(&report)
}

/// ワーカーの解決順に 1 台ずつ表示する
pub fn human(outcome: &RunOutcome) -> String {
    let mut out = String::new();

    for (index, worker_id) in outcome.workers.iter().enumerate() {
        let number = index + 1;
        if let Some(collected) = outcome.results.iter().find(|c| &c.worker_id == worker_id) {
            let result = &collected.result;
            let _ = writeln!(
                out,
                "{}",
                format!("Instance {} results ({}):", number, worker_id).bold()
            );
            let _ = writeln!(out, "- Creation Time: {} ms", result.creation_time_ms);
            let _ = writeln!(out, "- Copy Time:     {} ms", result.copy_time_ms);
            let _ = writeln!(out, "- Deletion Time: {} ms", result.deletion_time_ms);
        } else if let Some(failure) = outcome.failures.iter().find(|f| &f.worker_id == worker_id) {
            let _ = writeln!(
                out,
                "{}",
                format!("Instance {} failed ({}):", number, worker_id).red().bold()
            );
            let _ = writeln!(out, "- {}", failure.error);
        }
    }

    if !outcome.cleanup.is_clean() {
        out.push('\n');
        out.push_str(&cleanup_report(&outcome.cleanup));
    }
    out
}

pub fn cleanup_report(report: &CleanupReport) -> String {
    let mut out = String::new();
    for resource in &report.deleted {
        let _ = writeln!(out, "  {} {}", "✓".green(), resource);
    }
    for failure in &report.failures {
        let _ = writeln!(out, "  {} {}", "✗".red(), failure.to_string().yellow());
    }
    out
}
