//! Human- and machine-readable output for CLI commands.

use crate::resolve::Resolution;
use crate::sync::merge::WriteMode;
use crate::sync::SyncReport;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use owo_colors::OwoColorize;
use serde_json::json;

/// Text rendering of a successful resolution: the breadcrumb trail walked,
/// then the node itself.
pub fn format_resolution_text(resolution: &Resolution) -> String {
    let mut out = String::new();

    if !resolution.breadcrumbs.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Name", "Title", "Path"]);
        for crumb in &resolution.breadcrumbs {
            table.add_row(vec![
                crumb.name.clone(),
                crumb.title.clone(),
                crumb.path.clone(),
            ]);
        }
        out.push_str(&table.to_string());
        out.push('\n');
    }

    match &resolution.node {
        Some(resolved) => {
            out.push_str(&format!(
                "{} {} ({})\n",
                "Resolved".green(),
                resolved.display_name(),
                resolved.node.kind
            ));
            out.push_str(&format!("  source: {}\n", resolved.source_url));
            if !resolved.resolved_path.is_empty() {
                out.push_str(&format!("  path:   {}\n", resolved.resolved_path));
            }
            match serde_json::to_string_pretty(&resolved.node.raw) {
                Ok(body) => out.push_str(&body),
                Err(_) => out.push_str("(unprintable document)"),
            }
        }
        None => {
            out.push_str(&format!("{}\n", "Not found".red()));
            for url in &resolution.attempted {
                out.push_str(&format!("  tried: {}\n", url));
            }
        }
    }
    out
}

pub fn format_resolution_json(resolution: &Resolution) -> String {
    let node = resolution.node.as_ref().map(|resolved| {
        json!({
            "name": resolved.display_name(),
            "type": resolved.node.kind.as_str(),
            "source_url": resolved.source_url,
            "path": resolved.resolved_path,
            "document": resolved.node.raw,
        })
    });
    let body = json!({
        "found": resolution.node.is_some(),
        "node": node,
        "breadcrumbs": resolution.breadcrumbs.iter().map(|c| json!({
            "name": c.name, "title": c.title, "path": c.path,
        })).collect::<Vec<_>>(),
        "attempted": resolution.attempted,
    });
    serde_json::to_string_pretty(&body).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_sync_report_text(report: &SyncReport, mode: WriteMode) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Outcome", "Count"]);
    match mode {
        WriteMode::Commit => {
            table.add_row(vec!["written".to_string(), report.written.to_string()]);
        }
        WriteMode::DryRun => {
            table.add_row(vec![
                "would write".to_string(),
                report.would_write.to_string(),
            ]);
        }
    }
    table.add_row(vec!["unchanged".to_string(), report.unchanged.to_string()]);
    table.add_row(vec!["failed".to_string(), report.failed.to_string()]);
    table.add_row(vec!["skipped".to_string(), report.skipped.to_string()]);

    let headline = if report.failed > 0 {
        format!("{}", "Synchronized with failures".yellow())
    } else if matches!(mode, WriteMode::DryRun) {
        format!("{}", "Dry run complete".green())
    } else {
        format!("{}", "Synchronized".green())
    };
    format!("{}\n{}", headline, table)
}

pub fn format_sync_report_json(report: &SyncReport, mode: WriteMode) -> String {
    let body = json!({
        "dry_run": matches!(mode, WriteMode::DryRun),
        "written": report.written,
        "would_write": report.would_write,
        "unchanged": report.unchanged,
        "failed": report.failed,
        "skipped": report.skipped,
    });
    serde_json::to_string_pretty(&body).unwrap_or_else(|_| "{}".to_string())
}
