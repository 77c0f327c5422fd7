//! Markdown summary generation
//!
//! This module renders a run summary as a human-readable markdown report,
//! including page outcomes, entity counts and data-quality warnings.

use crate::output::traits::{OutputResult, RunSummary};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Conflicts listed individually before the report truncates
const MAX_LISTED_CONFLICTS: usize = 50;

/// Writes a markdown summary
///
/// # Arguments
///
/// * `summary` - The run summary
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn write_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Disc-Harvest Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run_id));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    md.push_str(&format!(
        "- **Session Duration**: {:.1} seconds\n",
        summary.elapsed.as_secs_f64()
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status.to_db_string()));
    md.push_str(&format!(
        "- **Resumed**: {}\n",
        if summary.resumed { "yes" } else { "no" }
    ));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    // Pages
    md.push_str("## Pages\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!(
        "| Fetched this session | {} |\n",
        summary.pages_fetched
    ));
    md.push_str(&format!(
        "| Fetch attempts this session | {} |\n",
        summary.fetch_attempts
    ));
    md.push_str(&format!("| Done | {} |\n", summary.pages_done));
    md.push_str(&format!("| Failed | {} |\n", summary.failed.len()));
    md.push_str(&format!("| Pending | {} |\n\n", summary.pages_pending));

    if !summary.failed.is_empty() {
        md.push_str("### Failed Pages\n\n");
        md.push_str("| Descriptor | Kind | Attempts | Reason |\n");
        md.push_str("|------------|------|----------|--------|\n");
        for page in &summary.failed {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                page.key,
                page.kind,
                page.attempts,
                escape_cell(&page.reason)
            ));
        }
        md.push('\n');
    }

    // Entities
    md.push_str("## Entities\n\n");
    md.push_str("| Kind | Count |\n");
    md.push_str("|------|-------|\n");
    md.push_str(&format!("| Companies | {} |\n", summary.companies));
    md.push_str(&format!("| Discs | {} |\n", summary.discs));
    md.push_str(&format!("| Players | {} |\n", summary.players));
    md.push_str(&format!("| Events | {} |\n\n", summary.events));
    md.push_str(&format!(
        "Records upserted: {}, unchanged: {}\n\n",
        summary.upserted, summary.unchanged
    ));

    // Data quality
    md.push_str("## Data Quality\n\n");
    md.push_str(&format!(
        "- **Reconciliation conflicts**: {} ({} on flight numbers)\n",
        summary.conflicts.len(),
        summary.flight_number_conflicts()
    ));
    md.push_str(&format!(
        "- **Dangling manufacturer references**: {}\n\n",
        summary.dangling.len()
    ));

    if !summary.conflicts.is_empty() {
        md.push_str("### Conflicts\n\n");
        for warning in summary.conflicts.iter().take(MAX_LISTED_CONFLICTS) {
            md.push_str(&format!("- {} from `{}`\n", warning, warning.source));
        }
        if summary.conflicts.len() > MAX_LISTED_CONFLICTS {
            md.push_str(&format!(
                "- ... and {} more\n",
                summary.conflicts.len() - MAX_LISTED_CONFLICTS
            ));
        }
        md.push('\n');
    }

    if !summary.dangling.is_empty() {
        md.push_str("### Dangling References\n\n");
        for dangling in &summary.dangling {
            md.push_str(&format!("- {}\n", dangling));
        }
        md.push('\n');
    }

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
