use crate::analyzer::Super40Analysis;
use crate::config::Config;
use crate::error::{ReconcileError, Result};
use crate::models::Table;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let csv_error = |source| ReconcileError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer.write_record(table.headers()).map_err(csv_error)?;
    for row in table.rows() {
        let record: Vec<String> = table.headers().iter().map(|h| row.display(h)).collect();
        writer.write_record(&record).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| ReconcileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Plain-text overview of a run: seats per group, shortfall, ranking.
pub fn selection_summary(analysis: &Super40Analysis, config: &Config) -> String {
    let selection = &analysis.selection;
    let mut content = String::new();
    content.push_str("Super 40 Selection\n");
    content.push_str("==================\n\n");

    content.push_str(&format!(
        "Seats: {} requested, {} filled\n",
        selection.plan.target,
        selection.selected.len()
    ));
    if selection.plan.shortfall() > 0 {
        content.push_str(&format!(
            "Shortfall: {} seats could not be filled\n",
            selection.plan.shortfall()
        ));
    }
    if analysis.unparseable_cells > 0 {
        content.push_str(&format!(
            "Unparseable score cells counted as absent: {}\n",
            analysis.unparseable_cells
        ));
    }
    if !config.excluded_groups.is_empty() {
        content.push_str(&format!(
            "Held out: {} ({} students)\n",
            config.excluded_groups.join(", "),
            analysis.held_out.len()
        ));
    }

    content.push_str("\nSeats per group:\n");
    for group in &selection.plan.groups {
        let note = if group.requested > group.size {
            format!(" (allotted {}, only {} students)", group.requested, group.size)
        } else {
            String::new()
        };
        content.push_str(&format!("   {:<20} {:>3} of {:>3}{}\n", group.group, group.quota, group.size, note));
    }

    let columns = analysis.summary_columns(config);
    content.push_str("\nSelected:\n");
    content.push_str(&format!("   {}\n", columns.join(" | ")));
    for (rank, row) in selection.selected.rows().iter().enumerate() {
        let values: Vec<String> = columns.iter().map(|c| row.display(c)).collect();
        content.push_str(&format!("{:>3}. {}\n", rank + 1, values.join(" | ")));
    }
    content
}

/// Writes the selected, not-selected and held-out tables plus the summary
/// next to each other as `<stem>_*.csv` / `<stem>_summary.txt`.
pub fn write_selection(
    analysis: &Super40Analysis,
    config: &Config,
    output_dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir).map_err(|source| ReconcileError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let outputs = [
        (format!("{}_super40_students.csv", stem), &analysis.selection.selected),
        (format!("{}_not_selected.csv", stem), &analysis.selection.excluded),
        (format!("{}_held_out.csv", stem), &analysis.held_out),
    ];

    let mut written = Vec::new();
    for (file_name, table) in outputs {
        let path = output_dir.join(file_name);
        write_csv(table, &path)?;
        written.push(path);
    }

    let summary_path = output_dir.join(format!("{}_summary.txt", stem));
    fs::write(&summary_path, selection_summary(analysis, config)).map_err(|source| ReconcileError::Io {
        path: summary_path.clone(),
        source,
    })?;
    written.push(summary_path);
    Ok(written)
}
