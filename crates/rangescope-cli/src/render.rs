//! Terminal rendering of a [`SessionView`].

use anyhow::Result;
use colored::Colorize;
use rangescope_catalog::CatalogStats;
use rangescope_session::{SessionView, Slot};

/// One frame: a row of options per slot, the chosen one bracketed, followed
/// by the resolved range (if any).
pub fn format_view(view: &SessionView) -> String {
    if !view.has_data() {
        return format!("{}", "waiting for first snapshot...".dimmed());
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n",
        "catalog".cyan().bold(),
        format!("#{}", view.generation).dimmed()
    ));

    let rows: [(Slot, Option<&[String]>); 4] = [
        (Slot::Frequency, Some(view.frequencies.as_slice())),
        (Slot::Category, Some(view.categories.as_slice())),
        (Slot::Instrument, Some(view.instruments.as_slice())),
        (Slot::Timeframe, view.timeframes.as_deref()),
    ];
    for (slot, options) in rows {
        let Some(options) = options else {
            continue;
        };
        if options.is_empty() && view.selection.get(slot).is_none() {
            continue;
        }
        out.push_str(&format_row(slot, options, view));
        out.push('\n');
    }

    match &view.result {
        Some(resolved) => {
            let label = resolved
                .label
                .as_deref()
                .map(|label| format!(" ({label})"))
                .unwrap_or_default();
            out.push_str(&format!(
                "{}{} {} → {}",
                "range".green().bold(),
                label,
                resolved.from.bold(),
                resolved.to.bold()
            ));
        }
        None => out.push_str(&format!("{}", "range: (incomplete selection)".dimmed())),
    }
    out
}

fn format_row(slot: Slot, options: &[String], view: &SessionView) -> String {
    let selected = view.selection.get(slot);
    let mut cells: Vec<String> = options
        .iter()
        .map(|option| {
            if selected == Some(option.as_str()) {
                format!("[{}]", option.yellow().bold())
            } else {
                option.clone()
            }
        })
        .collect();

    if view.stale == Some(slot) {
        if let Some(key) = selected {
            cells.push(format!("[{}] {}", key.red(), "(unavailable)".red()));
        }
    }

    format!("{:<11} {}", format!("{slot}:"), cells.join("  "))
}

pub fn print_view(view: &SessionView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(view)?);
    } else {
        println!("{}\n", format_view(view));
    }
    Ok(())
}

pub fn format_stats(stats: &CatalogStats) -> String {
    format!(
        "{} frequencies, {} categories, {} instruments ({} direct, {} indexed, {} unrecognized)",
        stats.frequencies,
        stats.categories,
        stats.instruments,
        stats.direct_leaves,
        stats.indexed_leaves,
        stats.unrecognized_leaves
    )
}
