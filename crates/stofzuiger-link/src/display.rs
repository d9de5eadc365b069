//! Box-drawn tables for the CLI.

use stofzuiger_session::{RegisterSnapshot, ScheduleEntry, StoreSnapshot};

fn border(left: &str, mid: &str, right: &str, widths: &[usize]) -> String {
    let cells: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{}{}{}", left, cells.join(mid), right)
}

fn row(cells: &[String], widths: &[usize]) -> String {
    let cells: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!(" {:width$} ", cell, width = width))
        .collect();
    format!("│{}│", cells.join("│"))
}

fn table(header: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for cells in rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    let mut lines = vec![
        border("┌", "┬", "┐", &widths),
        row(&header, &widths),
        border("├", "┼", "┤", &widths),
    ];
    lines.extend(rows.iter().map(|cells| row(cells, &widths)));
    lines.push(border("└", "┴", "┘", &widths));
    lines
}

fn register_value(register: &RegisterSnapshot) -> String {
    match (register.value, register.flag) {
        (None, _) => "?".to_string(),
        (Some(0), true) => "off".to_string(),
        (Some(_), true) => "on".to_string(),
        (Some(v), false) => v.to_string(),
    }
}

fn clock(hour: Option<i32>, minute: Option<i32>) -> String {
    match (hour, minute) {
        (Some(h), Some(m)) => format!("{:02}:{:02}", h, m),
        (Some(h), None) => format!("{:02}:--", h),
        _ => "--:--".to_string(),
    }
}

fn schedule_row(entry: &ScheduleEntry) -> Vec<String> {
    vec![
        entry.index.to_string(),
        clock(entry.on_hour, entry.on_minute),
        clock(entry.run_hour, entry.run_minute),
        if entry.is_complete() { "ok" } else { "fetching" }.to_string(),
    ]
}

/// Render the register and schedule tables.
pub fn render_status(snapshot: &StoreSnapshot) -> String {
    let registers: Vec<Vec<String>> = snapshot
        .registers
        .iter()
        .map(|r| vec![r.name.to_string(), r.address.to_string(), register_value(r)])
        .collect();
    let mut lines = table(&["Register", "Addr", "Value"], &registers);

    lines.push(String::new());
    if snapshot.schedule.is_empty() {
        lines.push("No timings.".to_string());
    } else {
        let schedule: Vec<Vec<String>> = snapshot.schedule.iter().map(schedule_row).collect();
        lines.extend(table(&["#", "Start", "Run for", "State"], &schedule));
    }
    if !snapshot.synchronized {
        lines.push("(still synchronizing)".to_string());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
