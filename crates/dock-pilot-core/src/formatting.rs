//! Formatting utilities for consistent display across the application
//!
//! Byte sizes, percentages, durations, and the row strings of the project
//! and container lists.

use crate::constants::MAX_PROJECT_PATH_LEN;
use crate::indicators::HasHealth;
use crate::types::{Container, Project, RecordedStats};
use chrono::Duration;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

/// Format bytes into a human-readable string
///
/// # Examples
///
/// ```
/// use dock_pilot_core::formatting::format_bytes;
///
/// assert_eq!(format_bytes(500), "500 B");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// assert_eq!(format_bytes(1_572_864), "1.5 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Format a duration using its largest unit
///
/// ```
/// use dock_pilot_core::formatting::format_duration_human;
/// use chrono::Duration;
///
/// assert_eq!(format_duration_human(Duration::seconds(30)), "30s");
/// assert_eq!(format_duration_human(Duration::hours(2)), "2h");
/// ```
pub fn format_duration_human(duration: Duration) -> String {
    let secs = duration.num_seconds().abs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

/// Keep the last `max_len` characters, marking the cut with a leading `...`
///
/// ```
/// use dock_pilot_core::formatting::truncate_start;
///
/// assert_eq!(truncate_start("/home/me/projects/shop", 12), "...ects/shop");
/// assert_eq!(truncate_start("/srv/shop", 30), "/srv/shop");
/// ```
pub fn truncate_start(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let tail: String = s.chars().skip(len - keep).collect();
    format!("...{}", tail)
}

/// Truncate a string to a maximum length with a trailing ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Cells of a project row: status icon, name, running/total, services, path
pub fn project_display_strings(project: &Project) -> [String; 5] {
    let path = project
        .path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let services = if project.service_count < 0 {
        "?".to_string()
    } else {
        project.service_count.to_string()
    };
    [
        project.health().symbol().to_string(),
        project.name.clone(),
        format!("{}/{}", project.running_count, project.container_count),
        services,
        truncate_start(&path, MAX_PROJECT_PATH_LEN),
    ]
}

/// Cells of a container row: status icon, name, state, CPU, memory
pub fn container_display_strings(container: &Container) -> [String; 5] {
    let (cpu, mem) = match container.latest_stats() {
        Some(stats) => (
            format_percent(stats.derived.cpu_percentage),
            format_percent(stats.derived.memory_percentage),
        ),
        None => (String::new(), String::new()),
    };
    let info = container.info();
    [
        container.health().symbol().to_string(),
        info.name,
        info.summary.status,
        cpu,
        mem,
    ]
}

/// Multi-line summary of the newest stats sample
pub fn format_stats_summary(stats: &RecordedStats) -> String {
    let (rx, tx) = stats.stats.network_totals();
    let memory = &stats.stats.memory_stats;
    format!(
        "CPU:     {}\nMemory:  {} / {} ({})\nNetwork: {} rx / {} tx\nPIDs:    {}",
        format_percent(stats.derived.cpu_percentage),
        format_bytes(memory.usage),
        format_bytes(memory.limit),
        format_percent(stats.derived.memory_percentage),
        format_bytes(rx),
        format_bytes(tx),
        stats.stats.pids_stats.current,
    )
}
