use crate::dispatcher::{CommandStatus, CANNED_COMMANDS};
use crate::interpolator::{JOINT_COUNT, JOINT_NAMES};
use crate::types::{LogEntry, RobotSnapshot};
use chrono::{DateTime, Local};
use std::fmt::Write;

pub fn format_timestamp(timestamp: &str) -> String {
    if timestamp.is_empty() {
        return "N/A".to_string();
    }
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(ts) => ts
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => timestamp.to_string(),
    }
}

pub fn format_size(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

fn opt_number(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

pub fn render_snapshot(data: &RobotSnapshot) -> String {
    if data.is_empty() {
        return "  No data\n".to_string();
    }

    let mut out = String::new();
    if data.x().is_some() {
        let _ = writeln!(
            out,
            "  X: {}  Y: {}  Z: {}",
            opt_number(data.x()),
            opt_number(data.y()),
            opt_number(data.z())
        );
    }
    if let Some(joints) = data.joints() {
        let joints: Vec<String> = joints.iter().map(|j| format!("{:.1}", j)).collect();
        let _ = writeln!(out, "  Joints: [{}]", joints.join(", "));
    }
    if let Some(status) = data.status() {
        let _ = writeln!(out, "  Status: {}", status);
    }
    if !data.extra_keys().is_empty() {
        let dump = serde_json::to_string_pretty(&data.0).unwrap_or_default();
        let _ = writeln!(out, "  More data:");
        for line in dump.lines() {
            let _ = writeln!(out, "    {}", line);
        }
    }
    out
}

pub fn render_entry(entry: &LogEntry) -> String {
    let mut out = String::new();
    let _ = write!(out, "{}", format_timestamp(&entry.timestamp));
    if let Some(ref id) = entry.message_id {
        let _ = write!(out, "  ID: {}", id);
    }
    let _ = writeln!(out, "  ({})", format_size(entry.size));
    out.push_str(&render_snapshot(&entry.data));
    let _ = writeln!(out, "  Key: {}", entry.key);
    out
}

pub fn render_logs(logs: &[LogEntry]) -> String {
    if logs.is_empty() {
        return "No logs found. Try selecting a different date or wait for robot data.\n"
            .to_string();
    }
    logs.iter()
        .map(render_entry)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn log_count(n: usize) -> String {
    format!("{} log{}", n, if n == 1 { "" } else { "s" })
}

pub fn render_command_status(status: &CommandStatus) -> String {
    match status {
        CommandStatus::Success { message_id, .. } => match message_id {
            Some(id) => format!("Command sent successfully! Message ID: {}", id),
            None => "Command sent successfully!".to_string(),
        },
        CommandStatus::Error(message) => format!("Command error: {}", message),
    }
}

pub fn render_pose(pose: &[f64; JOINT_COUNT]) -> String {
    JOINT_NAMES
        .iter()
        .zip(pose.iter())
        .map(|(name, angle)| format!("{}={:.3}", name, angle))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn help() -> String {
    let mut out = String::from(
        "refresh | date YYYY-MM-DD | auto on|off | send <json> | logs | pose | status | help | quit\n",
    );
    for cmd in CANNED_COMMANDS.iter() {
        let _ = writeln!(out, "  {:<5} {} {}", cmd.name, cmd.label, cmd.command().0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamps_fall_back_to_raw() {
        assert_eq!(format_timestamp(""), "N/A");
        assert_eq!(format_timestamp("yesterday-ish"), "yesterday-ish");
        assert_eq!(format_timestamp("2024-01-31T10:00:00Z").len(), 19);
    }

    #[test]
    fn size_in_kilobytes() {
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(100), "0.10 KB");
    }

    #[test]
    fn snapshot_lines() {
        let data = RobotSnapshot(json!({
            "x": 1.234, "y": 2, "z": 3,
            "joints": [0.12, 1.0, 2.0, 3.0, 4.0, 5.0],
            "status": "moving"
        }));
        let text = render_snapshot(&data);
        assert!(text.contains("X: 1.23  Y: 2.00  Z: 3.00"));
        assert!(text.contains("Joints: [0.1, 1.0, 2.0, 3.0, 4.0, 5.0]"));
        assert!(text.contains("Status: moving"));
        assert!(!text.contains("More data"));
    }

    #[test]
    fn unknown_keys_are_dumped() {
        let data = RobotSnapshot(json!({"status": "ok", "battery": 87}));
        let text = render_snapshot(&data);
        assert!(text.contains("More data"));
        assert!(text.contains("\"battery\": 87"));
    }

    #[test]
    fn empty_states() {
        assert!(render_logs(&[]).starts_with("No logs found"));
        assert_eq!(render_snapshot(&RobotSnapshot::default()), "  No data\n");
        assert_eq!(log_count(1), "1 log");
        assert_eq!(log_count(3), "3 logs");
    }
}
