//! Duration formatting for status output.

use std::time::Duration;

/// Format how long ago something happened, e.g. `"3m ago"`.
#[must_use]
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        return "just now".to_string();
    }
    format!("{} ago", format_span(age))
}

/// Format a span compactly, e.g. `"90s"` → `"1m"`, `"2h 5m"`, `"3d"`.
#[must_use]
pub fn format_span(span: Duration) -> String {
    let secs = span.as_secs();
    let minutes = secs / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d")
    } else if hours > 0 {
        let rem = minutes % 60;
        if rem == 0 {
            format!("{hours}h")
        } else {
            format!("{hours}h {rem}m")
        }
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}
