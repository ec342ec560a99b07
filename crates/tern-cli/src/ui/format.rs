//! Formatting utilities for durations.

use std::time::Duration;

/// Format a duration as `ms` below one second, otherwise seconds.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tern_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(42)), "42ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0ms");
        assert_eq!(format_duration(Duration::from_secs(2)), "2.00s");
    }
}
