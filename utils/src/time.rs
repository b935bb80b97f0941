//! Time formatting helpers.

/// Format a millisecond duration to a human-readable string.
pub fn format_millis(millis: u64) -> String {
    if millis < 1_000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{}.{:01}s", millis / 1_000, (millis % 1_000) / 100)
    } else if millis < 3_600_000 {
        format!("{}m {}s", millis / 60_000, (millis % 60_000) / 1_000)
    } else {
        format!("{}h {}m", millis / 3_600_000, (millis % 3_600_000) / 60_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_magnitude() {
        assert_eq!(format_millis(250), "250ms");
        assert_eq!(format_millis(1_500), "1.5s");
        assert_eq!(format_millis(90_000), "1m 30s");
        assert_eq!(format_millis(3_660_000), "1h 1m");
    }
}
