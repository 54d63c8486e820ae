//! Human-readable uptimes.

const UNITS: [(u64, &str); 4] = [(86_400, "d"), (3_600, "h"), (60, "m"), (1, "s")];

/// Render `seconds` as a descending `d h m s` breakdown.
///
/// Leading zero components are omitted. When `max_components` is positive
/// the output stops after that many segments; `0` means no limit.
///
/// ```
/// use drover_control::format_duration;
///
/// assert_eq!(format_duration(90_061, 0), "1d 1h 1m 1s");
/// assert_eq!(format_duration(45, 1), "45s");
/// assert_eq!(format_duration(3_725, 2), "1h 2m");
/// ```
#[must_use]
pub fn format_duration(seconds: u64, max_components: usize) -> String {
    let mut remaining = seconds;
    let segments: Vec<String> = UNITS
        .iter()
        .map(|&(size, suffix)| {
            let count = remaining.checked_div(size).unwrap_or_default();
            remaining = remaining.checked_rem(size).unwrap_or_default();
            (count, suffix)
        })
        .skip_while(|&(count, _)| count == 0)
        .map(|(count, suffix)| format!("{count}{suffix}"))
        .collect();

    if segments.is_empty() {
        return "0s".to_string();
    }

    let limit = if max_components == 0 {
        segments.len()
    } else {
        max_components
    };
    segments.into_iter().take(limit).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_components() {
        assert_eq!(format_duration(90_061, 0), "1d 1h 1m 1s");
    }

    #[test]
    fn test_seconds_only() {
        assert_eq!(format_duration(45, 1), "45s");
        assert_eq!(format_duration(45, 0), "45s");
    }

    #[test]
    fn test_zero() {
        assert_eq!(format_duration(0, 0), "0s");
        assert_eq!(format_duration(0, 3), "0s");
    }

    #[test]
    fn test_inner_zero_components_kept() {
        assert_eq!(format_duration(86_401, 0), "1d 0h 0m 1s");
    }

    #[test]
    fn test_truncation() {
        assert_eq!(format_duration(90_061, 2), "1d 1h");
        assert_eq!(format_duration(3_600, 5), "1h 0m 0s");
    }
}
