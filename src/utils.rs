//! Text utilities: message splitting and uptime formatting.

use unicode_segmentation::UnicodeSegmentation;

/// Splits a long message into parts that fit within the outbound limit.
///
/// Splitting prefers line boundaries; a single line longer than
/// `max_length` is split by grapheme clusters (Unicode-safe). No
/// characters are inserted or removed, so the concatenation of the
/// returned parts equals the input exactly.
///
/// # Examples
///
/// ```
/// use atlas_chat_rs::utils::split_long_message;
/// let long_msg = "A very long message...\n".repeat(300);
/// let parts = split_long_message(&long_msg, 4000);
/// assert!(parts.len() > 1);
/// assert_eq!(parts.concat(), long_msg);
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_length: usize) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }

    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();

    for line in message.split_inclusive('\n') {
        // A single line longer than the limit is split by graphemes
        if line.len() > max_length {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            for grapheme in line.graphemes(true) {
                if current.len() + grapheme.len() > max_length && !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                current.push_str(grapheme);
            }
            continue;
        }

        if current.len() + line.len() > max_length && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Formats a duration as `"{hours}h {minutes}m"`.
#[must_use]
pub fn format_uptime(elapsed: chrono::Duration) -> String {
    let total_minutes = elapsed.num_minutes().max(0);
    format!("{}h {}m", total_minutes / 60, total_minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_untouched() {
        let parts = split_long_message("hello", 4000);
        assert_eq!(parts, vec!["hello"]);
    }

    #[test]
    fn test_empty_message_yields_no_parts() {
        assert!(split_long_message("", 4000).is_empty());
    }

    #[test]
    fn test_split_prefers_line_boundaries() {
        let input = "Line 1\nLine 2\nLine 3";
        // "Line 1\n" is 7 bytes; any two lines together exceed 12
        let parts = split_long_message(input, 12);
        assert_eq!(parts, vec!["Line 1\n", "Line 2\n", "Line 3"]);
    }

    #[test]
    fn test_concatenation_equals_input() {
        let input = "word ".repeat(2000);
        let parts = split_long_message(&input, 4000);
        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.len() <= 4000);
        }
        assert_eq!(parts.concat(), input);
    }

    #[test]
    fn test_split_very_long_line() {
        let input = "a".repeat(10000);
        let parts = split_long_message(&input, 4096);
        assert!(parts.len() >= 3);
        for part in &parts {
            assert!(part.len() <= 4096);
        }
        assert_eq!(parts.concat(), input);
    }

    #[test]
    fn test_split_unicode_graphemes() {
        let input = "🔥".repeat(5000); // each emoji is 4 bytes
        let parts = split_long_message(&input, 4096);
        assert!(parts.len() >= 3);
        for part in &parts {
            assert!(part.len() <= 4096);
            assert!(part.chars().all(|c| c != '\u{FFFD}'));
        }
        assert_eq!(parts.concat(), input);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(chrono::Duration::minutes(0)), "0h 0m");
        assert_eq!(format_uptime(chrono::Duration::minutes(75)), "1h 15m");
        assert_eq!(format_uptime(chrono::Duration::hours(26)), "26h 0m");
    }
}
