//! Command implementations, one file per subcommand

pub mod annotate;
pub mod daily;
pub mod fewshot;
pub mod history;
pub mod review;
pub mod separate;
pub mod show;
pub mod split;
pub mod stats;

/// First line of `text`, cut to `max` characters
pub(crate) fn truncate(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("पानी कब दें और कितना", 8), "पानी ...");
        assert_eq!(truncate("first\nsecond", 20), "first");
    }
}
