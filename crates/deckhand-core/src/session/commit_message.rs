//! Commit message policy

use crate::diff::DeckDiff;
use crate::error::{Error, Result};

/// Summary used for automatic saves, e.g. `"+2 cards, -1 card, 1 modified"`.
///
/// Counts distinct card entries, not copies.
pub fn auto_message(diff: &DeckDiff) -> String {
    let summary = diff.summary();
    if summary.total() == 0 {
        return "No changes".to_string();
    }

    let mut parts = Vec::with_capacity(3);
    if summary.added > 0 {
        parts.push(format!("+{}", cards(summary.added)));
    }
    if summary.removed > 0 {
        parts.push(format!("-{}", cards(summary.removed)));
    }
    if summary.modified > 0 {
        parts.push(format!("{} modified", summary.modified));
    }
    parts.join(", ")
}

fn cards(count: usize) -> String {
    if count == 1 {
        "1 card".to_string()
    } else {
        format!("{count} cards")
    }
}

/// Trim a user-supplied message and check it holds 1..=`max_len` characters
pub fn validate_manual_message(message: &str, max_len: usize) -> Result<String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "commit message must not be empty".to_string(),
        ));
    }

    let length = trimmed.chars().count();
    if length > max_len {
        return Err(Error::InvalidInput(format!(
            "commit message is {length} characters, the limit is {max_len}"
        )));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_diff;
    use crate::models::{DeckFormat, DeckSnapshot};

    fn deck(cards: &[(&str, u32)]) -> DeckSnapshot {
        let mut builder = DeckSnapshot::builder(DeckFormat::Riftbound);
        for (id, quantity) in cards {
            builder = builder.add("main", id, "", *quantity).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn summarizes_every_kind_of_change() {
        let old = deck(&[("A", 2), ("B", 1), ("C", 1)]);
        let new = deck(&[("A", 3), ("D", 1), ("E", 2)]);
        let diff = compute_diff(&old, &new).unwrap();
        assert_eq!(auto_message(&diff), "+2 cards, -2 cards, 1 modified");
    }

    #[test]
    fn singular_and_empty_messages() {
        let old = deck(&[("A", 1)]);
        let new = deck(&[("B", 1)]);
        let diff = compute_diff(&old, &new).unwrap();
        assert_eq!(auto_message(&diff), "+1 card, -1 card");

        let unchanged = compute_diff(&old, &old).unwrap();
        assert_eq!(auto_message(&unchanged), "No changes");
    }

    #[test]
    fn manual_message_is_trimmed() {
        assert_eq!(
            validate_manual_message("  Cut the rune ramp  ", 500).unwrap(),
            "Cut the rune ramp"
        );
    }

    #[test]
    fn manual_message_bounds() {
        assert!(validate_manual_message("   ", 500).is_err());
        assert!(validate_manual_message(&"x".repeat(500), 500).is_ok());
        assert!(validate_manual_message(&"x".repeat(501), 500).is_err());
        // Limit counts characters, not bytes
        assert!(validate_manual_message(&"é".repeat(500), 500).is_ok());
    }
}
