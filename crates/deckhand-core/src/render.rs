//! Human-readable diff and conflict output

use std::collections::HashMap;

use crate::cards::{resolve_names, CardDirectory};
use crate::diff::DeckDiff;
use crate::merge::{ConflictKind, ConflictSet};
use crate::models::CardId;

/// Directory names take precedence, then the name stored in the deck, then
/// the bare id.
fn label(names: &HashMap<CardId, String>, id: &CardId, embedded: &str) -> String {
    let name = names
        .get(id)
        .map(String::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(embedded);
    if name.is_empty() || name == id.as_str() {
        id.to_string()
    } else {
        format!("{name} ({id})")
    }
}

/// One line per change, grouped under a `[zone]` header
pub fn render_diff_lines(diff: &DeckDiff, names: &HashMap<CardId, String>) -> Vec<String> {
    if diff.is_empty() {
        return vec!["No changes".to_string()];
    }

    let mut lines = Vec::new();
    for (zone, changes) in &diff.zones {
        lines.push(format!("[{zone}]"));
        for card in &changes.added {
            lines.push(format!(
                "  + {}x {}",
                card.quantity,
                label(names, &card.id, &card.name)
            ));
        }
        for card in &changes.removed {
            lines.push(format!(
                "  - {}x {}",
                card.quantity,
                label(names, &card.id, &card.name)
            ));
        }
        for change in &changes.modified {
            lines.push(format!(
                "  ~ {}: {} -> {}",
                label(names, &change.id, &change.name),
                change.old_count,
                change.new_count
            ));
        }
    }
    lines
}

/// One line per conflict with the three competing quantities
pub fn render_conflict_lines(
    conflicts: &ConflictSet,
    names: &HashMap<CardId, String>,
) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            let note = match conflict.kind {
                ConflictKind::Divergent => "",
                ConflictKind::Capacity => " [zone capacity]",
            };
            format!(
                "[{}] {}: base {}, source {}, target {}{note}",
                conflict.zone,
                label(names, &conflict.card_id, &conflict.name),
                conflict.base,
                conflict.source,
                conflict.target
            )
        })
        .collect()
}

/// Resolve names for every card in `diff`, then render it
pub async fn describe_diff<D: CardDirectory>(directory: &D, diff: &DeckDiff) -> Vec<String> {
    let ids = diff.zones.values().flat_map(|zone| {
        zone.added
            .iter()
            .chain(&zone.removed)
            .map(|card| &card.id)
            .chain(zone.modified.iter().map(|change| &change.id))
    });
    let names = resolve_names(directory, ids).await;
    render_diff_lines(diff, &names)
}

/// Resolve names for every conflicting card, then render the conflicts
pub async fn describe_conflicts<D: CardDirectory>(
    directory: &D,
    conflicts: &ConflictSet,
) -> Vec<String> {
    let names = resolve_names(directory, conflicts.iter().map(|conflict| &conflict.card_id)).await;
    render_conflict_lines(conflicts, &names)
}
