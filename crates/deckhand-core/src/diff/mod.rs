//! Structured deck diff
//!
//! Compares two snapshots of the same format zone by zone. Every card id that
//! differs lands in exactly one of `added`, `removed` or `modified`; unchanged
//! cards never appear. Lists are sorted by card id so output is reproducible.
//!
//! Single-slot zones use the same algorithm: replacing a legend is one
//! `removed` entry plus one `added` entry.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::models::{CardId, CardRef, DeckFormat, DeckSnapshot, Zone};

/// A card whose quantity changed between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChange {
    pub id: CardId,
    #[serde(default)]
    pub name: String,
    pub old_count: u32,
    pub new_count: u32,
}

impl QuantityChange {
    /// Signed change in copies
    pub fn delta(&self) -> i64 {
        i64::from(self.new_count) - i64::from(self.old_count)
    }
}

/// Changes within a single zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDiff {
    /// Cards absent in the old snapshot, carrying their new quantity
    pub added: Vec<CardRef>,
    /// Cards absent in the new snapshot, carrying their old quantity
    pub removed: Vec<CardRef>,
    pub modified: Vec<QuantityChange>,
}

impl ZoneDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    fn reversed(&self) -> Self {
        Self {
            added: self.removed.clone(),
            removed: self.added.clone(),
            modified: self
                .modified
                .iter()
                .map(|change| QuantityChange {
                    id: change.id.clone(),
                    name: change.name.clone(),
                    old_count: change.new_count,
                    new_count: change.old_count,
                })
                .collect(),
        }
    }
}

/// Entry counts across all zones of a diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

impl DiffSummary {
    pub const fn total(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

/// Difference between two snapshots. Zones without changes are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckDiff {
    pub format: DeckFormat,
    pub zones: BTreeMap<String, ZoneDiff>,
}

impl DeckDiff {
    /// A diff with no changes
    #[must_use]
    pub const fn empty(format: DeckFormat) -> Self {
        Self {
            format,
            zones: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.zones.values().all(ZoneDiff::is_empty)
    }

    /// Changes for one zone, if any
    pub fn zone(&self, name: &str) -> Option<&ZoneDiff> {
        self.zones.get(name)
    }

    pub fn summary(&self) -> DiffSummary {
        self.zones
            .values()
            .fold(DiffSummary::default(), |summary, zone| DiffSummary {
                added: summary.added + zone.added.len(),
                removed: summary.removed + zone.removed.len(),
                modified: summary.modified + zone.modified.len(),
            })
    }

    /// The diff that undoes this one
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            format: self.format,
            zones: self
                .zones
                .iter()
                .map(|(name, zone)| (name.clone(), zone.reversed()))
                .collect(),
        }
    }
}

/// Compute the structured difference from `old` to `new`.
pub fn compute_diff(old: &DeckSnapshot, new: &DeckSnapshot) -> Result<DeckDiff> {
    if old.format() != new.format() {
        return Err(Error::FormatMismatch {
            expected: old.format(),
            found: new.format(),
        });
    }

    let empty = Zone::default();
    let zone_names: BTreeSet<&str> = old
        .zones()
        .chain(new.zones())
        .map(|(name, _)| name)
        .collect();

    let mut zones = BTreeMap::new();
    for name in zone_names {
        let old_zone = old.zone(name).unwrap_or(&empty);
        let new_zone = new.zone(name).unwrap_or(&empty);
        let zone_diff = diff_zone(old_zone, new_zone);
        if !zone_diff.is_empty() {
            zones.insert(name.to_string(), zone_diff);
        }
    }

    let diff = DeckDiff {
        format: old.format(),
        zones,
    };
    let summary = diff.summary();
    tracing::debug!(
        added = summary.added,
        removed = summary.removed,
        modified = summary.modified,
        "Computed deck diff"
    );
    Ok(diff)
}

fn diff_zone(old: &Zone, new: &Zone) -> ZoneDiff {
    // Both sides iterate in card-id order, so the merged set keeps that order.
    let card_ids: BTreeSet<&CardId> = old.card_ids().chain(new.card_ids()).collect();
    let mut diff = ZoneDiff::default();

    for id in card_ids {
        match (old.get(id), new.get(id)) {
            (None, Some(added)) => diff.added.push(added.clone()),
            (Some(removed), None) => diff.removed.push(removed.clone()),
            (Some(before), Some(after)) if before.quantity != after.quantity => {
                diff.modified.push(QuantityChange {
                    id: id.clone(),
                    name: after.name.clone(),
                    old_count: before.quantity,
                    new_count: after.quantity,
                });
            }
            _ => {}
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn deck(zones: &[(&str, &[(&str, u32)])]) -> DeckSnapshot {
        let mut builder = DeckSnapshot::builder(DeckFormat::Riftbound);
        for (zone, cards) in zones {
            for (id, quantity) in *cards {
                builder = builder.add(*zone, id, format!("Card {id}"), *quantity).unwrap();
            }
        }
        builder.build().unwrap()
    }

    fn id(value: &str) -> CardId {
        CardId::new(value).unwrap()
    }

    #[test]
    fn removed_and_added_cards() {
        let old = deck(&[("main", &[("A", 2), ("B", 1)])]);
        let new = deck(&[("main", &[("A", 2), ("C", 3)])]);

        let diff = compute_diff(&old, &new).unwrap();
        let main = diff.zone("main").unwrap();

        assert_eq!(main.removed.len(), 1);
        assert_eq!(main.removed[0].id, id("B"));
        assert_eq!(main.removed[0].quantity, 1);
        assert_eq!(main.added.len(), 1);
        assert_eq!(main.added[0].id, id("C"));
        assert_eq!(main.added[0].quantity, 3);
        assert!(main.modified.is_empty());
    }

    #[test]
    fn quantity_change_is_modified() {
        let old = deck(&[("main", &[("A", 2)])]);
        let new = deck(&[("main", &[("A", 5)])]);

        let diff = compute_diff(&old, &new).unwrap();
        assert_eq!(
            diff.zone("main").unwrap().modified,
            vec![QuantityChange {
                id: id("A"),
                name: "Card A".to_string(),
                old_count: 2,
                new_count: 5,
            }]
        );
        assert_eq!(diff.zone("main").unwrap().modified[0].delta(), 3);
    }

    #[test]
    fn identical_snapshots_produce_empty_diff() {
        let a = deck(&[("main", &[("A", 2), ("B", 1)]), ("runes", &[("fury", 6)])]);
        let diff = compute_diff(&a, &a).unwrap();
        assert!(diff.is_empty());
        assert!(diff.zones.is_empty());
        assert_eq!(diff.summary().total(), 0);
    }

    #[test]
    fn replacing_single_slot_card_is_remove_plus_add() {
        let old = deck(&[("legend", &[("jinx", 1)])]);
        let new = deck(&[("legend", &[("annie", 1)])]);

        let diff = compute_diff(&old, &new).unwrap();
        let legend = diff.zone("legend").unwrap();
        assert_eq!(legend.removed[0].id, id("jinx"));
        assert_eq!(legend.added[0].id, id("annie"));
        assert!(legend.modified.is_empty());
    }

    #[test]
    fn zone_present_on_one_side_only() {
        let old = deck(&[("main", &[("A", 1)])]);
        let new = deck(&[("main", &[("A", 1)]), ("sideboard", &[("S", 2)])]);

        let diff = compute_diff(&old, &new).unwrap();
        assert!(diff.zone("main").is_none());
        assert_eq!(diff.zone("sideboard").unwrap().added.len(), 1);
    }

    #[test]
    fn entries_are_sorted_and_mutually_exclusive() {
        let old = deck(&[("main", &[("d", 1), ("b", 1), ("z", 2), ("m", 1)])]);
        let new = deck(&[("main", &[("a", 1), ("c", 1), ("z", 3), ("m", 2)])]);

        let first = compute_diff(&old, &new).unwrap();
        let second = compute_diff(&old, &new).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        let main = first.zone("main").unwrap();
        let added: Vec<&str> = main.added.iter().map(|c| c.id.as_str()).collect();
        let removed: Vec<&str> = main.removed.iter().map(|c| c.id.as_str()).collect();
        let modified: Vec<&str> = main.modified.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(added, vec!["a", "c"]);
        assert_eq!(removed, vec!["b", "d"]);
        assert_eq!(modified, vec!["m", "z"]);

        let mut seen = BTreeSet::new();
        for card in added.iter().chain(&removed).chain(&modified) {
            assert!(seen.insert(*card), "{card} listed twice");
        }
    }

    #[test]
    fn format_mismatch_is_rejected() {
        let riftbound = DeckSnapshot::empty(DeckFormat::Riftbound);
        let commander = DeckSnapshot::empty(DeckFormat::Commander);
        assert!(matches!(
            compute_diff(&riftbound, &commander),
            Err(Error::FormatMismatch { .. })
        ));
    }

    #[test]
    fn reversed_diff_swaps_sides() {
        let old = deck(&[("main", &[("A", 2), ("B", 1)])]);
        let new = deck(&[("main", &[("A", 4), ("C", 1)])]);

        let forward = compute_diff(&old, &new).unwrap();
        let backward = compute_diff(&new, &old).unwrap();
        assert_eq!(forward.reversed().summary(), backward.summary());
        assert_eq!(
            forward.reversed().zone("main").unwrap().removed[0].id,
            id("C")
        );
    }

    #[test]
    fn summary_counts_entries() {
        let old = deck(&[("main", &[("A", 2), ("B", 1)]), ("runes", &[("calm", 6)])]);
        let new = deck(&[("main", &[("A", 3), ("C", 1), ("D", 2)]), ("runes", &[("calm", 6)])]);

        let summary = compute_diff(&old, &new).unwrap().summary();
        assert_eq!(
            summary,
            DiffSummary {
                added: 2,
                removed: 1,
                modified: 1,
            }
        );
    }
}
