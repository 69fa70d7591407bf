//! Diff and resolution application
//!
//! The applier is mechanical: it writes the quantities a diff or resolution
//! names and re-validates the result. It does not check that a diff's old
//! counts match the input, and it does not enforce per-card copy limits.

use std::collections::BTreeMap;

use crate::diff::DeckDiff;
use crate::error::{Error, Result};
use crate::merge::ConflictSet;
use crate::models::{CardId, CardRef, DeckSnapshot};

/// User choices for conflicting entries, keyed by `(zone, card_id)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolutions {
    entries: BTreeMap<(String, CardId), u32>,
}

impl Resolutions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose a quantity for an entry, replacing any earlier choice
    pub fn insert(&mut self, zone: impl Into<String>, card_id: CardId, quantity: u32) {
        self.entries.insert((zone.into(), card_id), quantity);
    }

    #[must_use]
    pub fn with(mut self, zone: impl Into<String>, card_id: CardId, quantity: u32) -> Self {
        self.insert(zone, card_id, quantity);
        self
    }

    pub fn get(&self, zone: &str, card_id: &CardId) -> Option<u32> {
        self.entries
            .get(&(zone.to_string(), card_id.clone()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layer `other` on top of these choices
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// True when every conflict has a chosen quantity
    pub fn covers(&self, conflicts: &ConflictSet) -> bool {
        self.unresolved(conflicts) == 0
    }

    /// Number of conflicts without a chosen quantity
    pub fn unresolved(&self, conflicts: &ConflictSet) -> usize {
        conflicts
            .iter()
            .filter(|conflict| self.get(&conflict.zone, &conflict.card_id).is_none())
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CardId, u32)> {
        self.entries
            .iter()
            .map(|((zone, card_id), quantity)| (zone.as_str(), card_id, *quantity))
    }
}

/// Apply a diff to a snapshot, producing a new snapshot.
pub fn apply_diff(snapshot: &DeckSnapshot, diff: &DeckDiff) -> Result<DeckSnapshot> {
    if snapshot.format() != diff.format {
        return Err(Error::FormatMismatch {
            expected: snapshot.format(),
            found: diff.format,
        });
    }

    let mut zones = snapshot.zone_map().clone();

    for (name, zone_diff) in &diff.zones {
        snapshot
            .format()
            .zone_spec(name)
            .map_err(|error| Error::DiffApplication(error.to_string()))?;
        let zone = zones.entry(name.clone()).or_default();

        for card in &zone_diff.added {
            zone.set(card.clone());
        }
        for change in &zone_diff.modified {
            zone.set(CardRef::new(
                change.id.clone(),
                change.name.clone(),
                change.new_count,
            ));
        }
        for card in &zone_diff.removed {
            zone.set(CardRef::new(card.id.clone(), card.name.clone(), 0));
        }
    }

    DeckSnapshot::from_zones(snapshot.format(), snapshot.schema_version(), zones)
        .map_err(|error| Error::DiffApplication(error.to_string()))
}

/// Overwrite conflicting quantities in an auto-merged snapshot.
///
/// Entries not named in `resolutions` keep their auto-merged value.
pub fn apply_resolution(
    auto_merged: &DeckSnapshot,
    resolutions: &Resolutions,
) -> Result<DeckSnapshot> {
    let mut zones = auto_merged.zone_map().clone();

    for (zone_name, card_id, quantity) in resolutions.iter() {
        auto_merged
            .format()
            .zone_spec(zone_name)
            .map_err(|error| Error::DiffApplication(error.to_string()))?;
        let zone = zones.entry(zone_name.to_string()).or_default();
        let name = zone
            .get(card_id)
            .map(|card| card.name.clone())
            .unwrap_or_default();
        zone.set(CardRef::new(card_id.clone(), name, quantity));
    }

    DeckSnapshot::from_zones(auto_merged.format(), auto_merged.schema_version(), zones)
        .map_err(|error| Error::DiffApplication(error.to_string()))
}

/// Apply resolutions after checking that none of `conflicts` is left open.
pub fn resolve_merge(
    auto_merged: &DeckSnapshot,
    conflicts: &ConflictSet,
    resolutions: &Resolutions,
) -> Result<DeckSnapshot> {
    let count = resolutions.unresolved(conflicts);
    if count > 0 {
        return Err(Error::UnresolvedConflicts { count });
    }
    apply_resolution(auto_merged, resolutions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_diff;
    use crate::merge::{detect_conflicts, Side};
    use crate::models::DeckFormat;
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
    fn applying_computed_diff_reproduces_target() {
        let pairs = [
            (
                deck(&[("main", &[("A", 2), ("B", 1)])]),
                deck(&[("main", &[("A", 2), ("C", 3)])]),
            ),
            (
                deck(&[("main", &[("A", 2)]), ("legend", &[("jinx", 1)])]),
                deck(&[("main", &[("A", 5)]), ("legend", &[("annie", 1)])]),
            ),
            (
                deck(&[("runes", &[("fury", 6), ("calm", 6)])]),
                deck(&[("sideboard", &[("X", 1)])]),
            ),
            (deck(&[]), deck(&[("battlefields", &[("b1", 1), ("b2", 1), ("b3", 1)])])),
        ];

        for (a, b) in &pairs {
            let diff = compute_diff(a, b).unwrap();
            assert_eq!(&apply_diff(a, &diff).unwrap(), b);
        }
    }

    #[test]
    fn applying_reversed_diff_restores_original() {
        let a = deck(&[("main", &[("A", 2), ("B", 1)])]);
        let b = deck(&[("main", &[("A", 3), ("C", 1)])]);
        let diff = compute_diff(&a, &b).unwrap();
        assert_eq!(apply_diff(&b, &diff.reversed()).unwrap(), a);
    }

    #[test]
    fn diff_exceeding_capacity_fails() {
        let base = deck(&[("legend", &[("jinx", 1)])]);
        let other = deck(&[("legend", &[("annie", 1)])]);
        let mut diff = compute_diff(&base, &other).unwrap();
        // Keep the addition, drop the removal.
        diff.zones.get_mut("legend").unwrap().removed.clear();

        assert!(matches!(
            apply_diff(&base, &diff),
            Err(Error::DiffApplication(_))
        ));
    }

    #[test]
    fn diff_with_other_format_fails() {
        let deck = DeckSnapshot::empty(DeckFormat::Commander);
        let diff = DeckDiff::empty(DeckFormat::Riftbound);
        assert!(matches!(
            apply_diff(&deck, &diff),
            Err(Error::FormatMismatch { .. })
        ));
    }

    #[test]
    fn resolution_overrides_only_named_entries() {
        let base = deck(&[("main", &[("A", 1), ("B", 1)])]);
        let source = deck(&[("main", &[("A", 3), ("B", 2)])]);
        let target = deck(&[("main", &[("A", 5), ("B", 1)])]);

        let outcome = detect_conflicts(&base, &source, &target).unwrap();
        let resolutions = Resolutions::new().with("main", id("A"), 4);
        let merged = apply_resolution(&outcome.auto_merged, &resolutions).unwrap();

        assert_eq!(merged, deck(&[("main", &[("A", 4), ("B", 2)])]));
        assert_eq!(merged.card("main", &id("A")).unwrap().name, "Card A");
    }

    #[test]
    fn resolution_is_revalidated() {
        let base = deck(&[]);
        let source = deck(&[("legend", &[("jinx", 1)])]);
        let target = deck(&[("legend", &[("annie", 1)])]);
        let outcome = detect_conflicts(&base, &source, &target).unwrap();

        let both = Resolutions::new()
            .with("legend", id("jinx"), 1)
            .with("legend", id("annie"), 1);
        assert!(matches!(
            apply_resolution(&outcome.auto_merged, &both),
            Err(Error::DiffApplication(_))
        ));

        let pick_source = outcome.conflicts.resolve_all(Side::Source);
        let merged = apply_resolution(&outcome.auto_merged, &pick_source).unwrap();
        assert_eq!(merged, source);
    }

    #[test]
    fn resolve_merge_rejects_open_conflicts() {
        let base = deck(&[("main", &[("A", 1), ("B", 1)])]);
        let source = deck(&[("main", &[("A", 3), ("B", 2)])]);
        let target = deck(&[("main", &[("A", 5), ("B", 4)])]);
        let outcome = detect_conflicts(&base, &source, &target).unwrap();

        let partial = Resolutions::new().with("main", id("A"), 3);
        assert!(matches!(
            resolve_merge(&outcome.auto_merged, &outcome.conflicts, &partial),
            Err(Error::UnresolvedConflicts { count: 1 })
        ));

        let complete = partial.with("main", id("B"), 4);
        let merged = resolve_merge(&outcome.auto_merged, &outcome.conflicts, &complete).unwrap();
        assert_eq!(merged, deck(&[("main", &[("A", 3), ("B", 4)])]));
    }
}
