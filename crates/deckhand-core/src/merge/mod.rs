//! Three-way deck merge
//!
//! Compares `source` and `target` against their common ancestor `base`, card
//! by card. A side that left a card's quantity at its base value defers to the
//! other side; identical changes on both sides converge. Only divergent
//! changes become conflicts.
//!
//! Conflicting entries keep their base quantity in the auto-merged snapshot
//! until a resolution is applied. If per-card merging would push a zone past
//! its capacity, every changed card in that zone becomes a capacity conflict
//! and the zone keeps its base contents, so the auto-merged snapshot is always
//! valid.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::apply::Resolutions;
use crate::error::{Error, Result};
use crate::models::{CardId, CardRef, DeckSnapshot, Zone};

/// Why an entry could not be merged automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides changed the quantity to different values
    Divergent,
    /// Combining both sides would exceed the zone's capacity
    Capacity,
}

/// A side of a three-way merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Base,
    Source,
    Target,
}

/// One entry needing manual resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub zone: String,
    pub card_id: CardId,
    #[serde(default)]
    pub name: String,
    pub base: u32,
    pub source: u32,
    pub target: u32,
    pub kind: ConflictKind,
}

impl Conflict {
    /// Quantity chosen by picking one side
    pub const fn quantity_for(&self, side: Side) -> u32 {
        match side {
            Side::Base => self.base,
            Side::Source => self.source,
            Side::Target => self.target,
        }
    }
}

/// Conflicts sorted by `(zone, card_id)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictSet {
    entries: Vec<Conflict>,
}

impl ConflictSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.entries.iter()
    }

    /// Conflict for a specific entry
    pub fn get(&self, zone: &str, card_id: &CardId) -> Option<&Conflict> {
        self.entries
            .iter()
            .find(|conflict| conflict.zone == zone && &conflict.card_id == card_id)
    }

    /// Conflicts within one zone
    pub fn in_zone<'a>(&'a self, zone: &'a str) -> impl Iterator<Item = &'a Conflict> + 'a {
        self.entries.iter().filter(move |conflict| conflict.zone == zone)
    }

    /// Resolve every conflict by taking one side's quantity
    pub fn resolve_all(&self, side: Side) -> Resolutions {
        let mut resolutions = Resolutions::new();
        for conflict in &self.entries {
            resolutions.insert(
                conflict.zone.clone(),
                conflict.card_id.clone(),
                conflict.quantity_for(side),
            );
        }
        resolutions
    }

    fn push(&mut self, conflict: Conflict) {
        self.entries.push(conflict);
    }

    fn sort(&mut self) {
        self.entries
            .sort_by(|left, right| (&left.zone, &left.card_id).cmp(&(&right.zone, &right.card_id)));
    }
}

impl<'a> IntoIterator for &'a ConflictSet {
    type Item = &'a Conflict;
    type IntoIter = std::slice::Iter<'a, Conflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Result of a three-way comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub conflicts: ConflictSet,
    /// Conflict-free merge; conflicting entries hold their base value
    pub auto_merged: DeckSnapshot,
}

impl MergeOutcome {
    /// True if merge is clean (no conflicts)
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

enum CardMerge {
    Clean(u32),
    Divergent,
}

/// Per-card three-way rule. Quantities are compared by value.
const fn merge_quantity(base: u32, source: u32, target: u32) -> CardMerge {
    if source == base {
        CardMerge::Clean(target)
    } else if target == base || source == target {
        CardMerge::Clean(source)
    } else {
        CardMerge::Divergent
    }
}

/// Detect conflicts between `source` and `target` relative to `base`.
pub fn detect_conflicts(
    base: &DeckSnapshot,
    source: &DeckSnapshot,
    target: &DeckSnapshot,
) -> Result<MergeOutcome> {
    for other in [source, target] {
        if other.format() != base.format() {
            return Err(Error::FormatMismatch {
                expected: base.format(),
                found: other.format(),
            });
        }
    }

    let empty = Zone::default();
    let zone_names: BTreeSet<&str> = base
        .zones()
        .chain(source.zones())
        .chain(target.zones())
        .map(|(name, _)| name)
        .collect();

    let mut conflicts = ConflictSet::default();
    let mut merged_zones = BTreeMap::new();

    for name in zone_names {
        let spec = base.format().zone_spec(name)?;
        let sides = ZoneSides {
            base: base.zone(name).unwrap_or(&empty),
            source: source.zone(name).unwrap_or(&empty),
            target: target.zone(name).unwrap_or(&empty),
        };

        let (mut zone, mut zone_conflicts) = sides.merge(name);

        if let Some(capacity) = spec.capacity {
            if zone.total() > u64::from(capacity) {
                tracing::debug!(zone = name, capacity, "Auto-merge exceeds zone capacity");
                zone = sides.base.clone();
                zone_conflicts = sides.capacity_conflicts(name);
            }
        }

        for conflict in zone_conflicts {
            conflicts.push(conflict);
        }
        merged_zones.insert(name.to_string(), zone);
    }

    conflicts.sort();
    let auto_merged =
        DeckSnapshot::from_zones(base.format(), target.schema_version(), merged_zones)?;

    tracing::debug!(conflicts = conflicts.len(), "Detected merge conflicts");
    Ok(MergeOutcome {
        conflicts,
        auto_merged,
    })
}

struct ZoneSides<'a> {
    base: &'a Zone,
    source: &'a Zone,
    target: &'a Zone,
}

impl ZoneSides<'_> {
    fn card_ids(&self) -> BTreeSet<&CardId> {
        self.base
            .card_ids()
            .chain(self.source.card_ids())
            .chain(self.target.card_ids())
            .collect()
    }

    /// Name from whichever side still knows the card
    fn name_of(&self, id: &CardId) -> String {
        [self.source, self.target, self.base]
            .iter()
            .find_map(|zone| zone.get(id))
            .map(|card| card.name.clone())
            .unwrap_or_default()
    }

    fn conflict(&self, zone: &str, id: &CardId, kind: ConflictKind) -> Conflict {
        Conflict {
            zone: zone.to_string(),
            card_id: id.clone(),
            name: self.name_of(id),
            base: self.base.quantity(id),
            source: self.source.quantity(id),
            target: self.target.quantity(id),
            kind,
        }
    }

    fn merge(&self, zone: &str) -> (Zone, Vec<Conflict>) {
        let mut merged = Zone::default();
        let mut conflicts = Vec::new();

        for id in self.card_ids() {
            let (base, source, target) = (
                self.base.quantity(id),
                self.source.quantity(id),
                self.target.quantity(id),
            );
            let quantity = match merge_quantity(base, source, target) {
                CardMerge::Clean(quantity) => quantity,
                CardMerge::Divergent => {
                    conflicts.push(self.conflict(zone, id, ConflictKind::Divergent));
                    base
                }
            };
            merged.set(CardRef::new(id.clone(), self.name_of(id), quantity));
        }

        (merged, conflicts)
    }

    fn capacity_conflicts(&self, zone: &str) -> Vec<Conflict> {
        self.card_ids()
            .into_iter()
            .filter(|id| {
                let base = self.base.quantity(id);
                self.source.quantity(id) != base || self.target.quantity(id) != base
            })
            .map(|id| {
                let kind = if matches!(
                    merge_quantity(
                        self.base.quantity(id),
                        self.source.quantity(id),
                        self.target.quantity(id),
                    ),
                    CardMerge::Divergent
                ) {
                    ConflictKind::Divergent
                } else {
                    ConflictKind::Capacity
                };
                self.conflict(zone, id, kind)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeckFormat;
    use pretty_assertions::assert_eq;

    fn deck(format: DeckFormat, zones: &[(&str, &[(&str, u32)])]) -> DeckSnapshot {
        let mut builder = DeckSnapshot::builder(format);
        for (zone, cards) in zones {
            for (id, quantity) in *cards {
                builder = builder.add(*zone, id, "", *quantity).unwrap();
            }
        }
        builder.build().unwrap()
    }

    fn main(cards: &[(&str, u32)]) -> DeckSnapshot {
        deck(DeckFormat::Riftbound, &[("main", cards)])
    }

    fn id(value: &str) -> CardId {
        CardId::new(value).unwrap()
    }

    #[test]
    fn convergent_edit_is_not_a_conflict() {
        let base = main(&[("A", 1)]);
        let source = main(&[("A", 3)]);
        let target = main(&[("A", 3)]);

        let outcome = detect_conflicts(&base, &source, &target).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.auto_merged, main(&[("A", 3)]));
    }

    #[test]
    fn divergent_edit_is_a_conflict() {
        let base = main(&[("A", 1)]);
        let source = main(&[("A", 3)]);
        let target = main(&[("A", 5)]);

        let outcome = detect_conflicts(&base, &source, &target).unwrap();
        assert_eq!(outcome.conflicts.len(), 1);
        let conflict = outcome.conflicts.get("main", &id("A")).unwrap();
        assert_eq!(
            (conflict.base, conflict.source, conflict.target),
            (1, 3, 5)
        );
        assert_eq!(conflict.kind, ConflictKind::Divergent);
        // Placeholder keeps the base quantity.
        assert_eq!(outcome.auto_merged.quantity("main", &id("A")), 1);
    }

    #[test]
    fn removal_against_modification_is_a_conflict() {
        let base = main(&[("A", 2)]);
        let source = main(&[]);
        let target = main(&[("A", 3)]);

        let outcome = detect_conflicts(&base, &source, &target).unwrap();
        let conflict = outcome.conflicts.get("main", &id("A")).unwrap();
        assert_eq!((conflict.source, conflict.target), (0, 3));
    }

    #[test]
    fn only_one_side_changed_takes_that_side() {
        let base = main(&[("A", 1), ("B", 2)]);
        let changed = main(&[("A", 2), ("C", 1)]);

        let target_only = detect_conflicts(&base, &base, &changed).unwrap();
        assert!(target_only.is_clean());
        assert_eq!(target_only.auto_merged, changed);

        let source_only = detect_conflicts(&base, &changed, &base).unwrap();
        assert!(source_only.is_clean());
        assert_eq!(source_only.auto_merged, changed);
    }

    #[test]
    fn identical_sides_merge_cleanly() {
        let base = main(&[("A", 1)]);
        let side = main(&[("A", 4), ("Z", 1)]);

        let outcome = detect_conflicts(&base, &side, &side).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.auto_merged, side);
    }

    #[test]
    fn independent_edits_combine() {
        let base = main(&[("A", 1), ("B", 1)]);
        let source = main(&[("A", 2), ("B", 1)]);
        let target = main(&[("A", 1), ("C", 3)]);

        let outcome = detect_conflicts(&base, &source, &target).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.auto_merged, main(&[("A", 2), ("C", 3)]));
    }

    #[test]
    fn conflicts_land_in_correct_zone_and_order() {
        let base = deck(
            DeckFormat::Riftbound,
            &[("main", &[("A", 1), ("B", 1)]), ("sideboard", &[("A", 1)])],
        );
        let source = deck(
            DeckFormat::Riftbound,
            &[("main", &[("A", 2), ("B", 2)]), ("sideboard", &[("A", 2)])],
        );
        let target = deck(
            DeckFormat::Riftbound,
            &[("main", &[("A", 3), ("B", 3)]), ("sideboard", &[("A", 1)])],
        );

        let outcome = detect_conflicts(&base, &source, &target).unwrap();
        let keys: Vec<(&str, &str)> = outcome
            .conflicts
            .iter()
            .map(|c| (c.zone.as_str(), c.card_id.as_str()))
            .collect();
        assert_eq!(keys, vec![("main", "A"), ("main", "B")]);
        assert_eq!(outcome.auto_merged.quantity("sideboard", &id("A")), 2);
    }

    #[test]
    fn competing_legends_become_capacity_conflicts() {
        let base = deck(DeckFormat::Riftbound, &[]);
        let source = deck(DeckFormat::Riftbound, &[("legend", &[("jinx", 1)])]);
        let target = deck(DeckFormat::Riftbound, &[("legend", &[("annie", 1)])]);

        let outcome = detect_conflicts(&base, &source, &target).unwrap();
        assert_eq!(outcome.conflicts.len(), 2);
        assert!(outcome
            .conflicts
            .iter()
            .all(|conflict| conflict.kind == ConflictKind::Capacity));
        assert!(outcome.auto_merged.zone("legend").is_none());
    }

    #[test]
    fn resolve_all_picks_requested_side() {
        let base = main(&[("A", 1)]);
        let source = main(&[("A", 3)]);
        let target = main(&[("A", 5)]);

        let outcome = detect_conflicts(&base, &source, &target).unwrap();
        let resolutions = outcome.conflicts.resolve_all(Side::Target);
        assert_eq!(resolutions.get("main", &id("A")), Some(5));
        assert!(resolutions.covers(&outcome.conflicts));
    }

    #[test]
    fn format_mismatch_is_rejected() {
        let riftbound = DeckSnapshot::empty(DeckFormat::Riftbound);
        let commander = DeckSnapshot::empty(DeckFormat::Commander);
        assert!(matches!(
            detect_conflicts(&riftbound, &riftbound, &commander),
            Err(Error::FormatMismatch { .. })
        ));
    }
}
