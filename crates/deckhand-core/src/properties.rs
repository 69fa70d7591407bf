//! Property checks for diff, merge and apply over generated Riftbound decks.
//!
//! Only unbounded zones are generated, so zone capacity never interferes with
//! the quantity-level properties checked here.

use std::collections::{BTreeMap, BTreeSet};

use proptest::collection::btree_map;
use proptest::prelude::*;

use crate::apply::{apply_diff, apply_resolution};
use crate::codec;
use crate::diff::compute_diff;
use crate::merge::{detect_conflicts, MergeOutcome, Side};
use crate::models::{CardId, DeckFormat, DeckSnapshot};

const ZONES: &[&str] = &["main", "runes", "sideboard"];
const CARDS: &[&str] = &["OGN-001", "OGN-002", "OGN-003", "OGN-004", "OGN-005", "OGN-006"];

/// `(zone index, card index) -> quantity`, zero quantities included
type Entries = BTreeMap<(usize, usize), u32>;

fn entries_strategy() -> impl Strategy<Value = Entries> {
    btree_map((0..ZONES.len(), 0..CARDS.len()), 0u32..5, 0..12)
}

fn build(entries: &Entries) -> DeckSnapshot {
    let mut builder = DeckSnapshot::builder(DeckFormat::Riftbound);
    for (&(zone, card), &quantity) in entries {
        builder = builder
            .add(ZONES[zone], CARDS[card], format!("Card {}", CARDS[card]), quantity)
            .unwrap();
    }
    builder.build().unwrap()
}

fn deck_strategy() -> impl Strategy<Value = DeckSnapshot> {
    entries_strategy().prop_map(|entries| build(&entries))
}

fn conflict_keys(outcome: &MergeOutcome) -> BTreeSet<(String, CardId)> {
    outcome
        .conflicts
        .iter()
        .map(|conflict| (conflict.zone.clone(), conflict.card_id.clone()))
        .collect()
}

proptest! {
    #[test]
    fn diff_against_itself_is_empty(deck in deck_strategy()) {
        prop_assert!(compute_diff(&deck, &deck).unwrap().is_empty());
    }

    #[test]
    fn applying_a_diff_reaches_the_new_deck(old in deck_strategy(), new in deck_strategy()) {
        let diff = compute_diff(&old, &new).unwrap();
        prop_assert_eq!(apply_diff(&old, &diff).unwrap(), new.clone());
        prop_assert_eq!(apply_diff(&new, &diff.reversed()).unwrap(), old);
    }

    #[test]
    fn merge_ignores_side_order(
        base in deck_strategy(),
        source in deck_strategy(),
        target in deck_strategy()
    ) {
        let forward = detect_conflicts(&base, &source, &target).unwrap();
        let backward = detect_conflicts(&base, &target, &source).unwrap();
        prop_assert_eq!(conflict_keys(&forward), conflict_keys(&backward));
        prop_assert_eq!(forward.auto_merged, backward.auto_merged);
    }

    #[test]
    fn unchanged_side_yields_the_other(base in deck_strategy(), changed in deck_strategy()) {
        let outcome = detect_conflicts(&base, &base, &changed).unwrap();
        prop_assert!(outcome.is_clean());
        prop_assert_eq!(&outcome.auto_merged, &changed);

        let outcome = detect_conflicts(&base, &changed, &base).unwrap();
        prop_assert!(outcome.is_clean());
        prop_assert_eq!(outcome.auto_merged, changed);
    }

    #[test]
    fn taking_one_side_settles_every_conflict(
        base in deck_strategy(),
        source in deck_strategy(),
        target in deck_strategy()
    ) {
        let outcome = detect_conflicts(&base, &source, &target).unwrap();
        let resolved =
            apply_resolution(&outcome.auto_merged, &outcome.conflicts.resolve_all(Side::Source))
                .unwrap();
        for conflict in outcome.conflicts.iter() {
            prop_assert_eq!(
                resolved.quantity(&conflict.zone, &conflict.card_id),
                source.quantity(&conflict.zone, &conflict.card_id)
            );
        }
    }

    #[test]
    fn normalization_is_idempotent(entries in entries_strategy()) {
        let deck = build(&entries);

        let without_zeros: Entries = entries
            .iter()
            .filter(|(_, quantity)| **quantity > 0)
            .map(|(&key, &quantity)| (key, quantity))
            .collect();
        prop_assert_eq!(&build(&without_zeros), &deck);

        let mut rebuilt = DeckSnapshot::builder(DeckFormat::Riftbound);
        for (zone, cards) in deck.zones() {
            for card in cards.cards() {
                rebuilt = rebuilt.card(zone, card.clone());
            }
        }
        prop_assert_eq!(&rebuilt.build().unwrap(), &deck);

        let decoded = codec::from_json(&codec::to_json(&deck).unwrap()).unwrap();
        prop_assert_eq!(decoded, deck);
    }
}
