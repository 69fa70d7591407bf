//! Deck snapshot model
//!
//! A [`DeckSnapshot`] is one immutable version of a deck. Every operation that
//! changes a deck returns a new snapshot; fields are private so a constructed
//! snapshot is always normalized and valid for its format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::card::{CardId, CardRef};
use super::format::DeckFormat;
use crate::codec::DeckFile;
use crate::error::{Error, Result};

/// Deck file schema version written by this crate
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Cards held by one zone, keyed by card id.
///
/// Zero-quantity entries are never stored.
#[derive(Debug, Clone, Default)]
pub struct Zone {
    cards: BTreeMap<CardId, CardRef>,
}

impl Zone {
    /// Card reference for `id`, if present
    pub fn get(&self, id: &CardId) -> Option<&CardRef> {
        self.cards.get(id)
    }

    /// Quantity of `id` in this zone (0 when absent)
    pub fn quantity(&self, id: &CardId) -> u32 {
        self.cards.get(id).map_or(0, |card| card.quantity)
    }

    /// Cards in ascending card-id order
    pub fn cards(&self) -> impl Iterator<Item = &CardRef> {
        self.cards.values()
    }

    /// Card ids in ascending order
    pub fn card_ids(&self) -> impl Iterator<Item = &CardId> {
        self.cards.keys()
    }

    /// Total copies across all cards in the zone
    pub fn total(&self) -> u64 {
        self.cards.values().map(|card| u64::from(card.quantity)).sum()
    }

    /// Number of distinct cards
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Insert or overwrite a card; a zero quantity removes it
    pub(crate) fn set(&mut self, card: CardRef) {
        if card.quantity == 0 {
            self.cards.remove(&card.id);
        } else {
            self.cards.insert(card.id.clone(), card);
        }
    }
}

impl PartialEq for Zone {
    fn eq(&self, other: &Self) -> bool {
        self.cards.len() == other.cards.len()
            && self
                .cards
                .iter()
                .zip(other.cards.iter())
                .all(|((left_id, left), (right_id, right))| {
                    left_id == right_id && left.quantity == right.quantity
                })
    }
}

impl Eq for Zone {}

/// A card exceeding the format's per-card copy limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyLimitViolation {
    pub zone: String,
    pub card_id: CardId,
    pub quantity: u32,
    pub limit: u32,
}

/// One immutable version of a deck.
///
/// Two snapshots are equal when they share a format and every zone holds the
/// same card ids with the same quantities. Display names and the schema
/// version do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DeckFile", into = "DeckFile")]
pub struct DeckSnapshot {
    format: DeckFormat,
    schema_version: u32,
    zones: BTreeMap<String, Zone>,
}

impl DeckSnapshot {
    /// An empty deck of the given format
    #[must_use]
    pub fn empty(format: DeckFormat) -> Self {
        Self {
            format,
            schema_version: CURRENT_SCHEMA_VERSION,
            zones: BTreeMap::new(),
        }
    }

    /// Start building a snapshot
    #[must_use]
    pub fn builder(format: DeckFormat) -> DeckBuilder {
        DeckBuilder::new(format)
    }

    /// Assemble a snapshot from already-keyed zones, normalizing and validating.
    pub(crate) fn from_zones(
        format: DeckFormat,
        schema_version: u32,
        zones: BTreeMap<String, Zone>,
    ) -> Result<Self> {
        let zones = zones
            .into_iter()
            .filter(|(_, zone)| !zone.is_empty())
            .collect();
        let snapshot = Self {
            format,
            schema_version,
            zones,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub const fn format(&self) -> DeckFormat {
        self.format
    }

    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Zone by name; `None` when the zone holds no cards
    pub fn zone(&self, name: &str) -> Option<&Zone> {
        self.zones.get(name)
    }

    /// Non-empty zones in name order
    pub fn zones(&self) -> impl Iterator<Item = (&str, &Zone)> {
        self.zones.iter().map(|(name, zone)| (name.as_str(), zone))
    }

    /// Quantity of a card in a zone (0 when absent)
    pub fn quantity(&self, zone: &str, card: &CardId) -> u32 {
        self.zones.get(zone).map_or(0, |cards| cards.quantity(card))
    }

    /// Card reference in a zone, if present
    pub fn card(&self, zone: &str, card: &CardId) -> Option<&CardRef> {
        self.zones.get(zone).and_then(|cards| cards.get(card))
    }

    /// Total copies across every zone
    pub fn total_cards(&self) -> u64 {
        self.zones.values().map(Zone::total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// New snapshot with one card's quantity replaced (0 removes it)
    pub fn with_card(&self, zone: &str, card: CardRef) -> Result<Self> {
        self.format.zone_spec(zone)?;
        let mut zones = self.zones.clone();
        zones.entry(zone.to_string()).or_default().set(card);
        Self::from_zones(self.format, self.schema_version, zones)
    }

    /// New snapshot with a card's count changed, keeping its display name
    pub fn with_quantity(&self, zone: &str, card: &CardId, quantity: u32) -> Result<Self> {
        let name = self
            .card(zone, card)
            .map(|existing| existing.name.clone())
            .unwrap_or_default();
        self.with_card(zone, CardRef::new(card.clone(), name, quantity))
    }

    /// Cards breaking the format's per-card copy limit.
    ///
    /// `is_exempt` lets the edit layer skip cards such as basic lands.
    pub fn copy_limit_violations(
        &self,
        is_exempt: impl Fn(&CardId) -> bool,
    ) -> Vec<CopyLimitViolation> {
        let limit = self.format.copy_limit();
        let mut violations = Vec::new();

        for spec in self.format.zones().iter().filter(|spec| spec.copy_limited) {
            let Some(zone) = self.zones.get(spec.name) else {
                continue;
            };
            for card in zone.cards() {
                if card.quantity > limit && !is_exempt(&card.id) {
                    violations.push(CopyLimitViolation {
                        zone: spec.name.to_string(),
                        card_id: card.id.clone(),
                        quantity: card.quantity,
                        limit,
                    });
                }
            }
        }

        violations
    }

    pub(crate) fn zone_map(&self) -> &BTreeMap<String, Zone> {
        &self.zones
    }

    /// Check zone names and capacities against the format
    fn validate(&self) -> Result<()> {
        for (name, zone) in &self.zones {
            let spec = self.format.zone_spec(name)?;
            if let Some(capacity) = spec.capacity {
                let total = zone.total();
                if total > u64::from(capacity) {
                    return Err(Error::ZoneInvariantViolation {
                        zone: name.clone(),
                        reason: format!("holds {total} cards but capacity is {capacity}"),
                    });
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for DeckSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format && self.zones == other.zones
    }
}

impl Eq for DeckSnapshot {}

/// Builder collecting cards per zone before validation.
#[derive(Debug, Clone)]
pub struct DeckBuilder {
    format: DeckFormat,
    schema_version: u32,
    entries: Vec<(String, CardRef)>,
}

impl DeckBuilder {
    fn new(format: DeckFormat) -> Self {
        Self {
            format,
            schema_version: CURRENT_SCHEMA_VERSION,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub const fn schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    /// Add a card to a zone. Each card id may appear once per zone.
    #[must_use]
    pub fn card(mut self, zone: impl Into<String>, card: CardRef) -> Self {
        self.entries.push((zone.into(), card));
        self
    }

    /// Shorthand for adding a card by id, name and quantity
    pub fn add(
        self,
        zone: impl Into<String>,
        id: &str,
        name: impl Into<String>,
        quantity: u32,
    ) -> Result<Self> {
        Ok(self.card(zone, CardRef::new(CardId::new(id)?, name, quantity)))
    }

    /// Validate and produce the snapshot
    pub fn build(self) -> Result<DeckSnapshot> {
        let mut zones: BTreeMap<String, BTreeMap<CardId, CardRef>> = BTreeMap::new();

        for (zone, card) in self.entries {
            self.format.zone_spec(&zone)?;
            let cards = zones.entry(zone.clone()).or_default();
            if cards.contains_key(&card.id) {
                return Err(Error::ZoneInvariantViolation {
                    zone,
                    reason: format!("card {} appears more than once", card.id),
                });
            }
            cards.insert(card.id.clone(), card);
        }

        let zones = zones
            .into_iter()
            .map(|(name, cards)| {
                let mut zone = Zone::default();
                for card in cards.into_values() {
                    zone.set(card);
                }
                (name, zone)
            })
            .collect();

        DeckSnapshot::from_zones(self.format, self.schema_version, zones)
    }
}
