//! Deck file encoding.
//!
//! The version store persists snapshots as pretty-printed JSON deck files.
//! Encoding is lossless: `from_json(&to_json(&deck)?)? == deck`, display names
//! included.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{CardRef, DeckFormat, DeckSnapshot, CURRENT_SCHEMA_VERSION};

/// On-disk deck file representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeckFile {
    pub schema_version: u32,
    pub format: DeckFormat,
    #[serde(default)]
    pub zones: BTreeMap<String, Vec<CardRef>>,
}

impl From<DeckSnapshot> for DeckFile {
    fn from(snapshot: DeckSnapshot) -> Self {
        let zones = snapshot
            .zones()
            .map(|(name, zone)| (name.to_string(), zone.cards().cloned().collect()))
            .collect();

        Self {
            schema_version: snapshot.schema_version(),
            format: snapshot.format(),
            zones,
        }
    }
}

impl TryFrom<DeckFile> for DeckSnapshot {
    type Error = Error;

    fn try_from(file: DeckFile) -> Result<Self> {
        if file.schema_version == 0 || file.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(Error::InvalidInput(format!(
                "unsupported deck schema_version {} (expected 1..={CURRENT_SCHEMA_VERSION})",
                file.schema_version
            )));
        }

        let mut builder = Self::builder(file.format).schema_version(file.schema_version);
        for (zone, cards) in file.zones {
            for card in cards {
                builder = builder.card(zone.clone(), card);
            }
        }
        builder.build()
    }
}

/// Serialize a snapshot as a pretty-printed deck file
pub fn to_json(snapshot: &DeckSnapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Parse and validate a deck file
pub fn from_json(payload: &str) -> Result<DeckSnapshot> {
    let file: DeckFile = serde_json::from_str(payload)?;
    DeckSnapshot::try_from(file)
}
