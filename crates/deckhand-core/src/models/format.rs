//! Deck formats and their zone sets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Declared zone of a deck format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneSpec {
    pub name: &'static str,
    /// Maximum total copies the zone may hold; `None` is unbounded
    pub capacity: Option<u32>,
    /// Whether the format's per-card copy limit applies inside this zone
    pub copy_limited: bool,
}

impl ZoneSpec {
    const fn bounded(name: &'static str, capacity: u32) -> Self {
        Self {
            name,
            capacity: Some(capacity),
            copy_limited: false,
        }
    }

    const fn unbounded(name: &'static str) -> Self {
        Self {
            name,
            capacity: None,
            copy_limited: false,
        }
    }

    const fn limited(mut self) -> Self {
        self.copy_limited = true;
        self
    }

    /// True for zones that hold at most one card (legend, commander, ...)
    pub const fn is_single_slot(&self) -> bool {
        matches!(self.capacity, Some(1))
    }
}

const RIFTBOUND_ZONES: &[ZoneSpec] = &[
    ZoneSpec::bounded("legend", 1),
    ZoneSpec::bounded("champion", 1),
    ZoneSpec::unbounded("main").limited(),
    ZoneSpec::unbounded("runes"),
    ZoneSpec::bounded("battlefields", 3),
    ZoneSpec::unbounded("sideboard").limited(),
];

const COMMANDER_ZONES: &[ZoneSpec] = &[
    // Two slots so partner commanders fit.
    ZoneSpec::bounded("commander", 2),
    ZoneSpec::unbounded("main").limited(),
    ZoneSpec::unbounded("sideboard"),
];

/// Game format a deck is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckFormat {
    #[serde(rename = "riftbound")]
    Riftbound,
    #[serde(rename = "mtg-commander")]
    Commander,
}

impl DeckFormat {
    /// Identifier used in deck files and on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Riftbound => "riftbound",
            Self::Commander => "mtg-commander",
        }
    }

    /// Zones declared by this format, in display order
    #[must_use]
    pub const fn zones(self) -> &'static [ZoneSpec] {
        match self {
            Self::Riftbound => RIFTBOUND_ZONES,
            Self::Commander => COMMANDER_ZONES,
        }
    }

    /// Look up a declared zone
    pub fn zone_spec(self, zone: &str) -> Result<&'static ZoneSpec> {
        self.zones()
            .iter()
            .find(|spec| spec.name == zone)
            .ok_or_else(|| Error::UnknownZone {
                format: self,
                zone: zone.to_string(),
            })
    }

    /// Maximum copies of a single card allowed by the format's deck rules.
    ///
    /// Enforced at the edit layer, not by diff/merge/apply.
    #[must_use]
    pub const fn copy_limit(self) -> u32 {
        match self {
            Self::Riftbound => 3,
            Self::Commander => 1,
        }
    }
}

impl fmt::Display for DeckFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeckFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "riftbound" => Ok(Self::Riftbound),
            "mtg-commander" | "commander" => Ok(Self::Commander),
            other => Err(Error::InvalidInput(format!("unknown deck format '{other}'"))),
        }
    }
}
