//! Card reference model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Stable card identity used for all diff/merge equality.
///
/// Ordering is lexicographic on the underlying string, which gives diffs
/// their deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardId(String);

impl CardId {
    /// Create a card ID, trimming whitespace and rejecting empty values
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("card id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for CardId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CardId> for String {
    fn from(value: CardId) -> Self {
        value.0
    }
}

/// A card within a deck zone.
///
/// `name` is presentation-only and never affects diff/merge logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRef {
    pub id: CardId,
    #[serde(default)]
    pub name: String,
    pub quantity: u32,
}

impl CardRef {
    /// Create a card reference
    #[must_use]
    pub fn new(id: CardId, name: impl Into<String>, quantity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            quantity,
        }
    }

    /// Name to show to humans, falling back to the card id
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }
}

/// Loosely-shaped card record as returned by external card providers.
///
/// Converted into a [`CardRef`] once, at ingestion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCardRecord {
    #[serde(default, alias = "cardId", alias = "card_id")]
    pub id: Option<String>,
    #[serde(default, alias = "displayName", alias = "display_name")]
    pub name: Option<String>,
    #[serde(default, alias = "count")]
    pub quantity: Option<i64>,
}

impl TryFrom<RawCardRecord> for CardRef {
    type Error = Error;

    fn try_from(value: RawCardRecord) -> Result<Self> {
        let id = value
            .id
            .ok_or_else(|| Error::InvalidInput("card record did not include an id".into()))
            .and_then(CardId::new)?;

        let quantity = value.quantity.unwrap_or(1);
        let quantity = u32::try_from(quantity).map_err(|_| {
            Error::InvalidInput(format!("card {id} has invalid quantity {quantity}"))
        })?;

        let name = value
            .name
            .map(|name| name.trim().to_string())
            .unwrap_or_default();

        Ok(Self { id, name, quantity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_id_trims_and_rejects_empty() {
        assert_eq!(CardId::new("  OGN-001 ").unwrap().as_str(), "OGN-001");
        assert!(CardId::new("   ").is_err());
        assert!("".parse::<CardId>().is_err());
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let card = CardRef::new(CardId::new("abc").unwrap(), "", 1);
        assert_eq!(card.display_name(), "abc");

        let named = CardRef::new(CardId::new("abc").unwrap(), "Jinx", 1);
        assert_eq!(named.display_name(), "Jinx");
    }

    #[test]
    fn raw_record_accepts_alternate_field_names() {
        let raw: RawCardRecord =
            serde_json::from_str(r#"{"cardId": "OGN-007", "displayName": " Annie ", "count": 2}"#)
                .unwrap();
        let card = CardRef::try_from(raw).unwrap();
        assert_eq!(card.id.as_str(), "OGN-007");
        assert_eq!(card.name, "Annie");
        assert_eq!(card.quantity, 2);
    }

    #[test]
    fn raw_record_defaults_quantity_to_one() {
        let raw: RawCardRecord = serde_json::from_str(r#"{"id": "sol-ring"}"#).unwrap();
        assert_eq!(CardRef::try_from(raw).unwrap().quantity, 1);
    }

    #[test]
    fn raw_record_rejects_negative_quantity_and_missing_id() {
        let negative: RawCardRecord =
            serde_json::from_str(r#"{"id": "x", "quantity": -1}"#).unwrap();
        assert!(CardRef::try_from(negative).is_err());

        let missing: RawCardRecord = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert!(CardRef::try_from(missing).is_err());
    }
}
