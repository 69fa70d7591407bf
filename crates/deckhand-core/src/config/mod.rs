//! Session configuration.
//!
//! `SessionConfig` controls how a deck-editing session commits: the auto-save
//! quiet period, message limits, the author recorded on commits and retry
//! behavior for flaky version stores. The CLI loads it from a JSON file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_QUIET_PERIOD_SECS: u64 = 30;
const MAX_QUIET_PERIOD_SECS: u64 = 24 * 60 * 60;
const DEFAULT_MAX_MESSAGE_LEN: usize = 500;
const DEFAULT_AUTHOR: &str = "deckhand";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_DECK_PATH: &str = "deck.json";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 250;

/// Retry behavior for retryable version-store failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Delay before retry `n` is `base_delay_ms * n`
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl RetryConfig {
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Seconds without edits before an automatic commit
    pub autosave_quiet_period_secs: u64,
    /// Longest accepted manual commit message, in characters
    pub max_message_len: usize,
    pub author: String,
    pub default_branch: String,
    /// Deck file path inside the repository
    pub deck_path: String,
    pub retry: RetryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_quiet_period_secs: DEFAULT_QUIET_PERIOD_SECS,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            author: DEFAULT_AUTHOR.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            deck_path: DEFAULT_DECK_PATH.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults. The loaded value is validated.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.autosave_quiet_period_secs == 0 {
            return Err(Error::InvalidInput(
                "autosave_quiet_period_secs must be greater than 0".to_string(),
            ));
        }
        if self.autosave_quiet_period_secs > MAX_QUIET_PERIOD_SECS {
            return Err(Error::InvalidInput(format!(
                "autosave_quiet_period_secs must be at most {MAX_QUIET_PERIOD_SECS}"
            )));
        }
        if self.max_message_len == 0 {
            return Err(Error::InvalidInput(
                "max_message_len must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidInput(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.author.trim().is_empty() {
            return Err(Error::InvalidInput("author must not be empty".to_string()));
        }
        if self.default_branch.trim().is_empty() {
            return Err(Error::InvalidInput(
                "default_branch must not be empty".to_string(),
            ));
        }
        if self.deck_path.trim().is_empty() {
            return Err(Error::InvalidInput("deck_path must not be empty".to_string()));
        }
        Ok(())
    }

    pub const fn quiet_period(&self) -> Duration {
        Duration::from_secs(self.autosave_quiet_period_secs)
    }
}
