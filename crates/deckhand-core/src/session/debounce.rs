//! Auto-save debounce state machine.
//!
//! Pure: the caller passes the current time in, so the machine can be driven
//! by a tokio task or stepped directly in tests.

use std::time::Duration;

use tokio::time::Instant;

/// Stand-in deadline when the quiet period runs past what `Instant` can hold
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing waiting to be saved
    Idle,
    /// Edits are waiting; an auto-save is due at `deadline`
    PendingEdit { deadline: Instant },
    /// A commit is in flight. `edited_since` records edits that arrived
    /// after it started; they get a fresh quiet period once it finishes.
    Committing { edited_since: bool },
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet_period: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub const fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            state: DebounceState::Idle,
        }
    }

    pub const fn state(&self) -> DebounceState {
        self.state
    }

    pub const fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Record an edit made at `now`, restarting the quiet period
    pub fn on_edit(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Idle | DebounceState::PendingEdit { .. } => {
                DebounceState::PendingEdit {
                    deadline: self.deadline_from(now),
                }
            }
            DebounceState::Committing { .. } => DebounceState::Committing { edited_since: true },
        };
    }

    fn deadline_from(&self, now: Instant) -> Instant {
        now.checked_add(self.quiet_period)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now)
    }

    /// When the pending auto-save fires, if one is armed
    pub const fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::PendingEdit { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    pub const fn is_committing(&self) -> bool {
        matches!(self.state, DebounceState::Committing { .. })
    }

    /// Start a commit, cancelling any pending timer.
    ///
    /// Returns `false` when a commit is already in flight; the caller must
    /// wait for [`Debouncer::finish_commit`] first.
    pub fn begin_commit(&mut self) -> bool {
        if self.is_committing() {
            return false;
        }
        self.state = DebounceState::Committing {
            edited_since: false,
        };
        true
    }

    /// Disarm a pending timer without committing
    pub fn cancel_pending(&mut self) {
        if matches!(self.state, DebounceState::PendingEdit { .. }) {
            self.state = DebounceState::Idle;
        }
    }

    /// The in-flight commit finished (successfully or not) at `now`
    pub fn finish_commit(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Committing { edited_since: true } => DebounceState::PendingEdit {
                deadline: self.deadline_from(now),
            },
            DebounceState::Committing { edited_since: false } => DebounceState::Idle,
            other => other,
        };
    }
}
