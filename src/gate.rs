//! Deduplication / throttle gate
//!
//! A purely temporal filter: it suppresses a value that repeats on the same
//! channel within that channel's window. It knows nothing about stored codes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Logical stream a decision is made on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Candidate codes forwarded downstream
    Accepted,
    /// "Already exists in this product" warnings
    DuplicateWarning,
    /// Every other user-facing warning
    Warning,
}

/// Outcome of [`ThrottleGate::accept`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// First occurrence, or the window has elapsed
    Accepted,
    /// Same value seen on this channel within the window
    Suppressed,
}

/// Last accepted value and when it was accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleRecord {
    /// Value last let through
    pub last_value: String,
    /// Time it was let through
    pub last_at: Instant,
}

/// Per-channel suppression windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleWindows {
    /// Re-scan of an accepted code
    pub rescan: Duration,
    /// Duplicate-against-existing warning
    pub duplicate: Duration,
    /// Generic warnings
    pub warning: Duration,
}

impl Default for ThrottleWindows {
    fn default() -> Self {
        Self {
            rescan: Duration::from_millis(2_000),
            duplicate: Duration::from_millis(5_000),
            warning: Duration::from_millis(3_000),
        }
    }
}

impl ThrottleWindows {
    /// Window that applies to `channel`
    pub fn for_channel(&self, channel: Channel) -> Duration {
        match channel {
            Channel::Accepted => self.rescan,
            Channel::DuplicateWarning => self.duplicate,
            Channel::Warning => self.warning,
        }
    }
}

/// Session-scoped throttle state, one record per channel
#[derive(Debug, Clone, Default)]
pub struct ThrottleGate {
    windows: ThrottleWindows,
    records: HashMap<Channel, ThrottleRecord>,
}

impl ThrottleGate {
    /// Create a gate with the given windows and no history
    pub fn new(windows: ThrottleWindows) -> Self {
        Self {
            windows,
            records: HashMap::new(),
        }
    }

    /// Decide whether `value` passes on `channel` at `now`
    ///
    /// Suppressed iff the value equals the channel's last accepted value and
    /// less than the window has elapsed. Accepted updates the record.
    pub fn accept(&mut self, channel: Channel, value: &str, now: Instant) -> GateDecision {
        let window = self.windows.for_channel(channel);
        let repeated = self.records.get(&channel).is_some_and(|record| {
            record.last_value == value && now.saturating_duration_since(record.last_at) < window
        });
        if repeated {
            return GateDecision::Suppressed;
        }

        self.records.insert(
            channel,
            ThrottleRecord {
                last_value: value.to_string(),
                last_at: now,
            },
        );
        GateDecision::Accepted
    }

    /// Current record for a channel
    pub fn record(&self, channel: Channel) -> Option<&ThrottleRecord> {
        self.records.get(&channel)
    }

    /// Drop one channel's record so its last value passes again
    pub fn forget(&mut self, channel: Channel) {
        self.records.remove(&channel);
    }

    /// Forget all history (e.g. after the user explicitly rescans)
    pub fn reset(&mut self) {
        self.records.clear();
    }

    /// Configured windows
    pub fn windows(&self) -> ThrottleWindows {
        self.windows
    }
}
