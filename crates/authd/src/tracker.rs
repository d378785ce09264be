//! In-memory live-session counter, exclusively owned by this module. Not
//! persisted: on restart the tracker starts empty, since the broker remains
//! the ultimate source of truth for who is connected.

use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Granted,
    QuotaExceeded,
}

#[derive(Default)]
pub struct ConnectionTracker {
    live: DashMap<String, u32>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic check-and-increment. `max_connections == 0` means unlimited.
    pub fn try_acquire(&self, username: &str, max_connections: u32) -> AcquireOutcome {
        let mut entry = self.live.entry(username.to_string()).or_insert(0);
        if max_connections > 0 && *entry >= max_connections {
            return AcquireOutcome::QuotaExceeded;
        }
        *entry += 1;
        AcquireOutcome::Granted
    }

    /// Atomic decrement, floored at zero to absorb a spurious DISCONNECT.
    pub fn release(&self, username: &str) {
        if let Some(mut entry) = self.live.get_mut(username) {
            *entry = entry.saturating_sub(1);
        }
    }

    pub fn current(&self, username: &str) -> u32 {
        self.live.get(username).map(|v| *v).unwrap_or(0)
    }
}
