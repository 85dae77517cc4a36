use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// The actions a cooldown can be keyed on. Each action is its own namespace,
/// so a user's command rate limit never interferes with their generation
/// cooldown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Any command at all, for the short global limiter
    AnyCommand,

    /// Code generation. `item` is `None` when the cooldown is shared across
    /// all items.
    Generate { item: Option<String> },
}

/// Outcome of consulting a cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Ready,
    OnCooldown(Duration),
}

impl Gate {
    pub fn is_ready(self) -> bool {
        matches!(self, Gate::Ready)
    }
}

/// Per-key "eligible after" timestamps. A key without an entry has never
/// used the action and is always ready. Entries are never purged: a stale
/// one is simply satisfied once `now` passes it. `None` marks a key whose
/// cooldown runs past what `Instant` can represent; it never becomes ready.
#[derive(Debug)]
pub struct Cooldowns<K> {
    eligible_at: HashMap<K, Option<Instant>>,
}

impl<K: Eq + Hash> Default for Cooldowns<K> {
    fn default() -> Self {
        Self {
            eligible_at: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> Cooldowns<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look at `key` without arming it.
    pub fn check(&self, key: &K, now: Instant) -> Gate {
        match self.eligible_at.get(key) {
            Some(&Some(at)) if now < at => Gate::OnCooldown(at - now),
            Some(None) => Gate::OnCooldown(Duration::MAX),
            _ => Gate::Ready,
        }
    }

    /// Make `key` ineligible until `now + duration`.
    pub fn arm(&mut self, key: K, now: Instant, duration: Duration) {
        self.eligible_at.insert(key, now.checked_add(duration));
    }

    /// Arm `key` if it is ready. A rejected attempt does not re-arm it.
    pub fn check_and_arm(&mut self, key: K, now: Instant, duration: Duration) -> Gate {
        let gate = self.check(&key, now);
        if gate.is_ready() {
            self.arm(key, now, duration);
        }
        gate
    }
}
