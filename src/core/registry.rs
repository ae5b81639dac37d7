//! Live player registry for leak diagnostics.
//!
//! Each player owns an `Arc<PlayerToken>` and registers a `Weak` to it here.
//! `destroy()` unregisters explicitly; the periodic sweep only catches
//! players that were leaked or dropped without going through `destroy()`.
//!
//! The registry is an ordinary value passed to `Player::new`, not a global.
//! Clones share the same table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::{debug, warn};
use uuid::Uuid;

/// Liveness token owned by a player.
#[derive(Debug)]
pub struct PlayerToken {
    pub id: Uuid,
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: HashMap<Uuid, Weak<PlayerToken>>,
    last_sweep: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct PlayerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    sweep_interval: Duration,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl PlayerRegistry {
    pub fn new(sweep_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            sweep_interval,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn register(&self, token: &Arc<PlayerToken>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.insert(token.id, Arc::downgrade(token));
        debug!("PlayerRegistry: registered {} ({} tracked)", token.id, inner.entries.len());
    }

    /// Remove a player. Returns true if it was tracked.
    pub fn unregister(&self, id: Uuid) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let removed = inner.entries.remove(&id).is_some();
        if removed {
            debug!("PlayerRegistry: unregistered {} ({} tracked)", id, inner.entries.len());
        }
        removed
    }

    /// Drop entries whose player is gone. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = inner.entries.len();
        inner.entries.retain(|_, weak| weak.strong_count() > 0);
        let removed = before - inner.entries.len();
        if removed > 0 {
            warn!(
                "PlayerRegistry: swept {} player(s) dropped without destroy() ({} live)",
                removed,
                inner.entries.len()
            );
        }
        removed
    }

    /// Sweep if `sweep_interval` passed since the previous sweep (clock time `now`).
    pub fn sweep_if_due(&self, now: Duration) -> Option<usize> {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match inner.last_sweep {
                None => {
                    inner.last_sweep = Some(now);
                    return None;
                }
                Some(last) if now.saturating_sub(last) < self.sweep_interval => return None,
                Some(_) => inner.last_sweep = Some(now),
            }
        }
        Some(self.sweep())
    }

    /// Players whose token is still alive
    pub fn live_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.values().filter(|w| w.strong_count() > 0).count()
    }

    /// Tracked entries, including dead ones not yet swept
    pub fn tracked_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entries
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Arc<PlayerToken> {
        Arc::new(PlayerToken { id: Uuid::new_v4() })
    }

    #[test]
    fn test_register_unregister() {
        let registry = PlayerRegistry::default();
        let t = token();
        registry.register(&t);
        assert!(registry.contains(t.id));
        assert_eq!(registry.live_count(), 1);

        assert!(registry.unregister(t.id));
        assert!(!registry.unregister(t.id));
        assert_eq!(registry.tracked_count(), 0);
    }

    #[test]
    fn test_sweep_removes_dropped() {
        let registry = PlayerRegistry::default();
        let kept = token();
        let dropped = token();
        registry.register(&kept);
        registry.register(&dropped);
        drop(dropped);

        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.tracked_count(), 2);
        assert_eq!(registry.sweep(), 1);
        assert_eq!(registry.ids(), vec![kept.id]);
    }

    #[test]
    fn test_sweep_if_due() {
        let registry = PlayerRegistry::new(Duration::from_secs(30));
        let t = token();
        registry.register(&t);
        drop(t);

        // first call only arms the timer
        assert_eq!(registry.sweep_if_due(Duration::from_secs(1)), None);
        assert_eq!(registry.sweep_if_due(Duration::from_secs(20)), None);
        assert_eq!(registry.sweep_if_due(Duration::from_secs(31)), Some(1));
        assert_eq!(registry.sweep_if_due(Duration::from_secs(32)), None);
    }

    #[test]
    fn test_clones_share_table() {
        let a = PlayerRegistry::default();
        let b = a.clone();
        let t = token();
        a.register(&t);
        assert!(b.contains(t.id));
    }
}
