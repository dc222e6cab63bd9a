use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use crate::arguments::is_debug_positions_enabled;
use crate::logger::{self, LogTag};
use crate::utils::short_mint;

/// Held for the duration of one buy, tick or close on a mint
pub struct PositionLockGuard {
    mint: String,
    _owned_guard: OwnedMutexGuard<()>,
}

impl PositionLockGuard {
    pub fn mint(&self) -> &str {
        &self.mint
    }
}

impl Drop for PositionLockGuard {
    fn drop(&mut self) {
        if is_debug_positions_enabled() {
            logger::debug(
                LogTag::Positions,
                &format!("🔓 Released position lock for mint: {}", short_mint(&self.mint)),
            );
        }
    }
}

/// Per-mint in-flight guard. Acquisition never waits: a busy mint is
/// skipped for this tick instead of queued behind the running operation.
#[derive(Default)]
pub struct MintLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MintLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// None when another operation on `mint` is in flight
    pub fn try_acquire(&self, mint: &str) -> Option<PositionLockGuard> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(mint.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let owned_guard = lock.try_lock_owned().ok()?;

        if is_debug_positions_enabled() {
            logger::debug(
                LogTag::Positions,
                &format!("🔒 Acquired position lock for mint: {}", short_mint(mint)),
            );
        }

        Some(PositionLockGuard {
            mint: mint.to_string(),
            _owned_guard: owned_guard,
        })
    }

    pub fn is_busy(&self, mint: &str) -> bool {
        self.locks
            .lock()
            .get(mint)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Forget idle entries for mints that no longer have positions
    pub fn prune(&self) {
        self.locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1 || lock.try_lock().is_err());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let locks = MintLocks::new();
        let guard = locks.try_acquire("MintA").unwrap();
        assert_eq!(guard.mint(), "MintA");
        assert!(locks.try_acquire("MintA").is_none());
        assert!(locks.is_busy("MintA"));
        assert!(locks.try_acquire("MintB").is_some());

        drop(guard);
        assert!(!locks.is_busy("MintA"));
        assert!(locks.try_acquire("MintA").is_some());
    }

    #[test]
    fn test_prune_drops_idle_entries() {
        let locks = MintLocks::new();
        let held = locks.try_acquire("MintA").unwrap();
        drop(locks.try_acquire("MintB"));
        locks.prune();
        assert_eq!(locks.locks.lock().len(), 1);
        drop(held);
    }
}
