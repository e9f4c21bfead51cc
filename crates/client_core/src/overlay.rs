//! Scroll locking for modal overlays, owned by the presentation layer.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Page scroll is locked while at least one guard is alive.
#[derive(Debug, Clone, Default)]
pub struct ScrollLock {
    holders: Arc<AtomicUsize>,
}

impl ScrollLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> ScrollLockGuard {
        self.holders.fetch_add(1, Ordering::SeqCst);
        ScrollLockGuard {
            holders: Arc::clone(&self.holders),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.holders.load(Ordering::SeqCst) > 0
    }
}

#[must_use = "scroll is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScrollLockGuard {
    holders: Arc<AtomicUsize>,
}

impl Drop for ScrollLockGuard {
    fn drop(&mut self) {
        self.holders.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mirrors the controller's donation-form flag onto a scroll lock.
#[derive(Debug)]
pub struct DonationOverlay {
    lock: ScrollLock,
    guard: Option<ScrollLockGuard>,
}

impl DonationOverlay {
    pub fn new(lock: ScrollLock) -> Self {
        Self { lock, guard: None }
    }

    pub fn sync(&mut self, active: bool) {
        match (active, self.guard.is_some()) {
            (true, false) => self.guard = Some(self.lock.acquire()),
            (false, true) => self.guard = None,
            _ => {}
        }
    }

    pub fn is_open(&self) -> bool {
        self.guard.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_releases_on_drop() {
        let lock = ScrollLock::new();
        {
            let _guard = lock.acquire();
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn nested_holders_keep_scroll_locked() {
        let lock = ScrollLock::new();
        let outer = lock.acquire();
        let inner = lock.acquire();
        drop(outer);
        assert!(lock.is_locked());
        drop(inner);
        assert!(!lock.is_locked());
    }

    #[test]
    fn overlay_follows_form_flag() {
        let lock = ScrollLock::new();
        let mut overlay = DonationOverlay::new(lock.clone());

        overlay.sync(true);
        overlay.sync(true);
        assert!(overlay.is_open());
        assert!(lock.is_locked());

        overlay.sync(false);
        assert!(!overlay.is_open());
        assert!(!lock.is_locked());
    }

    #[test]
    fn dropping_open_overlay_unlocks_scroll() {
        let lock = ScrollLock::new();
        let mut overlay = DonationOverlay::new(lock.clone());
        overlay.sync(true);
        drop(overlay);
        assert!(!lock.is_locked());
    }
}
