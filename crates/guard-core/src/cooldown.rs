//! Announcement rate limiter: a single "last spoken at" stamp.

use std::time::{Duration, Instant};

/// Default minimum gap between two dispatched announcements.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Drops announcements that arrive within `window` of the previous one. Nothing is queued.
#[derive(Debug, Clone)]
pub struct Cooldown {
    window: Duration,
    last_spoken: Option<Instant>,
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_spoken: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last_spoken(&self) -> Option<Instant> {
        self.last_spoken
    }

    /// True if an announcement at `now` would be allowed.
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_spoken {
            None => true,
            Some(at) => now.saturating_duration_since(at) > self.window,
        }
    }

    /// Check and stamp in one step. Returns false (and leaves the stamp alone) when suppressed.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if !self.is_ready(now) {
            return false;
        }
        self.stamp(now);
        true
    }

    /// Stamp unconditionally, for announcements that bypass the check.
    pub fn stamp(&mut self, now: Instant) {
        self.last_spoken = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_announcement_is_always_allowed() {
        let mut cooldown = Cooldown::default();
        assert!(cooldown.try_acquire(Instant::now()));
    }

    #[test]
    fn suppresses_within_window_without_restamping() {
        let mut cooldown = Cooldown::new(Duration::from_secs(5));
        let t0 = Instant::now();
        assert!(cooldown.try_acquire(t0));
        assert!(!cooldown.try_acquire(t0 + Duration::from_secs(3)));
        assert_eq!(cooldown.last_spoken(), Some(t0));
        // The dropped attempt did not push the window out.
        assert!(cooldown.try_acquire(t0 + Duration::from_secs(6)));
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let mut cooldown = Cooldown::new(Duration::from_secs(5));
        let t0 = Instant::now();
        cooldown.stamp(t0);
        assert!(!cooldown.is_ready(t0 + Duration::from_secs(5)));
        assert!(cooldown.is_ready(t0 + Duration::from_millis(5001)));
    }
}
