//! Trailing-edge debounce for autosave.

use std::time::{Duration, Instant};

/// Fires once `debounce` has passed since the most recent change.
///
/// Time is supplied by the caller, so the scheduler owns no clock or
/// worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveScheduler {
    debounce: Duration,
    pending_since: Option<Instant>,
}

impl AutosaveScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending_since: None,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Records a change at `now`, restarting the window.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.pending_since = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Returns `true` exactly once per quiet window and clears the pending
    /// change.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending_since {
            Some(since) if now.saturating_duration_since(since) >= self.debounce => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }

    /// Drops a pending change, e.g. after an explicit flush.
    pub fn clear(&mut self) {
        self.pending_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::AutosaveScheduler;
    use std::time::{Duration, Instant};

    #[test]
    fn fires_after_quiet_window_only() {
        let start = Instant::now();
        let mut scheduler = AutosaveScheduler::new(Duration::from_millis(1_500));
        assert!(!scheduler.poll(start));

        scheduler.mark_dirty(start);
        assert!(!scheduler.poll(start + Duration::from_millis(1_000)));

        scheduler.mark_dirty(start + Duration::from_millis(1_000));
        assert!(!scheduler.poll(start + Duration::from_millis(2_000)));
        assert!(scheduler.poll(start + Duration::from_millis(2_500)));
        assert!(!scheduler.poll(start + Duration::from_millis(9_000)));
        assert!(!scheduler.is_pending());
    }
}
