//! Per-path settle delay
//!
//! A path is scheduled when an event arrives for it and becomes ready once
//! no further event has touched it for the configured delay.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// Pending paths with their deadlines
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    /// Schedule `path`, pushing its deadline back if already pending
    pub fn schedule(&mut self, path: PathBuf) {
        self.schedule_at(path, Instant::now());
    }

    pub(crate) fn schedule_at(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now + self.delay);
    }

    /// Forget a pending path (e.g. it was removed)
    pub fn cancel(&mut self, path: &Path) -> bool {
        self.pending.remove(path).is_some()
    }

    /// Earliest deadline among pending paths
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Drain paths whose deadline has passed, earliest first
    pub fn pop_ready(&mut self) -> Vec<PathBuf> {
        self.pop_ready_at(Instant::now())
    }

    pub(crate) fn pop_ready_at(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready: Vec<(Instant, PathBuf)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, deadline)| (*deadline, path.clone()))
            .collect();
        ready.sort();

        for (_, path) in &ready {
            self.pending.remove(path);
        }
        ready.into_iter().map(|(_, path)| path).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    #[test]
    fn test_ready_after_delay() {
        let mut debouncer = Debouncer::new(DELAY);
        let t0 = Instant::now();

        debouncer.schedule_at(PathBuf::from("a.patch"), t0);

        assert!(debouncer.pop_ready_at(t0 + Duration::from_millis(50)).is_empty());
        assert_eq!(
            debouncer.pop_ready_at(t0 + DELAY),
            vec![PathBuf::from("a.patch")]
        );
        assert!(debouncer.is_empty());
    }

    #[test]
    fn test_touch_pushes_deadline_back() {
        let mut debouncer = Debouncer::new(DELAY);
        let t0 = Instant::now();

        debouncer.schedule_at(PathBuf::from("a.patch"), t0);
        debouncer.schedule_at(PathBuf::from("a.patch"), t0 + Duration::from_millis(80));

        assert_eq!(debouncer.len(), 1);
        assert!(debouncer.pop_ready_at(t0 + DELAY).is_empty());
        assert_eq!(
            debouncer.next_deadline(),
            Some(t0 + Duration::from_millis(180))
        );
        assert_eq!(debouncer.pop_ready_at(t0 + Duration::from_millis(180)).len(), 1);
    }

    #[test]
    fn test_ready_in_deadline_order() {
        let mut debouncer = Debouncer::new(DELAY);
        let t0 = Instant::now();

        debouncer.schedule_at(PathBuf::from("late.patch"), t0 + Duration::from_millis(20));
        debouncer.schedule_at(PathBuf::from("early.patch"), t0);

        assert_eq!(
            debouncer.pop_ready_at(t0 + Duration::from_secs(1)),
            vec![PathBuf::from("early.patch"), PathBuf::from("late.patch")]
        );
    }

    #[test]
    fn test_cancel() {
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.schedule(PathBuf::from("a.patch"));

        assert!(debouncer.cancel(Path::new("a.patch")));
        assert!(!debouncer.cancel(Path::new("a.patch")));
        assert_eq!(debouncer.next_deadline(), None);
    }
}
