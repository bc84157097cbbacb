use crate::button::Timestamp;

/// One-shot deadline owned by a single chord detector.
///
/// The timer never runs on its own: the owning event loop reads
/// [`DeadlineTimer::deadline`] to decide when to wake up, then calls
/// [`DeadlineTimer::fire`]. That keeps expiry on the same serial path as
/// button events.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeadlineTimer {
    deadline: Option<Timestamp>,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for `at`, replacing any earlier deadline.
    pub fn arm(&mut self, at: Timestamp) {
        self.deadline = Some(at);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.deadline
    }

    /// Returns true exactly once per `arm`, and only once `now` has reached
    /// the deadline. Firing disarms the timer.
    pub fn fire(&mut self, now: Timestamp) -> bool {
        match self.deadline {
            Some(at) if now >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_timer_is_disarmed() {
        let t = DeadlineTimer::new();
        assert!(!t.is_armed());
        assert_eq!(t.deadline(), None);
    }

    #[test]
    fn does_not_fire_before_deadline() {
        let mut t = DeadlineTimer::new();
        t.arm(100);
        assert!(!t.fire(99));
        assert!(t.is_armed());
    }

    #[test]
    fn fires_once_at_deadline() {
        let mut t = DeadlineTimer::new();
        t.arm(100);
        assert!(t.fire(100));
        assert!(!t.fire(200), "second fire without re-arm must not trigger");
        assert!(!t.is_armed());
    }

    #[test]
    fn rearm_replaces_deadline() {
        let mut t = DeadlineTimer::new();
        t.arm(100);
        t.arm(300);
        assert!(!t.fire(150));
        assert_eq!(t.deadline(), Some(300));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut t = DeadlineTimer::new();
        t.cancel();
        t.arm(10);
        t.cancel();
        t.cancel();
        assert!(!t.fire(1_000));
    }
}
