use std::time::Duration;

/// Handle to a scheduled event, used to disarm it before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Scheduled<E> {
    id: u64,
    deadline_ns: u64,
    event: E,
}

/// Cooperative scheduler of delayed events.
///
/// Nothing runs on its own: the owner asks for [`Scheduler::next_deadline`],
/// waits however it likes, then drains due events with [`Scheduler::pop_due`].
/// Events with equal deadlines fire in scheduling order.
#[derive(Debug)]
pub struct Scheduler<E> {
    queue: Vec<Scheduled<E>>,
    next_id: u64,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            next_id: 0,
        }
    }

    pub fn schedule_at(&mut self, deadline_ns: u64, event: E) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Scheduled {
            id,
            deadline_ns,
            event,
        });
        TimerHandle(id)
    }

    pub fn schedule_after(&mut self, now_ns: u64, delay: Duration, event: E) -> TimerHandle {
        self.schedule_at(now_ns.saturating_add(delay.as_nanos() as u64), event)
    }

    /// Disarms a pending event. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.queue.iter().position(|s| s.id == handle.0) {
            Some(idx) => {
                self.queue.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Disarms everything; returns how many events were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.queue.iter().any(|s| s.id == handle.0)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.iter().map(|s| s.deadline_ns).min()
    }

    /// Removes and returns the earliest event whose deadline is at or before `now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<(u64, E)> {
        let idx = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, s)| s.deadline_ns <= now_ns)
            .min_by_key(|(_, s)| (s.deadline_ns, s.id))
            .map(|(idx, _)| idx)?;
        let s = self.queue.remove(idx);
        Some((s.deadline_ns, s.event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_then_schedule_order() {
        let mut s = Scheduler::new();
        s.schedule_at(30, "c");
        s.schedule_at(10, "a");
        s.schedule_at(10, "b");
        assert_eq!(s.next_deadline(), Some(10));
        assert_eq!(s.pop_due(5), None);
        assert_eq!(s.pop_due(40), Some((10, "a")));
        assert_eq!(s.pop_due(40), Some((10, "b")));
        assert_eq!(s.pop_due(40), Some((30, "c")));
        assert_eq!(s.pop_due(40), None);
    }

    #[test]
    fn cancelled_events_never_fire() {
        let mut s = Scheduler::new();
        let timeout = s.schedule_after(0, Duration::from_millis(2000), "timeout");
        let other = s.schedule_after(0, Duration::from_millis(10), "other");
        assert!(s.cancel(timeout));
        assert!(!s.cancel(timeout));
        assert!(!s.is_pending(timeout));
        assert!(s.is_pending(other));
        assert_eq!(s.pop_due(u64::MAX), Some((10_000_000, "other")));
        assert_eq!(s.pop_due(u64::MAX), None);
    }

    #[test]
    fn cancel_all_empties_the_queue() {
        let mut s = Scheduler::new();
        s.schedule_at(1, 1);
        s.schedule_at(2, 2);
        assert_eq!(s.cancel_all(), 2);
        assert_eq!(s.pending(), 0);
        assert_eq!(s.next_deadline(), None);
    }
}
