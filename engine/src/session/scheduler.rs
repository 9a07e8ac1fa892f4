//! Cancellable, clock-driven step queue.
//!
//! The session never sleeps. Pacing delays become steps with a due time; the
//! caller advances a clock and due steps run in order. Cancelling bumps the
//! epoch, so anything scheduled before the cancel is discarded when it comes
//! due instead of running.

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;
use wayfarer_shared::UnitId;

/// A deferred piece of the turn sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Pick the next living enemy and announce its attack
    NextEnemy,
    /// The announced enemy strikes
    Strike(UnitId),
    /// Hand control to the navigator
    Leave,
}

#[derive(Debug, Clone)]
struct Scheduled {
    due: Duration,
    epoch: u64,
    step: Step,
}

/// Steps ordered by due time, ties broken by insertion order
#[derive(Debug, Default)]
pub struct StepQueue {
    pending: VecDeque<Scheduled>,
    epoch: u64,
}

impl StepQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Duration, step: Step) {
        let at = self.pending.partition_point(|s| s.due <= due);
        debug!("Scheduling {:?} at {:?} (epoch {})", step, due, self.epoch);
        self.pending.insert(at, Scheduled { due, epoch: self.epoch, step });
    }

    /// Invalidate everything scheduled so far
    pub fn cancel_all(&mut self) {
        self.epoch += 1;
    }

    /// Pop the next step due at or before `now`, skipping cancelled ones
    pub fn pop_due(&mut self, now: Duration) -> Option<(Duration, Step)> {
        while self.pending.front().is_some_and(|s| s.due <= now) {
            let scheduled = self.pending.pop_front()?;
            if scheduled.epoch != self.epoch {
                debug!("Dropping cancelled step {:?}", scheduled.step);
                continue;
            }
            return Some((scheduled.due, scheduled.step));
        }
        None
    }

    /// Due time of the next live step
    pub fn next_due(&self) -> Option<Duration> {
        self.pending
            .iter()
            .find(|s| s.epoch == self.epoch)
            .map(|s| s.due)
    }

    pub fn is_idle(&self) -> bool {
        self.next_due().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_steps_run_in_due_order() {
        let mut queue = StepQueue::new();
        queue.schedule(ms(300), Step::Leave);
        queue.schedule(ms(100), Step::NextEnemy);
        queue.schedule(ms(100), Step::Strike(UnitId(4)));

        assert!(queue.pop_due(ms(50)).is_none());
        assert_eq!(queue.pop_due(ms(200)), Some((ms(100), Step::NextEnemy)));
        assert_eq!(queue.pop_due(ms(200)), Some((ms(100), Step::Strike(UnitId(4)))));
        assert!(queue.pop_due(ms(200)).is_none());
        assert_eq!(queue.next_due(), Some(ms(300)));
        assert_eq!(queue.pop_due(ms(300)), Some((ms(300), Step::Leave)));
        assert!(queue.is_idle());
    }

    #[test]
    fn test_cancelled_steps_are_no_ops() {
        let mut queue = StepQueue::new();
        queue.schedule(ms(100), Step::NextEnemy);
        queue.schedule(ms(200), Step::Strike(UnitId(2)));
        queue.cancel_all();
        assert!(queue.is_idle());

        queue.schedule(ms(250), Step::Leave);
        assert_eq!(queue.pop_due(ms(1000)), Some((ms(250), Step::Leave)));
        assert!(queue.pop_due(ms(1000)).is_none());
    }
}
