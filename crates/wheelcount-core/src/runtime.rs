//! Cooperative task queue
//!
//! Everything in the core runs to completion on one logical thread. Work is
//! expressed as [`Task`] values in a [`TaskQueue`]: immediate tasks run in
//! FIFO order, delayed tasks become ready once their deadline has passed.
//!
//! Recurring work never reschedules itself behind the scheduler's back.
//! Each handler returns a [`Repeat`] describing its successor, and the caller
//! queues it. A recurring responsibility that returns [`Repeat::Done`] stops
//! for good, which is why the rotation timer and duty cycle never do.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use embassy_time::{Duration, Instant};

use crate::scan::LogScan;

/// What a task wants to happen after it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Finished, nothing to queue
    Done,
    /// Run again on the next tick, behind anything already ready
    Now,
    /// Run again once `Duration` has elapsed
    After(Duration),
}

/// Work items understood by [`crate::Wheelcount`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Session rotation timer
    RotationTimer,
    /// Radio duty-cycle decision
    DutyCycle,
    /// One step of a `turndata disp` scan
    Scan(LogScan),
    /// Deferred `turndata active` report
    Active,
    /// Deferred `turndata info` report
    Info,
}

#[derive(Debug)]
struct Delayed<T> {
    due: Instant,
    seq: u64,
    task: T,
}

/// Immediate and delayed task queue
///
/// Tasks never fire before their deadline. Tasks sharing a deadline fire in
/// the order they were queued.
#[derive(Debug)]
pub struct TaskQueue<T> {
    ready: VecDeque<T>,
    delayed: Vec<Delayed<T>>,
    seq: u64,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            delayed: Vec::new(),
            seq: 0,
        }
    }

    /// Queue `task` to run on the next tick.
    pub fn push(&mut self, task: T) {
        self.ready.push_back(task);
    }

    /// Queue `task` to run once `delay` has elapsed after `now`.
    pub fn push_after(&mut self, now: Instant, delay: Duration, task: T) {
        let seq = self.seq;
        self.seq += 1;
        self.delayed.push(Delayed {
            due: now + delay,
            seq,
            task,
        });
    }

    /// Queue the successor described by `repeat`.
    pub fn reschedule(&mut self, now: Instant, repeat: Repeat, task: T) {
        match repeat {
            Repeat::Done => {}
            Repeat::Now => self.push(task),
            Repeat::After(delay) => self.push_after(now, delay, task),
        }
    }

    /// Take the next task that may run at `now`.
    ///
    /// Delayed tasks whose deadline has passed are moved behind the tasks
    /// already ready, so a task that keeps asking to run again immediately
    /// cannot starve timers.
    pub fn pop_due(&mut self, now: Instant) -> Option<T> {
        while let Some(index) = self.earliest_due(now) {
            let delayed = self.delayed.swap_remove(index);
            self.ready.push_back(delayed.task);
        }
        self.ready.pop_front()
    }

    fn earliest_due(&self, now: Instant) -> Option<usize> {
        self.delayed
            .iter()
            .enumerate()
            .filter(|(_, d)| d.due <= now)
            .min_by_key(|(_, d)| (d.due, d.seq))
            .map(|(index, _)| index)
    }

    /// Deadline of the next delayed task, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.delayed.iter().map(|d| d.due).min()
    }

    /// Whether nothing can run at `now`; the platform may sleep.
    pub fn is_idle(&self, now: Instant) -> bool {
        self.ready.is_empty() && self.next_due().is_none_or(|due| due > now)
    }

    /// Number of queued tasks, ready and delayed
    pub fn len(&self) -> usize {
        self.ready.len() + self.delayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every queued task, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.ready.iter().chain(self.delayed.iter().map(|d| &d.task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> Instant {
        Instant::from_secs(secs)
    }

    #[test]
    fn delayed_task_never_fires_early() {
        let mut queue = TaskQueue::new();
        queue.push_after(at(0), Duration::from_secs(10), 1);

        assert_eq!(queue.pop_due(at(9)), None);
        assert!(queue.is_idle(at(9)));
        assert_eq!(queue.pop_due(at(10)), Some(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn immediate_tasks_are_fifo() {
        let mut queue = TaskQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.pop_due(at(0)), Some(1));
        assert_eq!(queue.pop_due(at(0)), Some(2));
        assert_eq!(queue.pop_due(at(0)), Some(3));
    }

    #[test]
    fn equal_deadlines_fire_in_queue_order() {
        let mut queue = TaskQueue::new();
        queue.push_after(at(0), Duration::from_secs(5), 'b');
        queue.push_after(at(0), Duration::from_secs(5), 'c');
        queue.push_after(at(0), Duration::from_secs(2), 'a');

        assert_eq!(queue.pop_due(at(5)), Some('a'));
        assert_eq!(queue.pop_due(at(5)), Some('b'));
        assert_eq!(queue.pop_due(at(5)), Some('c'));
    }

    #[test]
    fn busy_task_does_not_starve_timer() {
        let mut queue = TaskQueue::new();
        queue.push("scan");
        queue.push_after(at(0), Duration::from_secs(1), "timer");

        let now = at(1);
        let first = queue.pop_due(now);
        assert_eq!(first, Some("scan"));
        queue.reschedule(now, Repeat::Now, "scan");

        assert_eq!(queue.pop_due(now), Some("timer"));
        assert_eq!(queue.pop_due(now), Some("scan"));
    }

    #[test]
    fn reschedule_done_drops_task() {
        let mut queue = TaskQueue::new();
        queue.reschedule(at(0), Repeat::Done, 7);
        assert!(queue.is_empty());

        queue.reschedule(at(0), Repeat::After(Duration::from_secs(3)), 7);
        assert_eq!(queue.next_due(), Some(at(3)));
    }
}
