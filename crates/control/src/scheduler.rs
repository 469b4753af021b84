//! Cooperative fixed-interval task runner.
//!
//! Tasks are closures over a shared context `C`. `tick()` runs every task
//! whose interval has elapsed, in registration order, and never blocks.

use parkgate_core::Millis;

type Task<C> = Box<dyn FnMut(&mut C, Millis) + Send>;

struct Entry<C> {
    name: &'static str,
    interval_ms: Millis,
    last_run: Millis,
    task: Task<C>,
}

pub struct Scheduler<C> {
    entries: Vec<Entry<C>>,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Registers `task` to run every `interval_ms`, first due one interval
    /// after `now`.
    pub fn every<F>(&mut self, name: &'static str, interval_ms: Millis, now: Millis, task: F)
    where
        F: FnMut(&mut C, Millis) + Send + 'static,
    {
        tracing::debug!(name, interval_ms, "task registered");
        self.entries.push(Entry {
            name,
            interval_ms,
            last_run: now,
            task: Box::new(task),
        });
    }

    /// Runs every due task once. Returns how many ran.
    ///
    /// A task that falls behind runs once and re-bases on `now`; missed
    /// periods are not replayed.
    pub fn tick(&mut self, ctx: &mut C, now: Millis) -> usize {
        let mut ran = 0;
        for entry in &mut self.entries {
            if now.saturating_sub(entry.last_run) >= entry.interval_ms {
                entry.last_run = now;
                (entry.task)(ctx, now);
                ran += 1;
            }
        }
        ran
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }
}

impl<C> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.name, e.interval_ms)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_when_interval_elapsed() {
        let mut sched: Scheduler<Vec<Millis>> = Scheduler::new();
        sched.every("fast", 50, 0, |log, now| log.push(now));

        let mut log = Vec::new();
        for now in (0..=200).step_by(10) {
            sched.tick(&mut log, now);
        }
        assert_eq!(log, vec![50, 100, 150, 200]);
    }

    #[test]
    fn registration_order_within_a_tick() {
        let mut sched: Scheduler<Vec<&'static str>> = Scheduler::new();
        sched.every("a", 10, 0, |log, _| log.push("a"));
        sched.every("b", 10, 0, |log, _| log.push("b"));
        sched.every("slow", 1000, 0, |log, _| log.push("slow"));

        let mut log = Vec::new();
        assert_eq!(sched.tick(&mut log, 10), 2);
        assert_eq!(log, vec!["a", "b"]);
        assert_eq!(sched.names().collect::<Vec<_>>(), vec!["a", "b", "slow"]);
    }

    #[test]
    fn late_tick_does_not_replay_missed_periods() {
        let mut sched: Scheduler<u32> = Scheduler::new();
        sched.every("count", 100, 0, |n, _| *n += 1);

        let mut count = 0;
        sched.tick(&mut count, 1000);
        assert_eq!(count, 1);
        sched.tick(&mut count, 1050);
        assert_eq!(count, 1);
        sched.tick(&mut count, 1100);
        assert_eq!(count, 2);
    }

    #[test]
    fn clear_removes_all_tasks() {
        let mut sched: Scheduler<u32> = Scheduler::new();
        sched.every("x", 1, 0, |n, _| *n += 1);
        assert_eq!(sched.len(), 1);
        sched.clear();
        assert!(sched.is_empty());
        let mut count = 0;
        assert_eq!(sched.tick(&mut count, 100), 0);
    }
}
