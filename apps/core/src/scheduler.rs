use std::time::Duration;

#[derive(Debug)]
struct Timer<K, T> {
    seq: u64,
    key: K,
    due: Duration,
    task: T,
}

#[derive(Debug)]
pub struct Scheduler<K, T> {
    now: Duration,
    next_seq: u64,
    timers: Vec<Timer<K, T>>,
}

impl<K, T> Default for Scheduler<K, T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            timers: Vec::new(),
        }
    }
}

impl<K: Copy + Eq, T> Scheduler<K, T> {
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Returns whether a pending timer in the same slot was replaced.
    pub fn schedule(&mut self, key: K, delay: Duration, task: T) -> bool {
        let replaced = self.cancel(key);
        self.timers.push(Timer {
            seq: self.next_seq,
            key,
            due: self.now + delay,
            task,
        });
        self.next_seq += 1;
        replaced
    }

    pub fn cancel(&mut self, key: K) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.key != key);
        self.timers.len() != before
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        self.timers.clear();
        count
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.timers.iter().any(|timer| timer.key == key)
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    // Ties fire in scheduling order.
    pub fn pop_due(&mut self, until: Duration) -> Option<T> {
        let position = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.due <= until)
            .min_by_key(|(_, timer)| (timer.due, timer.seq))
            .map(|(position, _)| position)?;

        let timer = self.timers.swap_remove(position);
        self.now = self.now.max(timer.due);
        Some(timer.task)
    }

    pub fn advance_to(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}
