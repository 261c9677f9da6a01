use std::time::Duration;

/// Opaque identity of one scheduled timer. Ids increase monotonically and
/// are never reused within a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A due timer popped from the queue, carrying the token it was scheduled
/// with so the receiver can validate it before acting.
#[derive(Debug, Clone, Copy)]
pub struct FiredTimer<T> {
    pub handle: TimerHandle,
    pub token: T,
    pub deadline_ns: u64,
}

#[derive(Debug, Clone)]
struct TimerEntry<T> {
    handle: TimerHandle,
    deadline_ns: u64,
    token: T,
}

/// Cancelable one-shot timers over a caller-supplied clock reading.
///
/// An entry fires at most once: it is removed before delivery. Canceling a
/// handle that already fired or was already canceled is a no-op.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    entries: Vec<TimerEntry<T>>,
    next_id: u64,
}

impl<T: Copy> TimerQueue<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_id: 0 }
    }

    /// Schedule a one-shot timer `delay` after `now_ns`.
    pub fn schedule(&mut self, now_ns: u64, delay: Duration, token: T) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.entries.push(TimerEntry {
            handle,
            deadline_ns: now_ns + delay.as_nanos() as u64,
            token,
        });
        handle
    }

    /// Remove a pending timer. No-op for fired or already-canceled handles.
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.entries.retain(|e| e.handle != handle);
    }

    /// Earliest pending deadline, if any timer is scheduled.
    pub fn next_deadline_ns(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.deadline_ns).min()
    }

    /// Remove and return the next timer due at `now_ns`. Ties resolve in
    /// scheduling order. Returns `None` when nothing is due yet.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<FiredTimer<T>> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline_ns <= now_ns)
            .min_by_key(|(_, e)| (e.deadline_ns, e.handle.0))
            .map(|(i, _)| i)?;
        let entry = self.entries.swap_remove(idx);
        Some(FiredTimer {
            handle: entry.handle,
            token: entry.token,
            deadline_ns: entry.deadline_ns,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
