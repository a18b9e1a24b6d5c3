//! Virtual-Time Timer Queue
//!
//! Every delay in the match engine (match confirm, flip-back, input lock,
//! completion grace, preview) is a timer on this queue. Time is a plain
//! millisecond counter supplied by the caller, so the engine stays
//! deterministic and can be driven by tests or by a real-time runner alike.
//!
//! [`TimerQueue::cancel_all`] removes every pending timer, so a timer
//! scheduled by a previous session can never fire into a freshly built deck.

use std::collections::BTreeMap;

/// Virtual time in milliseconds.
pub type Millis = u64;

/// A timer that came due.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FiredTimer<K> {
    /// When the timer was due (the logical time it fires at).
    pub due_ms: Millis,
    /// Timer payload.
    pub kind: K,
}

/// Ordered queue of pending timers.
///
/// Ordering is by due time, then by scheduling order, so two timers due at
/// the same instant fire in the order they were scheduled.
#[derive(Clone, Debug)]
pub struct TimerQueue<K> {
    entries: BTreeMap<(Millis, u64), K>,
    next_seq: u64,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimerQueue<K> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `kind` to fire `delay_ms` after `now_ms`.
    pub fn schedule(&mut self, now_ms: Millis, delay_ms: Millis, kind: K) {
        let due = now_ms.saturating_add(delay_ms);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((due, seq), kind);
    }

    /// Drop every pending timer.
    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    /// Earliest pending due time.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.entries.keys().next().map(|(due, _)| *due)
    }

    /// Pop the earliest timer due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: Millis) -> Option<FiredTimer<K>> {
        let entry = self.entries.first_entry()?;
        let (due_ms, _) = *entry.key();
        if due_ms > now_ms {
            return None;
        }
        Some(FiredTimer {
            due_ms,
            kind: entry.remove(),
        })
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
