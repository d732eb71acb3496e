//! Deferred timer queue.
//!
//! The engine never runs callbacks inline: every state transition that could
//! destroy an animation, and every host-visible event dispatch, is staged as
//! a timer task here and fired later from the controller's `tick`. This is
//! what keeps destructive work off the style-resolution call stack.
//!
//! Timers run on a host-supplied monotonic clock (`f64` seconds). The queue
//! never reads wall-clock time; the host passes `now` when scheduling and
//! when draining, which also makes every timing behavior deterministic under
//! test.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<T> {
    task: T,
    /// Repeat interval in seconds, `None` for one-shot timers.
    interval: Option<f64>,
}

/// Heap key ordered by fire time, then FIFO by scheduling sequence.
#[derive(Debug, Clone, Copy)]
struct HeapKey {
    fire_at: f64,
    seq: u64,
    id: TimerId,
}

impl PartialEq for HeapKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapKey {}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest timer surfaces
        // first, with the scheduling sequence breaking ties FIFO.
        self.fire_at
            .total_cmp(&other.fire_at)
            .then(self.seq.cmp(&other.seq))
            .reverse()
    }
}

/// A monotonic virtual-time timer queue over task payloads of type `T`.
#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: HashMap<TimerId, Entry<T>>,
    heap: BinaryHeap<HeapKey>,
    next_id: u64,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            heap: BinaryHeap::new(),
            next_id: 1,
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, fire_at: f64, id: TimerId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(HeapKey { fire_at, seq, id });
    }

    /// Schedule a one-shot timer `delay` seconds after `now`. Negative
    /// delays clamp to zero; the task still fires from a later drain, never
    /// inline.
    pub fn schedule(&mut self, now: f64, delay: f64, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, Entry { task, interval: None });
        self.push(now + delay.max(0.0), id);
        id
    }

    /// Schedule a repeating timer firing every `interval` seconds, first at
    /// `now + interval`.
    pub fn schedule_repeating(&mut self, now: f64, interval: f64, task: T) -> TimerId {
        let interval = interval.max(0.0);
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                task,
                interval: Some(interval),
            },
        );
        self.push(now + interval, id);
        id
    }

    /// Cancel a timer. Returns true if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Earliest pending fire time, pruning cancelled heap residue.
    pub fn next_fire_time(&mut self) -> Option<f64> {
        while let Some(top) = self.heap.peek() {
            if self.entries.contains_key(&top.id) {
                return Some(top.fire_at);
            }
            self.heap.pop();
        }
        None
    }

    /// Pop the next timer due at or before `now`, re-arming repeating
    /// timers. Returns `None` when nothing further is due.
    pub fn pop_due(&mut self, now: f64) -> Option<(TimerId, T)>
    where
        T: Clone,
    {
        loop {
            let top = *self.heap.peek()?;
            if !self.entries.contains_key(&top.id) {
                self.heap.pop();
                continue;
            }
            if top.fire_at > now {
                return None;
            }
            self.heap.pop();
            let entry = self.entries.get(&top.id).expect("entry checked above");
            match entry.interval {
                Some(interval) => {
                    let task = entry.task.clone();
                    // Re-arm from the drain point so a stalled host does not
                    // replay a backlog of heartbeats.
                    self.push(now + interval, top.id);
                    return Some((top.id, task));
                }
                None => {
                    let entry = self.entries.remove(&top.id).expect("entry checked above");
                    return Some((top.id, entry.task));
                }
            }
        }
    }
}
