use crate::region::RegionPosition;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

struct QueueState {
    order: VecDeque<RegionPosition>,
    queued: FxHashSet<RegionPosition>,
    closed: bool,
}

/// Blocking FIFO of regions waiting to be parsed.
///
/// A position already waiting in the queue is not added again. Each
/// successful push wakes one waiting consumer.
pub struct RegionQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl Default for RegionQueue {
    fn default() -> Self {
        RegionQueue::new()
    }
}

impl RegionQueue {
    pub fn new() -> Self {
        RegionQueue {
            state: Mutex::new(QueueState {
                order: VecDeque::new(),
                queued: FxHashSet::default(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Returns false if the position was already waiting or the queue is
    /// closed.
    pub fn push(&self, position: RegionPosition) -> bool {
        let mut state = self.state.lock();
        if state.closed || !state.queued.insert(position) {
            return false;
        }
        state.order.push_back(position);
        self.available.notify_one();
        true
    }

    /// Wait for the next position. `None` once the queue is closed.
    pub fn take(&self) -> Option<RegionPosition> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(position) = state.order.pop_front() {
                state.queued.remove(&position);
                return Some(position);
            }
            self.available.wait(&mut state);
        }
    }

    pub fn try_take(&self) -> Option<RegionPosition> {
        let mut state = self.state.lock();
        let position = state.order.pop_front()?;
        state.queued.remove(&position);
        Some(position)
    }

    pub fn len(&self) -> usize {
        self.state.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every waiting position.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.order.clear();
        state.queued.clear();
    }

    /// Wake all consumers and refuse further pushes.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
