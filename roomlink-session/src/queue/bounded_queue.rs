use crate::error::QueueError;
use std::collections::VecDeque;

/// What happens when an item is offered to a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued item to make room.
    DropOldest,
    /// Keep the queue as is and discard the offered item.
    DropNewest,
    /// Refuse the offered item with `QueueError::Full`.
    #[default]
    Reject,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Enqueued<T> {
    Queued,
    /// Queued after evicting this older item.
    Evicted(T),
    /// Not queued; the offered item is handed back.
    Discarded(T),
}

/// FIFO buffer for payloads whose destination is not writable yet.
///
/// Draining hands out a point-in-time batch, so anything queued after the
/// batch was taken waits for the next drain.
#[derive(Debug)]
pub struct Queue<T> {
    items: VecDeque<T>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T> Queue<T> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
            policy,
        }
    }

    pub fn enqueue(&mut self, item: T) -> Result<Enqueued<T>, QueueError> {
        if self.items.len() < self.capacity {
            self.items.push_back(item);
            return Ok(Enqueued::Queued);
        }

        match self.policy {
            OverflowPolicy::DropOldest => {
                let evicted = self.items.pop_front();
                self.items.push_back(item);
                Ok(evicted.map_or(Enqueued::Queued, Enqueued::Evicted))
            }
            OverflowPolicy::DropNewest => Ok(Enqueued::Discarded(item)),
            OverflowPolicy::Reject => Err(QueueError::Full {
                capacity: self.capacity,
            }),
        }
    }

    /// Takes every queued item in FIFO order and leaves the queue empty.
    pub fn take_batch(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    /// Puts items that could not be delivered back in front of anything
    /// queued since, preserving their original order.
    pub fn requeue_front(&mut self, items: Vec<T>) {
        for item in items.into_iter().rev() {
            self.items.push_front(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
