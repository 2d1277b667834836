//! Outbound queue for envelopes published while the channel is not open.

use std::collections::VecDeque;

use serde::Deserialize;

/// Order in which queued envelopes are flushed once the channel opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainOrder {
    /// Insertion order.
    #[default]
    Fifo,
    /// Reverse insertion order. Older web clients pushed and popped the same
    /// end of their queue; only select this for consumers that depend on it.
    Lifo,
}

/// Serialized envelopes waiting for an open channel.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    items: VecDeque<String>,
    order: DrainOrder,
}

impl OutboundQueue {
    pub fn new(order: DrainOrder) -> Self {
        Self {
            items: VecDeque::new(),
            order,
        }
    }

    pub fn push(&mut self, raw: String) {
        self.items.push_back(raw);
    }

    /// Put back frames that were drained but never written, so they are the
    /// first to go out on the next drain, in the given order.
    pub fn requeue_front(&mut self, unsent: Vec<String>) {
        for raw in unsent.into_iter().rev() {
            match self.order {
                DrainOrder::Fifo => self.items.push_front(raw),
                DrainOrder::Lifo => self.items.push_back(raw),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take every queued envelope, in drain order. The queue is empty after.
    pub fn drain(&mut self) -> Vec<String> {
        match self.order {
            DrainOrder::Fifo => self.items.drain(..).collect(),
            DrainOrder::Lifo => self.items.drain(..).rev().collect(),
        }
    }
}
