//! Deterministic capture queue for emitted events.
//!
//! Every event leaving a node during evaluation can be copied into a
//! fixed-capacity ring buffer, tagged with a strictly increasing sequence
//! number. Evaluation is single-threaded, so the `(seq, event)` pairs are
//! reproducible for identical plan, window, transport and state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::NodeId;
use crate::value::Event;

/// What happens when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Evict the oldest entry to make room.
    #[default]
    DropOldest,
    /// Discard the incoming event; its sequence number is still consumed,
    /// leaving a visible gap.
    DropNewest,
    /// Stop capturing; later events get no sequence number.
    Clip,
    /// Stop capturing and report an overflow.
    Error,
}

/// Capture settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Maximum number of retained events.
    pub capacity: usize,
    /// Behavior at capacity.
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

/// One captured event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedEvent {
    /// Sequence number, strictly increasing in emission order.
    pub seq: u64,
    /// Emitting node.
    pub node: NodeId,
    /// Emitting port.
    pub port: String,
    /// The event.
    pub event: Event,
}

/// Raised under [`OverflowPolicy::Error`] when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("capture queue full at {capacity} events")]
pub struct QueueFull {
    /// Capacity that was exceeded.
    pub capacity: usize,
}

/// Fixed-capacity ring buffer of captured events.
#[derive(Debug, Clone)]
pub struct EventQueue {
    config: CaptureConfig,
    buf: VecDeque<CapturedEvent>,
    next_seq: u64,
    dropped: u64,
    stopped: bool,
}

impl EventQueue {
    /// Creates an empty queue; sequence numbers start at 0.
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            buf: VecDeque::with_capacity(config.capacity.min(4096)),
            next_seq: 0,
            dropped: 0,
            stopped: false,
        }
    }

    /// Captures one event.
    pub fn push(&mut self, node: &NodeId, port: &str, event: &Event) -> Result<(), QueueFull> {
        if self.stopped {
            self.dropped += 1;
            return Ok(());
        }
        if self.buf.len() >= self.config.capacity {
            match self.config.overflow {
                OverflowPolicy::DropOldest => {
                    self.buf.pop_front();
                    self.dropped += 1;
                }
                OverflowPolicy::DropNewest => {
                    self.next_seq += 1;
                    self.dropped += 1;
                    return Ok(());
                }
                OverflowPolicy::Clip => {
                    self.stopped = true;
                    self.dropped += 1;
                    return Ok(());
                }
                OverflowPolicy::Error => {
                    self.stopped = true;
                    self.dropped += 1;
                    return Err(QueueFull {
                        capacity: self.config.capacity,
                    });
                }
            }
        }
        if self.config.capacity == 0 {
            return Ok(());
        }
        self.buf.push_back(CapturedEvent {
            seq: self.next_seq,
            node: node.clone(),
            port: port.to_string(),
            event: event.clone(),
        });
        self.next_seq += 1;
        Ok(())
    }

    /// Events lost to the overflow policy.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &CapturedEvent> {
        self.buf.iter()
    }

    /// Consumes the queue, returning retained events oldest first.
    pub fn into_events(self) -> Vec<CapturedEvent> {
        self.buf.into()
    }
}
