use std::collections::VecDeque;
use std::sync::Arc;

use corelib::{Bar, BarError, FeedUpdate, IndicatorSet};
use thiserror::Error;

use crate::indicators;

pub const DEFAULT_CAPACITY: usize = 100;

/// Immutable copy of a window handed to consumers.
pub type WindowSnapshot = Arc<[Bar]>;

/// Reasons an update is rejected. The window is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WindowError {
    #[error("out-of-order bar: last start {last}, got {got}")]
    OutOfOrder { last: u64, got: u64 },

    #[error("bar starting at {start_time} is already closed")]
    ClosedBarMutation { start_time: u64 },

    #[error("volume decreased within open bar: {before} -> {after}")]
    VolumeDecreased { before: f64, after: f64 },

    #[error("invalid bar: {0}")]
    InvalidBar(#[from] BarError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The open tail bar was replaced by a newer version of itself.
    UpdatedOpen,
    /// The open tail bar received its final values.
    SealedOpen,
    /// A new open bar was appended.
    Opened,
    /// A bar arrived already final with no open predecessor to seal.
    AppendedClosed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Applied {
    pub change: Change,
    /// The previous tail was still open and got sealed as-is because a
    /// newer bar arrived without a final update for it.
    pub sealed_previous: bool,
    pub evicted: Option<Bar>,
}

/// Bounded, ordered bar history (oldest first).
///
/// Invariants:
/// - `start_time` strictly increases front to back
/// - every bar satisfies the OHLC range check
/// - only the back bar may be open
/// - length never exceeds `capacity`; the oldest bar is evicted first
#[derive(Debug, Clone)]
pub struct Window {
    bars: VecDeque<Bar>,
    capacity: usize,
    tail_open: bool,
}

impl Window {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bars: VecDeque::with_capacity(capacity + 1),
            capacity,
            tail_open: false,
        }
    }

    /// Replaces the contents with closed history.
    ///
    /// Bars that are invalid or not strictly newer than their predecessor
    /// are skipped; only the newest `capacity` are kept. Returns how many
    /// bars were skipped.
    pub fn seed(&mut self, history: impl IntoIterator<Item = Bar>) -> usize {
        self.bars.clear();
        self.tail_open = false;

        let mut rejected = 0;
        for bar in history {
            let in_order = self.bars.back().is_none_or(|last| bar.start_time > last.start_time);
            if !in_order || bar.validate().is_err() {
                rejected += 1;
                continue;
            }

            self.bars.push_back(bar);
            if self.bars.len() > self.capacity {
                self.bars.pop_front();
            }
        }

        rejected
    }

    /// Merges one feed update.
    ///
    /// - same start as an open tail: replace it (and seal it when final)
    /// - newer start: append (open unless final); an unsealed tail is sealed
    /// - older start, a closed tail, shrinking volume or a broken OHLC range:
    ///   rejected
    pub fn apply(&mut self, update: &FeedUpdate) -> Result<Applied, WindowError> {
        let bar = update.bar;
        bar.validate()?;

        if let Some(last) = self.bars.back_mut() {
            if bar.start_time < last.start_time {
                return Err(WindowError::OutOfOrder {
                    last: last.start_time,
                    got: bar.start_time,
                });
            }

            if bar.start_time == last.start_time {
                if !self.tail_open {
                    return Err(WindowError::ClosedBarMutation {
                        start_time: bar.start_time,
                    });
                }
                if bar.volume < last.volume {
                    return Err(WindowError::VolumeDecreased {
                        before: last.volume,
                        after: bar.volume,
                    });
                }

                *last = bar;
                self.tail_open = !update.is_final;

                let change = if update.is_final {
                    Change::SealedOpen
                } else {
                    Change::UpdatedOpen
                };
                return Ok(Applied {
                    change,
                    sealed_previous: false,
                    evicted: None,
                });
            }
        }

        let sealed_previous = self.tail_open;
        self.bars.push_back(bar);
        self.tail_open = !update.is_final;

        let evicted = if self.bars.len() > self.capacity {
            self.bars.pop_front()
        } else {
            None
        };

        let change = if update.is_final {
            Change::AppendedClosed
        } else {
            Change::Opened
        };

        Ok(Applied {
            change,
            sealed_previous,
            evicted,
        })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Newest bar if it is closed.
    pub fn last_closed(&self) -> Option<&Bar> {
        if self.tail_open {
            self.bars.iter().rev().nth(1)
        } else {
            self.bars.back()
        }
    }

    pub fn is_tail_open(&self) -> bool {
        self.tail_open && !self.bars.is_empty()
    }

    pub fn as_slice(&mut self) -> &[Bar] {
        self.bars.make_contiguous()
    }

    pub fn snapshot(&mut self) -> WindowSnapshot {
        Arc::from(self.as_slice())
    }

    pub fn indicators(&mut self) -> IndicatorSet {
        indicators::compute(self.as_slice())
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
