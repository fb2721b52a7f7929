//! Downstream segment sink.
//!
//! The shaper emits an ordered, gapless stream of quadratic position
//! segments through the [`SegmentSink`] trait; [`FuncManager`] is the
//! queue-backed implementation the stepper-pulse generator samples.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One emitted quadratic position law.
///
/// `position(t) = a·(t−start)² + b·(t−start) + c` for `t` in
/// `[start, end)`. `pos` is the shaped position at `end`, recorded from
/// the direct convolution as a correctness anchor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub start: f64,
    pub end: f64,
    pub pos: f64,
}

impl Segment {
    pub fn position_at(&self, t: f64) -> f64 {
        let dt = t - self.start;
        (self.a * dt + self.b) * dt + self.c
    }
}

/// Consumer of the shaper's segment stream.
pub trait SegmentSink {
    /// Next unconsumed instant; the shaper resumes from here.
    fn last_time(&self) -> f64;

    fn push_segment(&mut self, segment: Segment);

    /// Diagnostics only; called after each generation batch.
    fn update_high_water(&mut self) {}
}

#[derive(Debug, Default)]
pub struct FuncManager {
    segments: VecDeque<Segment>,
    last_time: f64,
    max_size: usize,
}

impl FuncManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// High-water mark of stored segments.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Evaluate the stored piecewise quadratic at `t`. The final
    /// segment's end instant is treated as inclusive so callers can
    /// sample the stream's closing boundary.
    pub fn position_at(&self, t: f64) -> Option<f64> {
        for s in &self.segments {
            if t >= s.start && t < s.end {
                return Some(s.position_at(t));
            }
        }
        match self.segments.back() {
            Some(s) if t == s.end => Some(s.position_at(t)),
            _ => None,
        }
    }

    /// Drop segments fully consumed before `t`.
    pub fn prune(&mut self, t: f64) {
        while let Some(front) = self.segments.front() {
            if front.end > t {
                break;
            }
            self.segments.pop_front();
        }
    }
}

impl SegmentSink for FuncManager {
    fn last_time(&self) -> f64 {
        self.last_time
    }

    fn push_segment(&mut self, segment: Segment) {
        self.last_time = segment.end;
        self.segments.push_back(segment);
    }

    fn update_high_water(&mut self) {
        if self.max_size < self.segments.len() {
            self.max_size = self.segments.len();
        }
    }
}
