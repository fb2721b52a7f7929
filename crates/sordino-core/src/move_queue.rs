//! Ring buffer of trapezoidal kinematic moves.
//!
//! The planner writes moves, the shaper reads them by index. Indices are
//! monotonically increasing counters; a slot stays addressable until the
//! queue retires it, and every dereference goes through a liveness check
//! so the shaper can never observe a recycled slot.

use thiserror::Error;

/// X, Y, Z plus the extruder.
pub const AXIS_COUNT: usize = 4;

/// Which axis a shaper (or position query) operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
    E,
}

impl Axis {
    /// Parse axis from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            "e" => Some(Axis::E),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::E => "e",
        }
    }

    pub const fn index(&self) -> usize {
        *self as usize
    }
}

/// One trapezoidal-profile segment.
///
/// Times are in milliseconds, `start_v` in mm/ms, `accelerate` in
/// mm/ms². Per-axis position over the move is the quadratic
/// `start_pos + (start_v·t + 0.5·accelerate·t²)·axis_r` for elapsed
/// time `t` within the move's span.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Move {
    pub start_t: f64,
    pub end_t: f64,
    pub start_v: f64,
    pub accelerate: f64,
    pub start_pos: [f64; AXIS_COUNT],
    pub axis_r: [f64; AXIS_COUNT],
}

impl Move {
    /// Distance traveled along the move direction after `move_time`.
    pub fn distance_at(&self, move_time: f64) -> f64 {
        (self.start_v + 0.5 * self.accelerate * move_time) * move_time
    }

    /// Axis position at absolute time `t`, clamped to the move's span.
    pub fn axis_position(&self, axis: Axis, t: f64) -> f64 {
        let move_time = (t - self.start_t).clamp(0.0, self.end_t - self.start_t);
        self.start_pos[axis.index()] + self.axis_r[axis.index()] * self.distance_at(move_time)
    }

    /// Coordinates at the end of the move.
    pub fn end_pos(&self) -> [f64; AXIS_COUNT] {
        let dist = self.distance_at(self.end_t - self.start_t);
        let mut pos = self.start_pos;
        for (p, r) in pos.iter_mut().zip(self.axis_r.iter()) {
            *p += r * dist;
        }
        pos
    }
}

#[derive(Debug, Error)]
pub enum MoveQueueError {
    #[error("move queue full: capacity {capacity}")]
    Full { capacity: usize },
}

/// Single-writer / single-reader circular move buffer.
pub struct MoveQueue {
    slots: Vec<Move>,
    mask: usize,
    tail: usize,
    head: usize,
    last_end_t: f64,
    last_end_pos: [f64; AXIS_COUNT],
}

impl MoveQueue {
    /// Create a queue with at least `capacity` slots (rounded up to a
    /// power of two).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            slots: vec![Move::default(); capacity],
            mask: capacity - 1,
            tail: 0,
            head: 0,
            last_end_t: 0.0,
            last_end_pos: [0.0; AXIS_COUNT],
        }
    }

    pub fn len(&self) -> usize {
        self.head - self.tail
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Oldest live index.
    pub fn tail_index(&self) -> usize {
        self.tail
    }

    /// Newest live index. Only meaningful when the queue is non-empty.
    pub fn last_index(&self) -> usize {
        self.head.saturating_sub(1)
    }

    /// Is `index` still addressable (not yet retired, already written)?
    pub fn is_between(&self, index: usize) -> bool {
        index >= self.tail && index < self.head
    }

    pub fn prev_index(&self, index: usize) -> usize {
        index.saturating_sub(1)
    }

    pub fn next_index(&self, index: usize) -> usize {
        index + 1
    }

    pub fn get(&self, index: usize) -> Option<&Move> {
        if self.is_between(index) {
            Some(&self.slots[index & self.mask])
        } else {
            None
        }
    }

    /// Append a move chained onto the previous one's end time and end
    /// position. Returns the new move's index.
    pub fn push_move(
        &mut self,
        duration: f64,
        start_v: f64,
        accelerate: f64,
        axis_r: [f64; AXIS_COUNT],
    ) -> Result<usize, MoveQueueError> {
        if self.len() == self.slots.len() {
            return Err(MoveQueueError::Full {
                capacity: self.slots.len(),
            });
        }

        let m = Move {
            start_t: self.last_end_t,
            end_t: self.last_end_t + duration,
            start_v,
            accelerate,
            start_pos: self.last_end_pos,
            axis_r,
        };
        self.last_end_t = m.end_t;
        self.last_end_pos = m.end_pos();

        let index = self.head;
        self.slots[index & self.mask] = m;
        self.head += 1;
        Ok(index)
    }

    /// Retire moves that end at or before `t`, freeing their slots.
    pub fn finalize_moves(&mut self, t: f64) {
        while self.tail < self.head {
            if self.slots[self.tail & self.mask].end_t > t {
                break;
            }
            self.tail += 1;
        }
    }

    /// Unshaped axis position at absolute time `t`, starting the lookup
    /// at `index` and walking to the move containing `t`. The walk is
    /// clamped to `[range_start, range_end]` and the evaluation to the
    /// final move's span.
    pub fn axis_position_across_moves(
        &self,
        index: usize,
        axis: Axis,
        t: f64,
        range_start: usize,
        range_end: usize,
    ) -> f64 {
        let mut index = index;
        let Some(mut mv) = self.get(index).copied() else {
            return 0.0;
        };
        while t > mv.end_t && index != range_end {
            index = self.next_index(index);
            match self.get(index) {
                Some(m) => mv = *m,
                None => break,
            }
        }
        while t < mv.start_t && index != range_start {
            index = self.prev_index(index);
            match self.get(index) {
                Some(m) => mv = *m,
                None => break,
            }
        }
        mv.axis_position(axis, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X_ONLY: [f64; AXIS_COUNT] = [1.0, 0.0, 0.0, 0.0];

    #[test]
    fn axis_parse() {
        assert_eq!(Axis::parse("x"), Some(Axis::X));
        assert_eq!(Axis::parse("E"), Some(Axis::E));
        assert_eq!(Axis::parse("w"), None);
    }

    #[test]
    fn moves_chain_time_and_position() {
        let mut q = MoveQueue::new(8);
        // accelerate for 100ms at 0.002 mm/ms^2
        let i0 = q.push_move(100.0, 0.0, 0.002, X_ONLY).unwrap();
        let i1 = q.push_move(50.0, 0.2, 0.0, X_ONLY).unwrap();
        let m0 = *q.get(i0).unwrap();
        let m1 = *q.get(i1).unwrap();
        assert_eq!(m0.start_t, 0.0);
        assert_eq!(m0.end_t, 100.0);
        assert_eq!(m1.start_t, 100.0);
        // 0.5 * 0.002 * 100^2 = 10 mm
        assert!((m1.start_pos[0] - 10.0).abs() < 1e-12);
        assert_eq!(m1.start_v, 0.2);
    }

    #[test]
    fn liveness_checks_and_retirement() {
        let mut q = MoveQueue::new(4);
        let i0 = q.push_move(100.0, 0.0, 0.0, X_ONLY).unwrap();
        let i1 = q.push_move(100.0, 0.0, 0.0, X_ONLY).unwrap();
        assert!(q.is_between(i0));
        assert!(!q.is_between(i1 + 1));
        q.finalize_moves(150.0);
        assert!(!q.is_between(i0));
        assert!(q.is_between(i1));
        assert_eq!(q.tail_index(), i1);
        assert!(q.get(i0).is_none());
    }

    #[test]
    fn push_fails_when_full() {
        let mut q = MoveQueue::new(2);
        q.push_move(1.0, 0.0, 0.0, X_ONLY).unwrap();
        q.push_move(1.0, 0.0, 0.0, X_ONLY).unwrap();
        assert!(matches!(
            q.push_move(1.0, 0.0, 0.0, X_ONLY),
            Err(MoveQueueError::Full { capacity: 2 })
        ));
    }

    #[test]
    fn position_law_clamps_to_move_span() {
        let mut q = MoveQueue::new(4);
        let i0 = q.push_move(100.0, 0.1, 0.0, X_ONLY).unwrap();
        let m = q.get(i0).unwrap();
        assert_eq!(m.axis_position(Axis::X, 50.0), 5.0);
        // before the start and past the end clamp to the endpoints
        assert_eq!(m.axis_position(Axis::X, -10.0), 0.0);
        assert_eq!(m.axis_position(Axis::X, 500.0), 10.0);
    }

    #[test]
    fn across_moves_walks_forward_and_backward() {
        let mut q = MoveQueue::new(8);
        let i0 = q.push_move(100.0, 0.1, 0.0, X_ONLY).unwrap();
        let i1 = q.push_move(100.0, 0.2, 0.0, X_ONLY).unwrap();
        let i2 = q.push_move(100.0, 0.1, 0.0, X_ONLY).unwrap();

        // t in the third move, starting from the first
        let pos = q.axis_position_across_moves(i0, Axis::X, 250.0, i0, i2);
        // 10 + 20 + 0.1*50 = 35
        assert!((pos - 35.0).abs() < 1e-12);

        // t in the first move, starting from the last
        let pos = q.axis_position_across_moves(i2, Axis::X, 50.0, i0, i2);
        assert!((pos - 5.0).abs() < 1e-12);

        // walk clamped to a sub-range: t beyond i1's end evaluates at
        // i1's endpoint
        let pos = q.axis_position_across_moves(i0, Axis::X, 250.0, i0, i1);
        assert!((pos - 30.0).abs() < 1e-12);
    }

    #[test]
    fn across_moves_on_dead_index_is_zero() {
        let q = MoveQueue::new(4);
        assert_eq!(q.axis_position_across_moves(0, Axis::X, 0.0, 0, 0), 0.0);
    }
}
