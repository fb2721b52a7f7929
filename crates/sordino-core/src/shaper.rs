//! Per-axis input shaping.
//!
//! A shaper kind plus damping ratio and natural frequency define a
//! forward impulse train; its time-reversed, renormalized, centered form
//! is the convolution kernel slid along the move queue. The window keeps
//! one quadratic per kernel pulse and advances one move boundary at a
//! time, so each emitted segment costs a single fresh derivation plus a
//! cheap re-centering of the rest.

use crate::{
    func_manager::{Segment, SegmentSink},
    move_queue::{Axis, MoveQueue},
    window::{MAX_PULSES, ShaperWindow},
};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};

const MS_PER_SEC: f64 = 1000.0;

// Pulse times snapped to a move boundary compare exactly; only the
// initial window placement carries rounding, bounded well below this.
const TIME_EPSILON: f64 = 1e-9;

/// Supported vibration-reduction filter families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaperKind {
    /// Identity pass-through, no compensation.
    #[default]
    None,
    Zv,
    Mzv,
    Zvd,
    Ei3,
}

impl ShaperKind {
    /// Parse shaper kind from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(ShaperKind::None),
            "zv" => Some(ShaperKind::Zv),
            "mzv" => Some(ShaperKind::Mzv),
            "zvd" => Some(ShaperKind::Zvd),
            "ei3" => Some(ShaperKind::Ei3),
            _ => None,
        }
    }
}

/// Shaper configuration for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShaperConfig {
    pub kind: ShaperKind,

    /// Natural frequency in Hz.
    #[serde(default = "default_frequency")]
    pub frequency: f64,

    /// Damping ratio ζ, in `[0, 1)`.
    #[serde(default = "default_zeta")]
    pub zeta: f64,

    /// Residual-vibration reduction target for EI shapers
    /// (tolerance is its reciprocal).
    #[serde(default = "default_vibration_reduction")]
    pub vibration_reduction: f64,

    /// Combined coefficients below this magnitude snap to zero.
    #[serde(default = "default_coeff_epsilon")]
    pub coeff_epsilon: f64,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            kind: ShaperKind::None,
            frequency: default_frequency(),
            zeta: default_zeta(),
            vibration_reduction: default_vibration_reduction(),
            coeff_epsilon: default_coeff_epsilon(),
        }
    }
}

fn default_frequency() -> f64 {
    50.0
}

fn default_zeta() -> f64 {
    0.1
}

fn default_vibration_reduction() -> f64 {
    20.0
}

fn default_coeff_epsilon() -> f64 {
    1e-8
}

/// Fixed-capacity impulse train: `(amplitude, time-offset)` pairs.
#[derive(Clone, Copy, Debug, Default)]
pub struct PulseTrain {
    pub amplitude: [f64; MAX_PULSES],
    pub time: [f64; MAX_PULSES],
    pub n: usize,
}

impl PulseTrain {
    fn push(&mut self, amplitude: f64, time: f64) {
        self.amplitude[self.n] = amplitude;
        self.time[self.n] = time;
        self.n += 1;
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        (0..self.n).map(|i| (self.amplitude[i], self.time[i]))
    }
}

/// Build the forward impulse train from the closed-form coefficients.
/// Offsets are in seconds here; [`PulseSet::new`] rescales them.
fn forward_pulses(config: &ShaperConfig) -> PulseTrain {
    let mut train = PulseTrain::default();
    let zeta = config.zeta;
    let frequency = config.frequency;

    // Out-of-range damping or frequency degrades to the identity
    // pass-through, same as an unsupported kind.
    let kind = if frequency > 0.0 && (0.0..1.0).contains(&zeta) {
        config.kind
    } else {
        ShaperKind::None
    };

    let df = (1.0 - zeta * zeta).sqrt();
    let t_d = 1.0 / (frequency * df);

    match kind {
        ShaperKind::None => {
            train.push(1.0, 0.0);
        }
        ShaperKind::Zv => {
            let k = (-zeta * PI / df).exp();
            train.push(1.0, 0.0);
            train.push(k, 0.5 * t_d);
        }
        ShaperKind::Mzv => {
            let k = (-0.75 * zeta * PI / df).exp();
            let a1 = 1.0 - 1.0 / SQRT_2;
            train.push(a1, 0.0);
            train.push((SQRT_2 - 1.0) * k, 0.375 * t_d);
            train.push(a1 * k * k, 0.75 * t_d);
        }
        ShaperKind::Zvd => {
            let k = (-zeta * PI / df).exp();
            train.push(1.0, 0.0);
            train.push(2.0 * k, 0.5 * t_d);
            train.push(k * k, t_d);
        }
        ShaperKind::Ei3 => {
            let v_tol = 1.0 / config.vibration_reduction;
            let k = (-zeta * PI / df).exp();
            let k2 = k * k;
            let a1 = 0.0625 * (1.0 + 3.0 * v_tol + 2.0 * (2.0 * (v_tol + 1.0) * v_tol).sqrt());
            let a2 = 0.25 * (1.0 - v_tol) * k;
            let a3 = (0.5 * (1.0 + v_tol) - 2.0 * a1) * k2;
            train.push(a1, 0.0);
            train.push(a2, 0.5 * t_d);
            train.push(a3, t_d);
            train.push(a2 * k2, 1.5 * t_d);
            train.push(a1 * k2 * k2, 2.0 * t_d);
        }
    }

    train
}

/// The shift filter: forward train reversed, renormalized, and centered
/// so its amplitude-weighted centroid is exactly zero, plus the window
/// half-widths it spans around "now".
#[derive(Clone, Copy, Debug)]
pub struct PulseSet {
    pub shift: PulseTrain,
    pub left_delta: f64,
    pub right_delta: f64,
    pub delta_window: f64,
}

impl PulseSet {
    pub fn new(config: &ShaperConfig) -> Self {
        let mut forward = forward_pulses(config);
        let n = forward.n;

        // filter closed forms are derived in seconds; the engine runs
        // in milliseconds
        for t in forward.time[..n].iter_mut() {
            *t *= MS_PER_SEC;
        }

        let sum: f64 = forward.amplitude[..n].iter().sum();
        let inv = 1.0 / sum;

        // Reverse and negate: "future impulses affecting now" becomes
        // "past instants contributing to the current output".
        let mut shift = PulseTrain::default();
        shift.n = n;
        for i in 0..n {
            shift.amplitude[n - 1 - i] = forward.amplitude[i] * inv;
            shift.time[n - 1 - i] = -forward.time[i];
        }

        // Centroid correction removes the filter's constant time lag.
        let ts: f64 = (0..n).map(|i| shift.amplitude[i] * shift.time[i]).sum();
        for t in shift.time[..n].iter_mut() {
            *t -= ts;
        }

        let left_delta = shift.time[0].abs();
        let right_delta = shift.time[n - 1].abs();
        let set = Self {
            shift,
            left_delta,
            right_delta,
            delta_window: left_delta + right_delta,
        };

        tracing::debug!(
            kind = ?config.kind,
            n,
            left_delta = set.left_delta,
            right_delta = set.right_delta,
            "derived shift filter"
        );
        for (i, (amplitude, offset)) in set.shift.iter().enumerate() {
            tracing::trace!(i, amplitude, offset, "shift pulse");
        }

        set
    }
}

/// Input-shaping engine for one axis.
pub struct AxisInputShaper {
    axis: Axis,
    config: ShaperConfig,
    pulses: PulseSet,
    window: ShaperWindow,
    is_window_init: bool,
}

impl AxisInputShaper {
    pub fn new(axis: Axis, config: ShaperConfig) -> Self {
        Self {
            axis,
            config,
            pulses: PulseSet::new(&config),
            window: ShaperWindow::new(config.coeff_epsilon),
            is_window_init: false,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn config(&self) -> &ShaperConfig {
        &self.config
    }

    pub fn pulse_set(&self) -> &PulseSet {
        &self.pulses
    }

    pub fn window(&self) -> &ShaperWindow {
        &self.window
    }

    /// Physical time span the kernel covers around the window instant.
    pub fn delta_window(&self) -> f64 {
        self.pulses.delta_window
    }

    /// Apply a new configuration. Invalidates the live window.
    pub fn set_config(&mut self, config: ShaperConfig) {
        self.config = config;
        self.init();
    }

    /// Rebuild the pulse set from the current configuration and tear
    /// down the window.
    pub fn init(&mut self) {
        self.pulses = PulseSet::new(&self.config);
        self.window = ShaperWindow::new(self.config.coeff_epsilon);
        self.is_window_init = false;
    }

    /// Tear down the live window; safe to call on any empty-to-nonempty
    /// queue transition. The next generation call rebuilds it.
    pub fn reset(&mut self) {
        self.is_window_init = false;
    }

    /// Shaped position at absolute time `t`: the kernel convolved
    /// against the true move-queue position function, evaluated
    /// directly. Zero when the queue is empty or `move_index` is dead.
    pub fn calc_position(
        &self,
        queue: &MoveQueue,
        move_index: usize,
        t: f64,
        range_start: usize,
        range_end: usize,
    ) -> f64 {
        if queue.is_empty() || !queue.is_between(move_index) {
            return 0.0;
        }

        let mut res = 0.0;
        for (amplitude, offset) in self.pulses.shift.iter() {
            res += amplitude
                * queue.axis_position_across_moves(
                    move_index,
                    self.axis,
                    t + offset,
                    range_start,
                    range_end,
                );
        }
        res
    }

    /// Place the window at its initial instant for the move range,
    /// locating the move under each pulse by walking backward through
    /// predecessors.
    pub fn move_window_by_index(
        &mut self,
        queue: &MoveQueue,
        start: usize,
        end: usize,
        left_time: f64,
    ) {
        let n = self.pulses.shift.n;
        self.window.n = n;
        self.window.pivot = n - 1;

        let mut index = start;
        let Some(mut mv) = queue.get(index).copied() else {
            return;
        };
        self.window.time = mv.end_t - self.pulses.right_delta;

        let ai = self.axis.index();
        for i in (0..n).rev() {
            let amplitude = self.pulses.shift.amplitude[i];
            let offset = self.pulses.shift.time[i];
            let pulse_time = self.window.time + offset;

            while pulse_time <= mv.start_t && index != queue.tail_index() {
                index = queue.prev_index(index);
                match queue.get(index) {
                    Some(m) => mv = *m,
                    None => break,
                }
            }

            let p = &mut self.window.pulses[i];
            p.amplitude = amplitude;
            p.time_offset = offset;
            p.time = pulse_time;
            p.move_index = index;
            self.window.update_param_abc(
                i,
                mv.start_v,
                mv.accelerate,
                mv.start_t,
                left_time,
                mv.start_pos[ai],
                mv.axis_r[ai],
            );
        }

        self.window.update_abc();
        let pos = self.calc_position(queue, index, self.window.time, index, end);
        self.window.pos = pos;
    }

    /// Advance the window to the next move-boundary crossing.
    ///
    /// Returns `false` once the pulse with the largest offset has
    /// reached the range's final move boundary. Exactly one pulse gets a
    /// fresh quadratic per step; the rest are re-centered. The new
    /// pivot's time is snapped to its move's end so float error cannot
    /// drift across advances.
    pub fn move_window_to_next(
        &mut self,
        queue: &MoveQueue,
        _start: usize,
        end: usize,
        left_time: f64,
    ) -> bool {
        let n = self.window.n;
        let Some(final_move) = queue.get(end) else {
            return false;
        };
        if (self.window.pulses[n - 1].time - final_move.end_t).abs() < TIME_EPSILON {
            return false;
        }

        // The old pivot sits exactly on its move's end; hand it the
        // successor move and derive its quadratic fresh.
        let old_pivot = self.window.pivot;
        let next_index = queue.next_index(self.window.pulses[old_pivot].move_index);
        let Some(mv) = queue.get(next_index).copied() else {
            return false;
        };
        self.window.pulses[old_pivot].move_index = next_index;
        let ai = self.axis.index();
        self.window.update_param_abc(
            old_pivot,
            mv.start_v,
            mv.accelerate,
            mv.start_t,
            left_time,
            mv.start_pos[ai],
            mv.axis_r[ai],
        );

        // Nearest remaining boundary across all pulses becomes the next
        // pivot and bounds the advance step.
        let mut min_next_time = f64::INFINITY;
        let mut pivot = self.window.pivot;
        let mut pivot_end = 0.0;
        for i in 0..n {
            let p = &self.window.pulses[i];
            let Some(m) = queue.get(p.move_index) else {
                continue;
            };
            let dt = m.end_t - p.time;
            if dt < min_next_time {
                min_next_time = dt;
                pivot = i;
                pivot_end = m.end_t;
            }
        }
        if !min_next_time.is_finite() {
            return false;
        }

        self.window.pivot = pivot;
        for i in 0..n {
            if i != pivot {
                self.window.pulses[i].time += min_next_time;
            }
        }
        self.window.pulses[pivot].time = pivot_end;

        self.window.update_param_left_time(left_time);
        self.window.update_abc();

        self.window.time += min_next_time;
        let anchor_index = self.window.pulses[0].move_index;
        let pos = self.calc_position(queue, anchor_index, self.window.time, anchor_index, end);
        self.window.pos = pos;

        true
    }

    /// Emit the segment stream covering the move range `[start, end]`.
    ///
    /// Initializes the window on first use, then emits one segment per
    /// boundary crossing until the window has caught up with the range.
    pub fn generate_func_params<S: SegmentSink>(
        &mut self,
        queue: &MoveQueue,
        sink: &mut S,
        start: usize,
        end: usize,
    ) {
        if queue.is_empty() || !queue.is_between(start) || !queue.is_between(end) || end < start {
            return;
        }

        if !self.is_window_init {
            self.move_window_by_index(queue, start, end, sink.last_time());
            self.emit(sink);
            self.is_window_init = true;
        }

        while self.move_window_to_next(queue, start, end, sink.last_time()) {
            self.emit(sink);
        }

        sink.update_high_water();
    }

    fn emit<S: SegmentSink>(&self, sink: &mut S) {
        let start = sink.last_time();
        sink.push_segment(Segment {
            a: self.window.func.a,
            b: self.window.func.b,
            c: self.window.func.c,
            start,
            end: self.window.time,
            pos: self.window.pos,
        });
    }
}
