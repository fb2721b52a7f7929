//! Sliding-window quadratic tracker.
//!
//! Each shift-filter pulse contributes a quadratic position law derived
//! from the move currently under it. All contributions are expressed in
//! a shared local time basis anchored at `left_time`, so their sum is a
//! single quadratic valid over the current micro-interval.

/// Largest pulse count over the supported shaper kinds.
pub const MAX_PULSES: usize = 5;

/// `a·Δ² + b·Δ + c` in a local time basis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Quadratic {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Quadratic {
    pub fn eval(&self, dt: f64) -> f64 {
        (self.a * dt + self.b) * dt + self.c
    }
}

/// Live state of one shift-filter pulse.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowPulse {
    /// Pulse weight, copied from the shift filter.
    pub amplitude: f64,
    /// Pulse offset relative to the window instant, copied from the
    /// shift filter.
    pub time_offset: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    /// Absolute evaluation time of this pulse.
    pub time: f64,
    /// Queue index of the move currently under this pulse.
    pub move_index: usize,
    /// Local time origin the coefficients are expressed against.
    pub left_time: f64,
}

/// Sliding-window state for one axis shaper.
#[derive(Debug)]
pub struct ShaperWindow {
    pub pulses: [WindowPulse; MAX_PULSES],
    pub n: usize,
    /// Pulse nearest its move's end boundary; advanced first.
    pub pivot: usize,
    /// Absolute time of the window instant.
    pub time: f64,
    /// Shaped position at `time`, from the direct convolution.
    pub pos: f64,
    /// Combined quadratic, sum of the live pulse contributions.
    pub func: Quadratic,
    coeff_epsilon: f64,
}

impl ShaperWindow {
    pub fn new(coeff_epsilon: f64) -> Self {
        Self {
            pulses: [WindowPulse::default(); MAX_PULSES],
            n: 0,
            pivot: 0,
            time: 0.0,
            pos: 0.0,
            func: Quadratic::default(),
            coeff_epsilon,
        }
    }

    /// Derive pulse `i`'s quadratic from the move under it.
    ///
    /// Substitutes the move's own position law, folding in the pulse's
    /// offset and weight, so that the contribution at absolute time
    /// `left_time + Δ` is `a·Δ² + b·Δ + c`.
    #[allow(clippy::too_many_arguments)]
    pub fn update_param_abc(
        &mut self,
        i: usize,
        start_v: f64,
        accelerate: f64,
        move_start_t: f64,
        left_time: f64,
        start_pos: f64,
        axis_r: f64,
    ) {
        let p = &mut self.pulses[i];
        let amplitude = p.amplitude;
        let t = p.time_offset - (move_start_t - left_time);
        p.a = 0.5 * accelerate * amplitude * axis_r;
        p.b = (start_v + accelerate * t) * amplitude * axis_r;
        p.c = (start_pos + (start_v * t + 0.5 * accelerate * t * t) * axis_r) * amplitude;
        p.left_time = left_time;
    }

    /// Re-express stale pulses under a new local time origin.
    ///
    /// Standard change of variable for a shifted quadratic; pulses whose
    /// origin already matches are left untouched.
    pub fn update_param_left_time(&mut self, left_time: f64) {
        for p in self.pulses[..self.n].iter_mut() {
            if p.left_time == left_time {
                continue;
            }
            let delta = left_time - p.left_time;
            p.left_time = left_time;
            p.c += p.a * delta * delta + p.b * delta;
            p.b += 2.0 * p.a * delta;
        }
    }

    /// Sum the pulse contributions into the combined quadratic.
    ///
    /// Coefficients below the epsilon threshold are snapped to zero so
    /// float noise cannot accumulate across window advances.
    pub fn update_abc(&mut self) {
        let mut a = 0.0;
        let mut b = 0.0;
        let mut c = 0.0;
        for p in self.pulses[..self.n].iter() {
            a += p.a;
            b += p.b;
            c += p.c;
        }
        if a.abs() < self.coeff_epsilon {
            a = 0.0;
        }
        if b.abs() < self.coeff_epsilon {
            b = 0.0;
        }
        if c.abs() < self.coeff_epsilon {
            c = 0.0;
        }
        self.func = Quadratic { a, b, c };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with_pulse(a: f64, b: f64, c: f64) -> ShaperWindow {
        let mut w = ShaperWindow::new(1e-8);
        w.n = 1;
        w.pulses[0] = WindowPulse {
            amplitude: 1.0,
            a,
            b,
            c,
            ..WindowPulse::default()
        };
        w
    }

    #[test]
    fn abc_matches_move_position_law() {
        let mut w = window_with_pulse(0.0, 0.0, 0.0);
        let (start_v, accel, move_start_t, left_time) = (0.3, 0.004, 120.0, 70.0);
        let (start_pos, axis_r) = (5.0, 1.0);
        w.update_param_abc(0, start_v, accel, move_start_t, left_time, start_pos, axis_r);

        for t in [120.0, 150.0, 200.0] {
            let mt = t - move_start_t;
            let expected = start_pos + (start_v * mt + 0.5 * accel * mt * mt) * axis_r;
            let p = &w.pulses[0];
            let got = Quadratic {
                a: p.a,
                b: p.b,
                c: p.c,
            }
            .eval(t - left_time);
            assert!((got - expected).abs() < 1e-9, "t={t}: {got} vs {expected}");
        }
    }

    #[test]
    fn left_time_shift_round_trips() {
        let mut w = window_with_pulse(1.5, -2.0, 3.0);
        w.update_param_left_time(5.0);
        assert_ne!(w.pulses[0].b, -2.0);
        w.update_param_left_time(0.0);
        let p = &w.pulses[0];
        assert!((p.a - 1.5).abs() < 1e-12);
        assert!((p.b + 2.0).abs() < 1e-9);
        assert!((p.c - 3.0).abs() < 1e-9);
    }

    #[test]
    fn left_time_update_is_idempotent() {
        let mut w = window_with_pulse(1.5, -2.0, 3.0);
        w.pulses[0].left_time = 4.0;
        w.update_param_left_time(4.0);
        assert_eq!(w.pulses[0].a, 1.5);
        assert_eq!(w.pulses[0].b, -2.0);
        assert_eq!(w.pulses[0].c, 3.0);
    }

    #[test]
    fn combined_is_sum_of_pulses() {
        let mut w = ShaperWindow::new(1e-8);
        w.n = 2;
        w.pulses[0].a = 1.0;
        w.pulses[0].b = 2.0;
        w.pulses[0].c = 3.0;
        w.pulses[1].a = 0.5;
        w.pulses[1].b = -1.0;
        w.pulses[1].c = 4.0;
        w.update_abc();
        assert_eq!(w.func, Quadratic {
            a: 1.5,
            b: 1.0,
            c: 7.0
        });
    }

    #[test]
    fn near_zero_coefficients_snap_to_zero() {
        let mut w = ShaperWindow::new(1e-8);
        w.n = 2;
        w.pulses[0].a = 1e-12;
        w.pulses[0].b = 1.0;
        w.pulses[1].b = -1.0;
        w.pulses[1].c = -1e-10;
        w.update_abc();
        assert_eq!(w.func.a, 0.0);
        assert_eq!(w.func.b, 0.0);
        assert_eq!(w.func.c, 0.0);
    }
}
