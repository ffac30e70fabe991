//! Adaptive ODE integration.
//!
//! Explicit Dormand-Prince 5(4) pair with embedded error control. The
//! integrator advances from the first requested sample time to the last,
//! landing exactly on every sample time in between, and returns the state at
//! each of them. Tolerances are fixed per [`Solver`]; there is no stiffness
//! detection.

use anyhow::{Result, bail};

// Butcher tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// Difference between the 5th and 4th order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

/// Fixed-tolerance adaptive integrator.
#[derive(Debug, Clone)]
pub struct Solver {
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Maximum number of attempted steps per solve.
    pub max_steps: usize,
    /// Smallest step accepted before giving up.
    pub min_step: f64,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_steps: 200_000,
            min_step: 1e-10,
        }
    }
}

impl Solver {
    /// Integrate `dy/dt = rhs(t, y)` from `t_eval[0]` with `y(t_eval[0]) = y0`
    /// and return the state at every time in `t_eval`.
    ///
    /// `t_eval` must be non-decreasing. Fails if the step size collapses, the
    /// step budget runs out, or the state stops being finite.
    pub fn solve<const N: usize, F>(
        &self,
        rhs: F,
        y0: [f64; N],
        t_eval: &[f64],
    ) -> Result<Vec<[f64; N]>>
    where
        F: Fn(f64, &[f64; N]) -> [f64; N],
    {
        let Some(&t_first) = t_eval.first() else {
            bail!("no sample times requested");
        };
        if t_eval.windows(2).any(|pair| pair[1] < pair[0]) {
            bail!("sample times must be non-decreasing");
        }
        if y0.iter().any(|val| !val.is_finite()) {
            bail!("initial condition {y0:?} is not finite");
        }

        let mut sol = Vec::with_capacity(t_eval.len());
        sol.push(y0);

        let mut t = t_first;
        let mut y = y0;
        let mut h = 0.1;
        let mut n_steps = 0;

        for &t_next in &t_eval[1..] {
            while t < t_next {
                n_steps += 1;
                if n_steps > self.max_steps {
                    bail!("exceeded {} steps before reaching t = {t_next}", self.max_steps);
                }

                // Never step past the next sample time.
                let last = t + h >= t_next;
                let h_try = if last { t_next - t } else { h };

                let (y_new, err) = self.attempt(&rhs, t, &y, h_try);

                if !err.is_finite() {
                    bail!("state became non-finite at t = {t} (step {h_try:e})");
                }

                let fac = if err == 0.0 {
                    10.0
                } else {
                    (0.9 * err.powf(-0.2)).clamp(0.2, 10.0)
                };

                if err <= 1.0 {
                    t = if last { t_next } else { t + h_try };
                    y = y_new;
                    // Keep the unclipped step when the last one was shortened.
                    h = if last { h.max(h_try * fac) } else { h_try * fac };
                } else {
                    h = h_try * fac.min(1.0);
                    if h < self.min_step {
                        bail!("step size fell below {:e} at t = {t}", self.min_step);
                    }
                }
            }
            sol.push(y);
        }

        Ok(sol)
    }

    fn attempt<const N: usize, F>(&self, rhs: &F, t: f64, y: &[f64; N], h: f64) -> ([f64; N], f64)
    where
        F: Fn(f64, &[f64; N]) -> [f64; N],
    {
        let stage = |ks: &[(&[f64; N], f64)]| {
            let mut out = *y;
            for (i, val) in out.iter_mut().enumerate() {
                *val += h * ks.iter().map(|(k, a)| a * k[i]).sum::<f64>();
            }
            out
        };

        let k1 = rhs(t, y);
        let k2 = rhs(t + C2 * h, &stage(&[(&k1, A21)]));
        let k3 = rhs(t + C3 * h, &stage(&[(&k1, A31), (&k2, A32)]));
        let k4 = rhs(t + C4 * h, &stage(&[(&k1, A41), (&k2, A42), (&k3, A43)]));
        let k5 = rhs(
            t + C5 * h,
            &stage(&[(&k1, A51), (&k2, A52), (&k3, A53), (&k4, A54)]),
        );
        let k6 = rhs(
            t + h,
            &stage(&[(&k1, A61), (&k2, A62), (&k3, A63), (&k4, A64), (&k5, A65)]),
        );
        let y_new = stage(&[(&k1, A71), (&k3, A73), (&k4, A74), (&k5, A75), (&k6, A76)]);
        let k7 = rhs(t + h, &y_new);

        let mut sum = 0.0;
        for i in 0..N {
            let err_i = h
                * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
            let scale = self.atol + self.rtol * y[i].abs().max(y_new[i].abs());
            sum += (err_i / scale).powi(2);
        }
        let err = if N == 0 { 0.0 } else { (sum / N as f64).sqrt() };

        (y_new, err)
    }
}

/// Unit-spaced sample times `0, 1, ..., n - 1`.
pub fn unit_times(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64).collect()
}

/// Index of the sample time closest to `target`; the earliest one wins ties.
pub fn nearest_sample(t_eval: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_diff = f64::INFINITY;
    for (idx, &t) in t_eval.iter().enumerate() {
        let diff = (t - target).abs();
        if diff < best_diff {
            best = idx;
            best_diff = diff;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn exponential_decay() {
        let solver = Solver::default();
        let t_eval = unit_times(6);
        let sol = solver
            .solve(|_, y: &[f64; 1]| [-0.5 * y[0]], [2.0], &t_eval)
            .unwrap();
        assert_eq!(sol.len(), 6);
        for (t, y) in t_eval.iter().zip(&sol) {
            assert_abs_diff_eq!(y[0], 2.0 * (-0.5 * t).exp(), epsilon = 1e-6);
        }
    }

    #[test]
    fn harmonic_oscillator() {
        let solver = Solver::default();
        let t_eval = unit_times(11);
        let sol = solver
            .solve(|_, y: &[f64; 2]| [y[1], -y[0]], [1.0, 0.0], &t_eval)
            .unwrap();
        let last = sol[10];
        assert_abs_diff_eq!(last[0], 10.0_f64.cos(), epsilon = 1e-5);
        assert_abs_diff_eq!(last[1], -10.0_f64.sin(), epsilon = 1e-5);
    }

    #[test]
    fn single_sample_returns_initial_condition() {
        let solver = Solver::default();
        let sol = solver
            .solve(|_, y: &[f64; 2]| [y[0], y[1]], [3.0, 4.0], &[0.0])
            .unwrap();
        assert_eq!(sol, vec![[3.0, 4.0]]);
    }

    #[test]
    fn blow_up_is_an_error() {
        let solver = Solver::default();
        let res = solver.solve(|_, y: &[f64; 1]| [y[0] * y[0]], [1.0], &unit_times(3));
        assert!(res.is_err());
    }

    #[test]
    fn nearest_sample_prefers_earliest_on_ties() {
        let t_eval = unit_times(5);
        assert_eq!(nearest_sample(&t_eval, 2.0), 2);
        assert_eq!(nearest_sample(&t_eval, 2.5), 2);
        assert_eq!(nearest_sample(&t_eval, 2.6), 3);
        assert_eq!(nearest_sample(&t_eval, 50.0), 4);
        assert_eq!(nearest_sample(&t_eval, -3.0), 0);
    }
}
