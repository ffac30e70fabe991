//! Four-pool phosphorus cycle: particulate organic phosphorus, soluble
//! reactive phosphorus, and the internal phosphorus of macroalgae and
//! seagrass.

use crate::growth::GrowthState;
use crate::kinetics::{
    P_SRP, biomass_saturation, fraction, long_day_factor, macroalgal_loss_rate, quota_fill,
    quota_headroom, saturating, scaled_peak_temperature, seagrass_loss_rate, sediment_flux,
};
use crate::nitrogen::HORIZON;
use crate::season::SeasonalBundle;
use crate::solver::{Solver, nearest_sample, unit_times};
use anyhow::{Context, Result};

/// Rate constants of the phosphorus cycle.
#[derive(Debug, Clone)]
pub struct PhosphorusParams {
    // Mineralization.
    pub k_ap: f64,
    pub k_op: f64,
    pub k_po: f64,
    /// Temperature multiplier of the mineralization rate.
    pub f_t: f64,

    // Turnover.
    pub alpha_p_ma: f64,
    pub alpha_p_r: f64,
    pub omega_m: f64,
    pub tox: f64,
    pub k_tox: f64,
    pub sr: f64,
    pub ma_ratio: f64,
    pub depth: f64,

    // Uptake.
    pub vp_ma_max: f64,
    pub vp_r_max: f64,
    pub kp_ma: f64,
    pub kp_r: f64,
    pub qp_ma_min: f64,
    pub qp_ma_max: f64,
    pub qp_r_min: f64,
    pub qp_r_max: f64,
    pub f_v: f64,

    // Macroalgal growth.
    pub mu_max: f64,
    pub k_oo: f64,
    pub ulv_ext: f64,
    pub k_i: f64,
    /// Light intensity.
    pub light: f64,
    pub k_1: f64,
    pub k_4: f64,
    pub t_min: f64,
    pub t_opt_ma: f64,
    pub t_max: f64,
    pub qn_min: f64,
    pub qn_max: f64,
    /// Macroalgal nitrogen quota per unit seagrass reserve.
    pub ma_n_ratio: f64,

    // Seagrass reproduction allocation.
    pub rho_max: f64,
    pub day_a: f64,
    pub day_b: f64,
    pub f_o: f64,
    pub day_length: f64,
    pub t_opt_r: f64,
    pub t_width: f64,
    pub t_exp: i32,
    pub r_max: f64,
    pub sl: f64,
    pub n_min: f64,
    pub n_cri: f64,
}

impl Default for PhosphorusParams {
    fn default() -> Self {
        Self {
            k_ap: 0.043,
            k_op: 4.45,
            k_po: 1.0,
            f_t: 26.0,
            alpha_p_ma: 0.23,
            alpha_p_r: 0.11,
            omega_m: 0.04,
            tox: 0.11,
            k_tox: 3.0,
            sr: 0.08,
            ma_ratio: 0.8,
            depth: 2.0,
            vp_ma_max: 0.2,
            vp_r_max: 0.1,
            kp_ma: 0.0061,
            kp_r: 0.0115,
            qp_ma_min: 1.1,
            qp_ma_max: 3.9,
            qp_r_min: 0.7,
            qp_r_max: 1.2,
            f_v: 0.001,
            mu_max: 0.37,
            k_oo: 0.4,
            ulv_ext: 0.001,
            k_i: 242.0,
            light: 10.0,
            k_1: 0.3,
            k_4: 0.01,
            t_min: 8.0,
            t_opt_ma: 24.0,
            t_max: 26.0,
            qn_min: 10.0,
            qn_max: 40.0,
            ma_n_ratio: 0.8,
            rho_max: 0.23,
            day_a: 20.0,
            day_b: 2.0,
            f_o: 14.0,
            day_length: 2.0,
            t_opt_r: 26.0,
            t_width: 5.0,
            t_exp: 2,
            r_max: 250.0,
            sl: 5.0,
            n_min: 10.0,
            n_cri: 15.0,
        }
    }
}

/// Output of the phosphorus cycle model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhosphorusState {
    pub pop: f64,
    pub srp: f64,
    pub p_ma_int: f64,
    pub p_r_int: f64,
}

/// Phosphorus cycle driven by seagrass biomass and nitrogen reserve.
#[derive(Debug, Clone)]
pub struct PhosphorusCycleModel {
    params: PhosphorusParams,
    temperature: f64,
    dissolved_oxygen: f64,
    orp_s: f64,
    solver: Solver,
}

impl PhosphorusCycleModel {
    pub fn new(params: PhosphorusParams, bundle: &SeasonalBundle, solver: Solver) -> Self {
        Self {
            params,
            temperature: bundle.temperature,
            dissolved_oxygen: bundle.dissolved_oxygen,
            orp_s: bundle.orp_s,
            solver,
        }
    }

    /// Advance the phosphorus pools under the given seagrass state and return
    /// the sample closest to `target` on the fixed `0..HORIZON` grid.
    pub fn advance(
        &self,
        init: PhosphorusState,
        growth: &GrowthState,
        target: usize,
    ) -> Result<PhosphorusState> {
        let t_eval = unit_times(HORIZON);
        let y0 = [init.pop, init.srp, init.p_ma_int, init.p_r_int];
        let sol = self
            .solver
            .solve(|_, y| self.derivatives(growth, y), y0, &t_eval)
            .context("phosphorus cycle model failed to converge")?;

        let [pop, srp, p_ma_int, p_r_int] = sol[nearest_sample(&t_eval, target as f64)];
        Ok(PhosphorusState {
            pop,
            srp,
            p_ma_int,
            p_r_int,
        })
    }

    /// Aerobic/anaerobic mineralization rate of particulate phosphorus.
    fn mineralization_rate(&self) -> f64 {
        let par = &self.params;
        let dox = self.dissolved_oxygen;
        (par.k_ap * par.k_op + par.k_po * dox) / (par.k_op + dox) * par.f_t
    }

    /// Macroalgal specific growth rate.
    fn macroalgal_growth_rate(&self, b: f64, nrint: f64, p_ma_int: f64) -> f64 {
        let par = &self.params;
        let temp = self.temperature;
        let h = par.depth;

        let k_ext = par.k_oo + par.ulv_ext * b / h;
        let f_light = (1.0 / (k_ext * h))
            * ((par.k_i + par.light) / (par.k_i + par.light * (-k_ext * h).exp())).ln();

        let f_temp = self.macroalgal_temperature_factor();
        let f_n = quota_fill(par.ma_n_ratio * nrint, par.qn_min, par.qn_max);
        let f_p = quota_headroom(p_ma_int, par.qp_ma_min, par.qp_ma_max);

        par.mu_max * fraction(f_light) * fraction(f_temp) * f_n * f_p
    }

    /// Product of two logistic limbs, both measured from `t_min`. The second
    /// limb spans the full `t_min..t_max` range.
    fn macroalgal_temperature_factor(&self) -> f64 {
        let par = &self.params;
        let limb = |k: f64, span: f64| {
            let gamma = ((0.98 * (1.0 - k)) / (0.02 * k)).ln() / span;
            let e = (gamma * (self.temperature - par.t_min)).exp();
            k * e / (1.0 + k * (e - 1.0))
        };
        limb(par.k_1, par.t_opt_ma - par.t_min) * limb(par.k_4, par.t_max - par.t_min)
    }

    /// Seagrass reproduction allocation rate.
    fn reproduction_rate(&self, r: f64, nrint: f64, p_r_int: f64) -> f64 {
        let par = &self.params;
        let g_d = long_day_factor(par.day_length, par.day_a, par.day_b, par.f_o);
        let f_temp = scaled_peak_temperature(self.temperature, par.t_opt_r, par.t_width, par.t_exp);
        let f_r = biomass_saturation(r, par.r_max, par.sl);
        let f_n = quota_fill(nrint, par.n_min, par.n_cri);
        let f_p = quota_headroom(p_r_int, par.qp_r_min, par.qp_r_max);
        par.rho_max * g_d * f_temp * f_r * f_n * f_p
    }

    fn derivatives(&self, growth: &GrowthState, y: &[f64; 4]) -> [f64; 4] {
        let par = &self.params;
        let [pop, srp, p_ma_int, p_r_int] = *y;
        let temp = self.temperature;
        let h = par.depth;
        let r = growth.r;
        let b = par.ma_ratio * r;

        let omega_ma = macroalgal_loss_rate(par.omega_m, par.tox, par.k_tox, temp);
        let omega_r = seagrass_loss_rate(par.sr, temp);
        let mineral = self.mineralization_rate() * pop;

        let d_pop = -mineral + par.alpha_p_ma * b * omega_ma + par.alpha_p_r * r * omega_r;

        let uptake_ma_rate = par.vp_ma_max
            * saturating(srp, par.kp_ma)
            * quota_headroom(p_ma_int, par.qp_ma_min, par.qp_ma_max);
        let uptake_r_rate = par.vp_r_max
            * saturating(srp, par.kp_r)
            * quota_headroom(p_r_int, par.qp_r_min, par.qp_r_max);

        let d_srp = mineral + sediment_flux(self.orp_s, P_SRP)
            - b / h * uptake_ma_rate * par.f_v
            - r / h * uptake_r_rate * par.f_v;

        let mu_ma = self.macroalgal_growth_rate(b, growth.nrint, p_ma_int);
        let d_p_ma_int = uptake_ma_rate - mu_ma * p_ma_int;

        let rho = self.reproduction_rate(r, growth.nrint, p_r_int);
        let d_p_r_int = uptake_r_rate - rho * p_r_int;

        [d_pop, d_srp, d_p_ma_int, d_p_r_int]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn model(weeks: usize) -> PhosphorusCycleModel {
        PhosphorusCycleModel::new(
            PhosphorusParams::default(),
            &SeasonalBundle::lookup(weeks),
            Solver::default(),
        )
    }

    fn init() -> PhosphorusState {
        PhosphorusState {
            pop: 0.23,
            srp: 0.12,
            p_ma_int: 0.02,
            p_r_int: 0.02,
        }
    }

    const GROWTH: GrowthState = GrowthState { r: 110.0, nrint: 2.4 };

    #[test]
    fn zero_target_returns_initial_condition() {
        let out = model(0).advance(init(), &GROWTH, 0).unwrap();
        assert_eq!(out, init());
    }

    #[test]
    fn identical_calls_are_bit_identical() {
        let mdl = model(0);
        let a = mdl.advance(init(), &GROWTH, 4).unwrap();
        let b = mdl.advance(init(), &GROWTH, 4).unwrap();
        assert_eq!(a.pop.to_bits(), b.pop.to_bits());
        assert_eq!(a.srp.to_bits(), b.srp.to_bits());
        assert_eq!(a.p_ma_int.to_bits(), b.p_ma_int.to_bits());
        assert_eq!(a.p_r_int.to_bits(), b.p_r_int.to_bits());
    }

    #[test]
    fn internal_quotas_stay_below_maximum() {
        let mdl = model(0);
        let par = PhosphorusParams::default();
        let out = mdl.advance(init(), &GROWTH, HORIZON - 1).unwrap();
        assert!(out.p_ma_int > init().p_ma_int);
        assert!(out.p_r_int > init().p_r_int);
        assert!(out.p_ma_int <= par.qp_ma_max + 1e-6);
        assert!(out.p_r_int <= par.qp_r_max + 1e-6);
    }

    #[test]
    fn particulate_pool_reaches_turnover_balance() {
        // POP relaxes quickly to turnover / mineralization rate.
        let mdl = model(0);
        let par = PhosphorusParams::default();
        let temp = 16.5;
        let b = par.ma_ratio * GROWTH.r;
        let input = par.alpha_p_ma * b * macroalgal_loss_rate(par.omega_m, par.tox, par.k_tox, temp)
            + par.alpha_p_r * GROWTH.r * seagrass_loss_rate(par.sr, temp);
        let out = mdl.advance(init(), &GROWTH, 10).unwrap();
        assert_abs_diff_eq!(out.pop, input / mdl.mineralization_rate(), epsilon = 1e-5);
    }

    #[test]
    fn macroalgal_growth_needs_nitrogen_quota() {
        let mdl = model(0);
        assert_eq!(mdl.macroalgal_growth_rate(88.0, 2.4, 2.0), 0.0);
        assert!(mdl.macroalgal_growth_rate(88.0, 30.0, 2.0) > 0.0);
    }

    #[test]
    fn macroalgal_growth_slows_as_phosphorus_quota_fills() {
        let mdl = model(0);
        let par = PhosphorusParams::default();
        let low = mdl.macroalgal_growth_rate(88.0, 30.0, 1.5);
        let high = mdl.macroalgal_growth_rate(88.0, 30.0, 3.0);
        assert!(low > high && high > 0.0);
        assert_abs_diff_eq!(low / high, (3.9 - 1.5) / (3.9 - 3.0), epsilon = 1e-12);
        assert_eq!(mdl.macroalgal_growth_rate(88.0, 30.0, par.qp_ma_max), 0.0);
    }

    #[test]
    fn macroalgal_temperature_factor_at_spring_temperature() {
        // Both limbs are measured from t_min = 8 at 16.5 degrees.
        let k_1: f64 = 0.3;
        let k_4: f64 = 0.01;
        let g_1 = ((0.98 * (1.0 - k_1)) / (0.02 * k_1)).ln() / 16.0;
        let g_2 = ((0.98 * (1.0 - k_4)) / (0.02 * k_4)).ln() / 18.0;
        let e_1 = (g_1 * 8.5).exp();
        let e_2 = (g_2 * 8.5).exp();
        let expected =
            (k_1 * e_1 / (1.0 + k_1 * (e_1 - 1.0))) * (k_4 * e_2 / (1.0 + k_4 * (e_2 - 1.0)));
        assert_abs_diff_eq!(model(0).macroalgal_temperature_factor(), expected, epsilon = 1e-12);
        assert!(expected > 0.2 && expected < 0.5);
    }

    #[test]
    fn reproduction_is_negligible_on_short_days() {
        // Two-hour days sit far below the 14-hour threshold.
        let rate = model(26).reproduction_rate(300.0, 14.0, 0.8);
        assert!(rate >= 0.0 && rate < 1e-100);
    }
}
