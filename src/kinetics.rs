//! Closed-form rate and limitation terms shared by the biogeochemical models.

use std::f64::consts::PI;

/// Saturating Michaelis-Menten response `conc / (conc + half_sat)`.
pub fn saturating(conc: f64, half_sat: f64) -> f64 {
    conc / (conc + half_sat)
}

/// Clip a limitation factor to `[0, 1]`.
pub fn fraction(val: f64) -> f64 {
    val.clamp(0.0, 1.0)
}

/// Position of `quota` between `min` and `max`, clipped to `[0, 1]`.
pub fn quota_fill(quota: f64, min: f64, max: f64) -> f64 {
    fraction((quota - min) / (max - min))
}

/// Remaining room below `max` for a quota, clipped to `[0, 1]`.
pub fn quota_headroom(quota: f64, min: f64, max: f64) -> f64 {
    fraction((max - quota) / (max - min))
}

/// Bell-shaped temperature response peaking at `t_opt`.
pub fn bell_temperature(temp: f64, t_opt: f64, width: f64, exponent: i32) -> f64 {
    1.0 / (1.0 + ((temp - t_opt) / width).powi(2 * exponent))
}

/// Logistic day-length response, close to 1 well below `f_o`.
pub fn day_length_factor(day_length: f64, a: f64, b: f64, f_o: f64) -> f64 {
    1.0 - 1.0 / (1.0 + b * (a * (f_o - day_length)).exp())
}

/// Logistic day-length response rising above `f_o`; the mirror of
/// [`day_length_factor`].
pub fn long_day_factor(day_length: f64, a: f64, b: f64, f_o: f64) -> f64 {
    1.0 - 1.0 / (1.0 + b * (a * (day_length - f_o)).exp())
}

/// Temperature response `1 / (1 + (temp - t_o / c)^2)^exponent`, peaking at
/// `t_o / c`.
pub fn scaled_peak_temperature(temp: f64, t_o: f64, c: f64, exponent: i32) -> f64 {
    1.0 / (1.0 + (temp - t_o / c).powi(2)).powi(exponent)
}

/// Biomass saturation `1 - exp(-(biomass - max) / sl)`, clipped to `[0, 1]`.
pub fn biomass_saturation(biomass: f64, max: f64, sl: f64) -> f64 {
    fraction(1.0 - (-(biomass - max) / sl).exp())
}

/// Temperature dependent seagrass loss rate.
pub fn seagrass_loss_rate(sr: f64, temp: f64) -> f64 {
    sr * (0.098 + (-6.59 + 0.2217 * temp).exp())
}

/// Temperature dependent macroalgal loss rate.
pub fn macroalgal_loss_rate(omega_m: f64, tox: f64, k_tox: f64, temp: f64) -> f64 {
    omega_m + tox * (k_tox * (temp - 26.0)).exp()
}

/// Arrhenius-style temperature correction `theta^(temp - 20)`.
pub fn arrhenius(theta: f64, temp: f64) -> f64 {
    theta.powf(temp - 20.0)
}

/// Sediment release flux as a function of the sediment redox potential.
///
/// Reduced sediment (`orp_s <= 0`) follows `-(p / π) atan(orp_s / 4) + p / 2`,
/// rising towards `p`. Oxidised sediment decays exponentially from `p / 2`
/// on the same 4 mV redox scale, so both branches meet at `orp_s = 0`.
pub fn sediment_flux(orp_s: f64, p: f64) -> f64 {
    if orp_s <= 0.0 {
        -(p / PI) * (orp_s / 4.0).atan() + p / 2.0
    } else {
        (p / 2.0) * (-orp_s / 4.0).exp()
    }
}

/// Saturation constant of the ammonium sediment flux.
pub const P_NH4: f64 = 180.0;
/// Saturation constant of the nitrate sediment flux.
pub const P_NO3: f64 = 31.3;
/// Saturation constant of the phosphate sediment flux.
pub const P_SRP: f64 = 13.7;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sediment_flux_is_continuous_at_zero() {
        for p in [P_NH4, P_NO3, P_SRP] {
            let left = sediment_flux(-1e-9, p);
            let at = sediment_flux(0.0, p);
            let right = sediment_flux(1e-9, p);
            assert_abs_diff_eq!(at, p / 2.0, epsilon = 1e-12);
            assert_abs_diff_eq!(left, at, epsilon = 1e-6);
            assert_abs_diff_eq!(right, at, epsilon = 1e-6);
        }
    }

    #[test]
    fn sediment_flux_is_bounded_and_non_increasing() {
        for p in [P_NH4, P_NO3, P_SRP] {
            let mut prev = f64::INFINITY;
            for step in -2000..=2000 {
                let orp_s = step as f64 * 0.25;
                let flux = sediment_flux(orp_s, p);
                assert!(flux > 0.0 && flux < p, "flux {flux} out of (0, {p}) at {orp_s}");
                assert!(flux <= prev, "flux increased at {orp_s}");
                prev = flux;
            }
        }
    }

    #[test]
    fn quota_factors_are_fractions() {
        assert_eq!(quota_fill(2.4, 10.0, 15.0), 0.0);
        assert_eq!(quota_fill(20.0, 10.0, 15.0), 1.0);
        assert_abs_diff_eq!(quota_fill(12.5, 10.0, 15.0), 0.5);
        assert_eq!(quota_headroom(0.02, 0.7, 1.2), 1.0);
        assert_eq!(quota_headroom(1.5, 0.7, 1.2), 0.0);
    }

    #[test]
    fn bell_temperature_peaks_at_optimum() {
        assert_abs_diff_eq!(bell_temperature(26.0, 26.0, 1.0, 3), 1.0);
        assert!(bell_temperature(20.0, 26.0, 1.0, 3) < 1e-4);
        assert_abs_diff_eq!(bell_temperature(27.0, 26.0, 1.0, 3), 0.5);
    }

    #[test]
    fn day_length_responses_mirror_each_other() {
        assert_abs_diff_eq!(long_day_factor(14.0, 20.0, 2.0, 14.0), 2.0 / 3.0);
        assert!(long_day_factor(2.0, 20.0, 2.0, 14.0) < 1e-100);
        assert!(day_length_factor(2.0, 20.0, 2.0, 14.0) > 1.0 - 1e-12);
    }

    #[test]
    fn scaled_peak_temperature_peaks_at_scaled_optimum() {
        assert_abs_diff_eq!(scaled_peak_temperature(5.2, 26.0, 5.0, 2), 1.0);
        assert_abs_diff_eq!(scaled_peak_temperature(6.2, 26.0, 5.0, 2), 0.25);
        let expected = 1.0 / (1.0 + 11.3_f64.powi(2)).powi(2);
        assert_abs_diff_eq!(scaled_peak_temperature(16.5, 26.0, 5.0, 2), expected);
    }

    #[test]
    fn seagrass_loss_rate_at_twelve_degrees() {
        let expected = 0.041 * (0.098 + (-6.59_f64 + 0.2217 * 12.0).exp());
        assert_abs_diff_eq!(seagrass_loss_rate(0.041, 12.0), expected);
    }
}
