//! Physical constants and unit conversions (English units unless noted).

/// Standard gravity, ft/s^2.
pub const G0_FPS2: f64 = 32.174;
/// Mean earth radius at sea level, ft.
pub const EARTH_RADIUS_FT: f64 = 20_925_646.325_46;
/// Specific gas constant of air, ft*lbf/(slug*R).
pub const R_AIR_ENGLISH: f64 = 1716.49;
/// Specific gas constant of air, J/(kg*K).
pub const R_AIR_SI: f64 = 287.3;
pub const GAMMA_AIR: f64 = 1.4;

pub const PSF_TO_PA: f64 = 47.88;
pub const PSF_TO_INHG: f64 = 0.014_138;
pub const INHG_TO_PA: f64 = 3386.38;
pub const IN3_TO_M3: f64 = 1.638_706e-5;
pub const HP_TO_FTLBS_PER_SEC: f64 = 550.0;
pub const FPS_TO_KTS: f64 = 0.592_484;
pub const KTS_TO_MPS: f64 = 0.514_444_4;
pub const SLUG_FT3_TO_KG_M3: f64 = 515.379;

pub fn rankine_to_kelvin(r: f64) -> f64 {
    r * 5.0 / 9.0
}

pub fn kelvin_to_fahrenheit(k: f64) -> f64 {
    k * 1.8 - 459.67
}

/// Linear interpolation in a breakpoint table, clamped at both ends.
pub fn interpolate(table: &[(f64, f64)], x: f64) -> f64 {
    let Some(&(x0, y0)) = table.first() else {
        return 0.0;
    };
    if x <= x0 {
        return y0;
    }
    for pair in table.windows(2) {
        let (xa, ya) = pair[0];
        let (xb, yb) = pair[1];
        if x <= xb {
            let span = xb - xa;
            if span <= 0.0 {
                return yb;
            }
            return ya + (yb - ya) * (x - xa) / span;
        }
    }
    table[table.len() - 1].1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation_clamps_and_blends() {
        let t = [(0.0, 0.0), (1.0, 10.0), (2.0, 0.0)];
        assert_eq!(interpolate(&t, -5.0), 0.0);
        assert_eq!(interpolate(&t, 0.5), 5.0);
        assert_eq!(interpolate(&t, 1.5), 5.0);
        assert_eq!(interpolate(&t, 9.0), 0.0);
        assert_eq!(interpolate(&[], 1.0), 0.0);
    }

    #[test]
    fn temperature_conversions() {
        assert!((rankine_to_kelvin(518.67) - 288.15).abs() < 1e-9);
        assert!((kelvin_to_fahrenheit(288.15) - 59.0).abs() < 1e-6);
    }
}
