use rand::Rng;
use std::f64::consts::PI;

/// Smallest value accepted for a uniform draw fed into `ln`.
const MIN_UNIFORM: f64 = f64::MIN_POSITIVE;

/// Gaussian variate via the Box-Muller transform.
///
/// `u1` is redrawn while it is exactly zero so `ln(u1)` stays finite.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let mut u1: f64 = rng.gen();
    while u1 < MIN_UNIFORM {
        u1 = rng.gen();
    }
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).sin();
    mean + std_dev * z
}

/// Weibull variate by inverse transform: `scale * (-ln(1 - u))^(1 / shape)`.
///
/// `u` is redrawn while `1 - u` would be zero.
pub fn weibull<R: Rng + ?Sized>(rng: &mut R, scale: f64, shape: f64) -> f64 {
    let mut u: f64 = rng.gen();
    while 1.0 - u < MIN_UNIFORM {
        u = rng.gen();
    }
    scale * (-(1.0 - u).ln()).powf(1.0 / shape)
}

/// Uniform float in `lo..=hi`. A degenerate range returns `lo`.
pub fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

/// Uniform integer in `lo..=hi`. A degenerate range returns `lo`.
pub fn uniform_int<R: Rng + ?Sized>(rng: &mut R, lo: u32, hi: u32) -> u32 {
    if hi <= lo {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

/// Bernoulli trial with probability `p`.
pub fn chance<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.gen::<f64>() < p
}
