use super::params::DihedralTerm;
use crate::core::units::COULOMB_CONSTANT;
use std::f64::consts::PI;

/// `k (x - x0)²` and its derivative with respect to `x`.
#[inline]
pub fn harmonic(x: f64, x0: f64, k: f64) -> (f64, f64) {
    let delta = x - x0;
    (k * delta * delta, 2.0 * k * delta)
}

/// Harmonic on an angular coordinate; the deviation is wrapped into `(-π, π]` first.
#[inline]
pub fn harmonic_periodic(x: f64, x0: f64, k: f64) -> (f64, f64) {
    let delta = wrap_angle(x - x0);
    (k * delta * delta, 2.0 * k * delta)
}

/// `Σ k (1 + cos(n φ - δ))` and its derivative with respect to `φ`.
#[inline]
pub fn periodic_torsion(phi: f64, terms: &[DihedralTerm]) -> (f64, f64) {
    terms.iter().fold((0.0, 0.0), |(energy, derivative), term| {
        let arg = term.periodicity * phi - term.phase;
        (
            energy + term.k * (1.0 + arg.cos()),
            derivative - term.k * term.periodicity * arg.sin(),
        )
    })
}

/// 12-6 Lennard-Jones `4ε[(σ/r)¹² - (σ/r)⁶]` and `dE/dr`.
#[inline]
pub fn lennard_jones_12_6(dist: f64, sigma: f64, epsilon: f64) -> (f64, f64) {
    let s6 = (sigma / dist).powi(6);
    let s12 = s6 * s6;
    (
        4.0 * epsilon * (s12 - s6),
        -24.0 * epsilon * (2.0 * s12 - s6) / dist,
    )
}

/// Direct Coulomb `k_e q_i q_j s / r` and `dE/dr`.
#[inline]
pub fn coulomb(dist: f64, q1: f64, q2: f64, scale: f64) -> (f64, f64) {
    let energy = COULOMB_CONSTANT * q1 * q2 * scale / dist;
    (energy, -energy / dist)
}

/// Geometric-mean combining rule for well depths.
#[inline]
pub fn combine_epsilon(a: f64, b: f64) -> f64 {
    (a * b).sqrt()
}

/// Arithmetic-mean combining rule for radii.
#[inline]
pub fn combine_sigma(a: f64, b: f64) -> f64 {
    0.5 * (a + b)
}

#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle - 2.0 * PI * (angle / (2.0 * PI)).round();
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn numeric_derivative<F: Fn(f64) -> f64>(f: F, x: f64) -> f64 {
        let h = 1e-6;
        (f(x + h) - f(x - h)) / (2.0 * h)
    }

    #[test]
    fn harmonic_matches_bond_scenario() {
        let (energy, derivative) = harmonic(1.0, 1.375, 305.0);
        assert!(f64_approx_equal(energy, 305.0 * 0.375 * 0.375));
        assert!(f64_approx_equal(derivative, 2.0 * 305.0 * (1.0 - 1.375)));
    }

    #[test]
    fn harmonic_periodic_takes_the_short_way_round() {
        let (energy, derivative) = harmonic_periodic(PI - 0.1, -PI + 0.1, 1.0);
        assert!(f64_approx_equal(energy, 0.04));
        assert!(f64_approx_equal(derivative, -0.4));
    }

    #[test]
    fn periodic_torsion_sums_all_terms() {
        let terms = [
            DihedralTerm {
                k: 1.0,
                periodicity: 3.0,
                phase: 0.0,
            },
            DihedralTerm {
                k: 0.5,
                periodicity: 1.0,
                phase: PI,
            },
        ];
        let (energy, _) = periodic_torsion(0.0, &terms);
        assert!(f64_approx_equal(energy, 2.0 + 0.0));

        let phi = 0.7;
        let (_, derivative) = periodic_torsion(phi, &terms);
        let expected = numeric_derivative(|x| periodic_torsion(x, &terms).0, phi);
        assert!((derivative - expected).abs() < 1e-6);
    }

    #[test]
    fn lennard_jones_minimum_is_at_two_to_the_sixth_sigma() {
        let sigma = 3.4;
        let r_min = 2f64.powf(1.0 / 6.0) * sigma;
        let (energy, derivative) = lennard_jones_12_6(r_min, sigma, 0.238);
        assert!(f64_approx_equal(energy, -0.238));
        assert!(derivative.abs() < 1e-9);
        assert!(f64_approx_equal(lennard_jones_12_6(sigma, sigma, 0.238).0, 0.0));
    }

    #[test]
    fn lennard_jones_derivative_matches_finite_difference() {
        let r = 3.1;
        let (_, derivative) = lennard_jones_12_6(r, 3.4, 0.238);
        let expected = numeric_derivative(|x| lennard_jones_12_6(x, 3.4, 0.238).0, r);
        assert!((derivative - expected).abs() < 1e-6);
    }

    #[test]
    fn coulomb_calculates_repulsive_and_attractive_energies() {
        assert!(f64_approx_equal(coulomb(1.0, 1.0, 1.0, 1.0).0, COULOMB_CONSTANT));
        assert!(f64_approx_equal(coulomb(2.0, 1.0, -1.0, 1.0).0, -COULOMB_CONSTANT / 2.0));
        assert!(f64_approx_equal(coulomb(2.0, 1.0, 1.0, 0.5).1, -COULOMB_CONSTANT / 8.0));
    }

    #[test]
    fn combining_rules_use_geometric_and_arithmetic_means() {
        assert!(f64_approx_equal(combine_epsilon(0.1, 0.4), 0.2));
        assert!(f64_approx_equal(combine_sigma(3.0, 4.0), 3.5));
    }

    #[test]
    fn wrap_angle_maps_into_half_open_interval() {
        assert!(f64_approx_equal(wrap_angle(PI + 0.5), -PI + 0.5));
        assert!(f64_approx_equal(wrap_angle(-PI), PI));
        assert!(f64_approx_equal(wrap_angle(2.0 * PI + 0.5), 0.5));
        assert!(f64_approx_equal(wrap_angle(-0.5), -0.5));
    }
}
