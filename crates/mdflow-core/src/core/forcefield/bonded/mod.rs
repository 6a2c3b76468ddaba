//! Terms evaluated over the connectivity tuples of a topology.
//!
//! Each term resolves one parameter entry per tuple at bind time, keyed by the particle types of
//! the tuple, and evaluates all tuples with its [`Kernel`](super::kernel::Kernel) on update.

pub mod angle;
pub mod bond;
pub mod dihedral;
pub mod improper;

use super::constraint::Frame;
use nalgebra::Vector3;

const DEGENERATE_NORM_SQ: f64 = 1e-20;

/// Harmonic stretch between `i` and `j`: energy and the forces on `[i, j]`.
#[inline]
pub(crate) fn stretch(frame: &Frame<'_>, i: usize, j: usize, k: f64, r0: f64) -> (f64, [Vector3<f64>; 2]) {
    let d = frame.displacement(i, j);
    let r = d.norm();
    let (energy, de_dr) = super::potentials::harmonic(r, r0, k);
    if r * r < DEGENERATE_NORM_SQ {
        return (energy, [Vector3::zeros(); 2]);
    }
    let f_i = d * (de_dr / r);
    (energy, [f_i, -f_i])
}

/// Signed torsion angle of `(i, j, k, l)` and the forces produced by a potential `V(φ)`.
///
/// `potential` maps `φ` to `(V, dV/dφ)`. Returns the energy and the forces on `[i, j, k, l]`;
/// the forces sum to zero and exert no net torque. Collinear configurations yield zero force.
pub(crate) fn torsion<F>(frame: &Frame<'_>, particles: [usize; 4], potential: F) -> (f64, [Vector3<f64>; 4])
where
    F: FnOnce(f64) -> (f64, f64),
{
    let [i, j, k, l] = particles;
    let r_ij = frame.displacement(j, i);
    let r_kj = frame.displacement(j, k);
    let r_kl = frame.displacement(l, k);
    let m = r_ij.cross(&r_kj);
    let n = r_kj.cross(&r_kl);
    let m_sq = m.norm_squared();
    let n_sq = n.norm_squared();
    let r_kj_sq = r_kj.norm_squared();

    if m_sq < DEGENERATE_NORM_SQ || n_sq < DEGENERATE_NORM_SQ || r_kj_sq < DEGENERATE_NORM_SQ {
        let (energy, _) = potential(0.0);
        return (energy, [Vector3::zeros(); 4]);
    }

    let magnitude = m.cross(&n).norm().atan2(m.dot(&n));
    let phi = if r_ij.dot(&n) < 0.0 { -magnitude } else { magnitude };
    let (energy, dv_dphi) = potential(phi);

    let r_kj_norm = r_kj_sq.sqrt();
    let f_i = m * (-dv_dphi * r_kj_norm / m_sq);
    let f_l = n * (dv_dphi * r_kj_norm / n_sq);
    let p = r_ij.dot(&r_kj) / r_kj_sq;
    let q = r_kl.dot(&r_kj) / r_kj_sq;
    let s = f_i * p - f_l * q;
    let f_j = f_i - s;
    let f_k = f_l + s;

    (energy, [f_i, -f_j, -f_k, f_l])
}

/// Dihedral angle of four points, used by tests to cross-check [`torsion`].
#[cfg(test)]
pub(crate) fn dihedral_angle(positions: &[Vector3<f64>; 4]) -> f64 {
    let frame = Frame::open(positions);
    let mut phi = 0.0;
    let _ = torsion(&frame, [0, 1, 2, 3], |x| {
        phi = x;
        (0.0, 0.0)
    });
    phi
}

#[cfg(test)]
pub(crate) mod test_utils {
    use nalgebra::Vector3;

    pub const FORCE_TOLERANCE: f64 = 1e-8;

    pub fn net_force(forces: &[Vector3<f64>]) -> Vector3<f64> {
        forces.iter().sum()
    }

    pub fn net_torque(positions: &[Vector3<f64>], forces: &[Vector3<f64>], origin: &Vector3<f64>) -> Vector3<f64> {
        positions
            .iter()
            .zip(forces)
            .map(|(r, f)| (r - origin).cross(f))
            .sum()
    }

    /// Central-difference gradient of `energy` with respect to `positions[particle][axis]`.
    pub fn numeric_force<F>(positions: &[Vector3<f64>], particle: usize, axis: usize, energy: F) -> f64
    where
        F: Fn(&[Vector3<f64>]) -> f64,
    {
        let h = 1e-6;
        let mut plus = positions.to_vec();
        let mut minus = positions.to_vec();
        plus[particle][axis] += h;
        minus[particle][axis] -= h;
        -(energy(&plus) - energy(&minus)) / (2.0 * h)
    }

    pub fn assert_forces_close(a: &[Vector3<f64>], b: &[Vector3<f64>], relative: f64) {
        assert_eq!(a.len(), b.len());
        for (fa, fb) in a.iter().zip(b) {
            let scale = fa.norm().max(fb.norm()).max(1.0);
            assert!((fa - fb).norm() <= relative * scale, "{fa:?} != {fb:?}");
        }
    }
}
