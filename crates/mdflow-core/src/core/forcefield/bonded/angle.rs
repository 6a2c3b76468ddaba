use super::{DEGENERATE_NORM_SQ, stretch};
use crate::core::forcefield::constraint::{Constraint, ConstraintError, Frame, TermOutput};
use crate::core::forcefield::kernel::{Contribution, Kernel};
use crate::core::forcefield::params::{AngleParam, ForcefieldParams, type_key};
use crate::core::forcefield::potentials::harmonic;
use crate::core::models::topology::Topology;
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "angle";

/// Harmonic bending `E = k (θ - θ0)²` plus the optional Urey-Bradley 1-3 stretch
/// `E = ku (r13 - u0)²`.
#[derive(Debug)]
pub struct HarmonicAngle {
    params: Arc<ForcefieldParams>,
    kernel: Kernel,
    angles: Vec<[usize; 3]>,
    values: Vec<AngleParam>,
    output: TermOutput,
}

impl HarmonicAngle {
    pub fn new(params: Arc<ForcefieldParams>, kernel: Kernel) -> Self {
        Self {
            params,
            kernel,
            angles: Vec::new(),
            values: Vec::new(),
            output: TermOutput::default(),
        }
    }
}

/// Bending forces on `[i, j, k]` for the angle at `j`.
///
/// The in-plane directions of steepest angle change come from the normal `a × b` of the two
/// arms; each end force is perpendicular to its arm, so the net torque about `j` vanishes.
fn bend(frame: &Frame<'_>, [i, j, k]: [usize; 3], param: &AngleParam) -> (f64, [Vector3<f64>; 3]) {
    let a = frame.displacement(j, i);
    let b = frame.displacement(j, k);
    let normal = a.cross(&b);
    let theta = normal.norm().atan2(a.dot(&b));
    let (energy, de_dtheta) = harmonic(theta, param.theta0, param.k);

    let (a_sq, b_sq, n_sq) = (a.norm_squared(), b.norm_squared(), normal.norm_squared());
    if n_sq < DEGENERATE_NORM_SQ || a_sq < DEGENERATE_NORM_SQ || b_sq < DEGENERATE_NORM_SQ {
        return (energy, [Vector3::zeros(); 3]);
    }

    let f_i = normal.cross(&a).normalize() * (de_dtheta / a_sq.sqrt());
    let f_k = b.cross(&normal).normalize() * (de_dtheta / b_sq.sqrt());
    (energy, [f_i, -(f_i + f_k), f_k])
}

impl Constraint for HarmonicAngle {
    fn name(&self) -> &'static str {
        NAME
    }

    fn bind(&mut self, topology: &Topology) -> Result<(), ConstraintError> {
        self.output.ensure_unbound(NAME)?;
        let types = &topology.dense()?.particle_types;

        let values = topology
            .angles()
            .iter()
            .map(|&[i, j, k]| {
                let key = [types[i].as_str(), types[j].as_str(), types[k].as_str()];
                self.params
                    .angle(key)
                    .copied()
                    .ok_or_else(|| ConstraintError::MissingParameter {
                        term: NAME,
                        key: type_key(&key),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.angles = topology.angles().to_vec();
        self.values = values;
        self.output.mark_bound(topology.num_particles());
        debug!(
            "Bound {} angle(s), {} with a Urey-Bradley term.",
            self.angles.len(),
            self.values.iter().filter(|v| v.urey_bradley.is_some()).count()
        );
        Ok(())
    }

    fn is_bound(&self) -> bool {
        self.output.is_bound()
    }

    fn update(&mut self, frame: &Frame<'_>) -> Result<(), ConstraintError> {
        self.output.check_frame(NAME, frame)?;
        let (angles, values) = (&self.angles, &self.values);
        let result = self
            .kernel
            .accumulate(frame.num_particles(), angles.len(), |n| {
                let [i, j, k] = angles[n];
                let param = &values[n];
                let (mut energy, mut forces) = bend(frame, angles[n], param);
                if let Some(ub) = param.urey_bradley {
                    let (ub_energy, [f_i, f_k]) = stretch(frame, i, k, ub.ku, ub.u0);
                    energy += ub_energy;
                    forces[0] += f_i;
                    forces[2] += f_k;
                }
                Some(Contribution {
                    energy,
                    particles: [i, j, k],
                    forces,
                })
            });
        self.output.store(result);
        Ok(())
    }

    fn forces(&self) -> Result<&[Vector3<f64>], ConstraintError> {
        self.output.forces(NAME)
    }

    fn potential_energy(&self) -> Result<f64, ConstraintError> {
        self.output.potential_energy(NAME)
    }
}
