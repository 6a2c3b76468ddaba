//! Constants in the engine unit system: Å, fs, amu, kcal/mol, e, K.

/// Boltzmann constant in kcal/(mol·K).
pub const BOLTZMANN_KCAL_PER_MOL_K: f64 = 0.001_987_204_1;

/// Coulomb constant in kcal·Å/(mol·e²).
pub const COULOMB_CONSTANT: f64 = 332.0637;

/// Number of kcal/mol in one amu·Å²/fs².
pub const KCAL_PER_MOL_PER_AMU_A2_FS2: f64 = 2390.057_361;

/// Converts a force in kcal/(mol·Å) acting on `mass` amu into an acceleration in Å/fs².
#[inline]
pub fn acceleration(force: f64, mass: f64) -> f64 {
    force / (mass * KCAL_PER_MOL_PER_AMU_A2_FS2)
}

/// Kinetic energy in kcal/mol of a particle of `mass` amu moving at `speed_sq` Å²/fs².
#[inline]
pub fn kinetic_energy(mass: f64, speed_sq: f64) -> f64 {
    0.5 * mass * speed_sq * KCAL_PER_MOL_PER_AMU_A2_FS2
}

/// `k_B·T / m` in Å²/fs², the per-axis velocity variance at temperature `temperature`.
#[inline]
pub fn thermal_velocity_variance(temperature: f64, mass: f64) -> f64 {
    BOLTZMANN_KCAL_PER_MOL_K * temperature / (mass * KCAL_PER_MOL_PER_AMU_A2_FS2)
}
