use crate::engine::config::{IntegratorConfig, SimulationConfig};
use crate::engine::ensemble::Ensemble;
use crate::engine::error::EngineError;
use crate::engine::integrator::Integrator;
use crate::engine::integrator::langevin::Langevin;
use crate::engine::integrator::verlet::Verlet;
use crate::engine::minimizer::steepest_descent::SteepestDescent;
use crate::engine::minimizer::{MinimizationReport, Minimizer};
use crate::engine::progress::{Progress, ProgressReporter};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Energies of the ensemble after `step` integration steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyRecord {
    pub step: usize,
    /// Elapsed simulated time in fs.
    pub time: f64,
    pub potential: f64,
    pub kinetic: f64,
    pub total: f64,
    pub temperature: f64,
}

impl EnergyRecord {
    fn capture(ensemble: &Ensemble, step: usize, time_step: f64) -> Self {
        Self {
            step,
            time: step as f64 * time_step,
            potential: ensemble.potential_energy(),
            kinetic: ensemble.kinetic_energy(),
            total: ensemble.total_energy(),
            temperature: ensemble.temperature(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub minimization: Option<MinimizationReport>,
    /// One record before the first step and one after every completed chunk.
    pub records: Vec<EnergyRecord>,
}

#[instrument(skip_all, name = "simulation_workflow")]
pub fn run(
    ensemble: &mut Ensemble,
    config: &SimulationConfig,
    reporter: &ProgressReporter,
) -> Result<SimulationResult, EngineError> {
    info!(
        particles = ensemble.num_particles(),
        terms = ensemble.constraints().len(),
        integrator = config.integrator.name(),
        steps = config.num_steps,
        "Starting simulation."
    );

    // === Phase 1: Energy minimization (optional) ===
    let minimization = minimize(ensemble, config, reporter)?;

    // === Phase 2: Velocity initialization (optional) ===
    initialize_velocities(ensemble, config, reporter)?;

    // === Phase 3: Dynamics ===
    let records = integrate(ensemble, config, reporter)?;

    if let Some(last) = records.last() {
        info!(
            total_energy = last.total,
            temperature = last.temperature,
            "Simulation complete after {} step(s).",
            last.step
        );
    }
    Ok(SimulationResult {
        minimization,
        records,
    })
}

fn minimize(
    ensemble: &mut Ensemble,
    config: &SimulationConfig,
    reporter: &ProgressReporter,
) -> Result<Option<MinimizationReport>, EngineError> {
    let Some(settings) = &config.minimization else {
        return Ok(None);
    };
    reporter.report(Progress::PhaseStart {
        name: "Minimization",
    });
    let mut minimizer = SteepestDescent::new(settings.initial_step)?;
    let report = minimizer.minimize(
        ensemble,
        settings.energy_tolerance,
        settings.max_iterations,
    )?;
    reporter.report(Progress::Message(format!(
        "Minimized {:.4} -> {:.4} kcal/mol in {} iteration(s).",
        report.initial_energy, report.final_energy, report.iterations
    )));
    reporter.report(Progress::PhaseFinish);
    Ok(Some(report))
}

fn initialize_velocities(
    ensemble: &mut Ensemble,
    config: &SimulationConfig,
    reporter: &ProgressReporter,
) -> Result<(), EngineError> {
    let Some(init) = &config.initial_velocities else {
        return Ok(());
    };
    reporter.report(Progress::PhaseStart {
        name: "Velocity Initialization",
    });
    let mut rng = StdRng::seed_from_u64(init.seed);
    ensemble
        .state_mut()
        .set_velocities_to_temperature(init.temperature, &mut rng)?;
    reporter.report(Progress::PhaseFinish);
    Ok(())
}

fn build_integrator(config: &IntegratorConfig) -> Result<Box<dyn Integrator>, EngineError> {
    Ok(match *config {
        IntegratorConfig::Verlet { time_step } => Box::new(Verlet::new(time_step)?),
        IntegratorConfig::Langevin {
            time_step,
            temperature,
            friction,
            seed,
        } => Box::new(Langevin::new(time_step, temperature, friction, seed)?),
    })
}

fn integrate(
    ensemble: &mut Ensemble,
    config: &SimulationConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<EnergyRecord>, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Dynamics" });
    let mut integrator = build_integrator(&config.integrator)?;
    let time_step = integrator.time_step();

    ensemble.update()?;
    let mut records = vec![EnergyRecord::capture(ensemble, 0, time_step)];

    reporter.report(Progress::TaskStart {
        total_steps: config.num_steps as u64,
    });
    let mut completed = 0;
    while completed < config.num_steps {
        let chunk = config.report_interval.min(config.num_steps - completed);
        integrator.integrate(ensemble, chunk)?;
        completed += chunk;

        let record = EnergyRecord::capture(ensemble, completed, time_step);
        debug!(
            step = record.step,
            potential = record.potential,
            kinetic = record.kinetic,
            temperature = record.temperature,
            "Energy record."
        );
        reporter.report(Progress::Energies {
            step: completed as u64,
            potential: record.potential,
            kinetic: record.kinetic,
            temperature: record.temperature,
        });
        reporter.report(Progress::TaskIncrement {
            steps: chunk as u64,
        });
        records.push(record);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    Ok(records)
}
