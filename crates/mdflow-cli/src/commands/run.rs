use crate::cli::RunArgs;
use crate::config::{AppConfig, PartialRunConfig};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use mdflow::{
    core::forcefield::params::ForcefieldParams,
    engine::{ensemble::Ensemble, error::EngineError, progress::ProgressReporter},
    workflows::{self, simulate::SimulationResult},
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One line of the final-state CSV.
#[derive(Debug, Serialize)]
struct ParticleRow<'a> {
    index: usize,
    id: i64,
    #[serde(rename = "type")]
    particle_type: &'a str,
    x: f64,
    y: f64,
    z: f64,
    vx: f64,
    vy: f64,
    vz: f64,
}

pub fn run(args: RunArgs) -> Result<()> {
    let partial_config = PartialRunConfig::from_file(&args.config)?;
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new(""));
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args, base_dir)?;

    info!("Loading force-field parameters from {:?}", &config.forcefield_path);
    let params = Arc::new(ForcefieldParams::load(&config.forcefield_path)?);
    let mut ensemble = build_ensemble(&config, &params)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Simulating {} particle(s) for {} step(s)...",
        ensemble.num_particles(),
        config.simulation.num_steps
    );
    info!("Invoking the core simulation workflow...");
    let result = workflows::simulate::run(&mut ensemble, &config.simulation, &reporter)?;

    print_summary(&ensemble, &result);

    if let Some(path) = &args.energy_log {
        write_energy_log(path, &result)?;
        println!("Energy log written to: {}", path.display());
    }
    if let Some(path) = &args.output {
        write_final_state(path, &ensemble)?;
        println!("Final state written to: {}", path.display());
    }

    Ok(())
}

fn build_ensemble(config: &AppConfig, params: &Arc<ForcefieldParams>) -> Result<Ensemble> {
    let system = config.system.build()?;
    let terms = config.terms.build(&system.topology, params, config.kernel);

    let mut ensemble = Ensemble::new(system.topology).map_err(EngineError::from)?;
    let state = ensemble.state_mut();
    if let Some(matrix) = system.pbc {
        state.set_pbc_matrix(matrix).map_err(EngineError::from)?;
    }
    state
        .set_positions(&system.positions)
        .map_err(EngineError::from)?;
    if let Some(velocities) = &system.velocities {
        state.set_velocities(velocities).map_err(EngineError::from)?;
    }
    ensemble.add_constraints(terms).map_err(EngineError::from)?;
    Ok(ensemble)
}

fn print_summary(ensemble: &Ensemble, result: &SimulationResult) {
    if let Some(report) = &result.minimization {
        println!(
            "Minimization: {:.4} -> {:.4} kcal/mol in {} iteration(s){}",
            report.initial_energy,
            report.final_energy,
            report.iterations,
            if report.converged { "" } else { " (not converged)" }
        );
    }
    if let Some(last) = result.records.last() {
        println!(
            "✓ Final energy after {} step(s): {:.4} kcal/mol (potential {:.4}, kinetic {:.4}), T = {:.2} K",
            last.step, last.total, last.potential, last.kinetic, last.temperature
        );
    }
    for (term, energy) in ensemble.energy_breakdown() {
        println!("  {:<16} {:>14.4}", term, energy);
    }
}

fn write_energy_log(path: &Path, result: &SimulationResult) -> Result<()> {
    info!("Writing {} energy record(s) to {:?}", result.records.len(), path);
    let mut writer = csv::Writer::from_path(path)?;
    for record in &result.records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_final_state(path: &Path, ensemble: &Ensemble) -> Result<()> {
    info!("Writing final positions and velocities to {:?}", path);
    let state = ensemble.state();
    let mut writer = csv::Writer::from_path(path)?;
    for (index, ((particle, position), velocity)) in ensemble
        .topology()
        .particles()
        .iter()
        .zip(state.positions())
        .zip(state.velocities())
        .enumerate()
    {
        writer.serialize(ParticleRow {
            index,
            id: particle.particle_id,
            particle_type: &particle.particle_type,
            x: position.x,
            y: position.y,
            z: position.z,
            vx: velocity.x,
            vy: velocity.y,
            vz: velocity.z,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::error::CliError;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    const PARAMS: &str = "[bond]\n\"C-C\" = [305.0, 1.375]\n";

    const RUN_FILE: &str = r#"
forcefield = "params.toml"

[system]
box = [[30.0, 0.0, 0.0], [0.0, 30.0, 0.0], [0.0, 0.0, 30.0]]
bonds = [[0, 1]]

[[system.particles]]
type = "C"
mass = 12.011
position = [10.0, 10.0, 10.0]

[[system.particles]]
id = 7
type = "C"
mass = 12.011
position = [11.5, 10.0, 10.0]

[simulation]
time-step = 0.5
steps = 40
report-interval = 10

[minimization]
max-iterations = 20
"#;

    fn args(dir: &Path, extra: &[&str]) -> RunArgs {
        let config = dir.join("run.toml");
        let mut argv = vec!["mdflow", "run", "-c", config.to_str().unwrap()];
        argv.extend_from_slice(extra);
        let Commands::Run(args) = Cli::parse_from(argv).command;
        args
    }

    fn setup(run_file: &str) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("params.toml"), PARAMS).unwrap();
        fs::write(dir.path().join("run.toml"), run_file).unwrap();
        dir
    }

    #[test]
    fn run_writes_energy_log_and_final_state() {
        let dir = setup(RUN_FILE);
        let energy_log = dir.path().join("energies.csv");
        let output = dir.path().join("final.csv");

        run(args(
            dir.path(),
            &[
                "-e",
                energy_log.to_str().unwrap(),
                "-o",
                output.to_str().unwrap(),
            ],
        ))
        .unwrap();

        let log = fs::read_to_string(&energy_log).unwrap();
        let mut lines = log.lines();
        assert_eq!(
            lines.next(),
            Some("step,time,potential,kinetic,total,temperature")
        );
        // Step 0 plus one record per 10-step chunk.
        assert_eq!(lines.count(), 5);

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[2], "type");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "1");
        assert_eq!(&rows[1][1], "7");
    }

    #[test]
    fn minimized_spring_relaxes_towards_equilibrium() {
        let dir = setup(RUN_FILE);
        let config = PartialRunConfig::from_file(&dir.path().join("run.toml"))
            .unwrap()
            .merge_with_cli(&args(dir.path(), &["-n", "0"]), dir.path())
            .unwrap();
        let params = Arc::new(ForcefieldParams::load(&config.forcefield_path).unwrap());
        let mut ensemble = build_ensemble(&config, &params).unwrap();
        assert_eq!(ensemble.constraints().len(), 1);
        assert!(ensemble.state().pbc().is_some());

        let result = workflows::simulate::run(
            &mut ensemble,
            &config.simulation,
            &ProgressReporter::new(),
        )
        .unwrap();
        let report = result.minimization.unwrap();
        assert!(report.final_energy < report.initial_energy);
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn singular_box_is_rejected() {
        let dir = setup(&RUN_FILE.replace(
            "[0.0, 0.0, 30.0]]",
            "[0.0, 0.0, 0.0]]",
        ));
        let result = run(args(dir.path(), &[]));
        assert!(matches!(
            result,
            Err(CliError::Engine(EngineError::State { .. }))
        ));
    }
}
