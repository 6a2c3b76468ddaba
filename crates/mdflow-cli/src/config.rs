use crate::cli::{KernelArg, RunArgs};
use crate::error::{CliError, Result};
use crate::system::{SystemSpec, TermsSpec};
use mdflow::core::forcefield::kernel::Kernel;
use mdflow::engine::config as core_config;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_TIME_STEP_FS: f64 = 1.0;
const DEFAULT_FRICTION_PER_FS: f64 = 0.01;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialKernel {
    Host,
    Accelerator,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
enum PartialIntegrator {
    #[default]
    Verlet,
    Langevin,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSimulationConfig {
    integrator: Option<PartialIntegrator>,
    time_step: Option<f64>,
    steps: Option<usize>,
    report_interval: Option<usize>,
    temperature: Option<f64>,
    friction: Option<f64>,
    seed: Option<u64>,
    initial_temperature: Option<f64>,
    velocity_seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialMinimizationConfig {
    energy_tolerance: Option<f64>,
    max_iterations: Option<usize>,
    initial_step: Option<f64>,
}

/// The run file as written by the user, before CLI overrides and defaults are applied.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialRunConfig {
    forcefield: Option<String>,
    kernel: Option<PartialKernel>,
    system: SystemSpec,
    #[serde(default)]
    terms: TermsSpec,
    #[serde(default)]
    simulation: PartialSimulationConfig,
    minimization: Option<PartialMinimizationConfig>,
}

/// Everything the `run` command needs, fully resolved.
#[derive(Debug)]
pub struct AppConfig {
    pub forcefield_path: PathBuf,
    pub kernel: Kernel,
    pub system: SystemSpec,
    pub terms: TermsSpec,
    pub simulation: core_config::SimulationConfig,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading run file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies CLI overrides and defaults. Relative forcefield paths resolve against `base_dir`,
    /// the directory holding the run file.
    pub fn merge_with_cli(self, args: &RunArgs, base_dir: &Path) -> Result<AppConfig> {
        let forcefield = self.forcefield.ok_or_else(|| {
            CliError::Config("`forcefield` (path to the parameter file) is required.".to_string())
        })?;
        let forcefield_path = resolve_path(base_dir, &forcefield)?;

        let kernel = match (args.kernel, self.kernel) {
            (Some(KernelArg::Accelerator), _) | (None, Some(PartialKernel::Accelerator)) => {
                Kernel::Accelerator
            }
            _ => Kernel::Host,
        };

        let sim = self.simulation;
        let time_step = args
            .time_step
            .or(sim.time_step)
            .unwrap_or(DEFAULT_TIME_STEP_FS);
        let integrator = match sim.integrator.unwrap_or_default() {
            PartialIntegrator::Verlet => core_config::IntegratorConfig::Verlet { time_step },
            PartialIntegrator::Langevin => core_config::IntegratorConfig::Langevin {
                time_step,
                temperature: sim.temperature.ok_or_else(|| {
                    CliError::Config(
                        "`simulation.temperature` is required for the langevin integrator."
                            .to_string(),
                    )
                })?,
                friction: sim.friction.unwrap_or(DEFAULT_FRICTION_PER_FS),
                seed: sim.seed.unwrap_or(0),
            },
        };
        let steps = args.steps.or(sim.steps).ok_or_else(|| {
            CliError::Config("`simulation.steps` is required (or pass --steps).".to_string())
        })?;

        let mut builder = core_config::SimulationConfigBuilder::new()
            .integrator(integrator)
            .num_steps(steps);
        if let Some(interval) = args.report_interval.or(sim.report_interval) {
            builder = builder.report_interval(interval);
        }
        if let Some(temperature) = sim.initial_temperature {
            builder = builder.initial_velocities(temperature, sim.velocity_seed.unwrap_or(0));
        }
        if !args.no_minimize {
            if let Some(partial) = self.minimization {
                builder = builder.minimization(Self::merge_minimization(partial));
            }
        }

        Ok(AppConfig {
            forcefield_path,
            kernel,
            system: self.system,
            terms: self.terms,
            simulation: builder
                .build()
                .map_err(|e| CliError::Config(e.to_string()))?,
        })
    }

    fn merge_minimization(partial: PartialMinimizationConfig) -> core_config::MinimizationConfig {
        core_config::MinimizationConfig {
            energy_tolerance: partial.energy_tolerance.unwrap_or(1e-4),
            max_iterations: partial.max_iterations.unwrap_or(1000),
            initial_step: partial.initial_step.unwrap_or(0.01),
        }
    }
}

fn resolve_path(base_dir: &Path, value: &str) -> Result<PathBuf> {
    let path = Path::new(value);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    if !resolved.exists() {
        return Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Provided path does not exist: {}", resolved.display()),
        )));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    const RUN_FILE: &str = r#"
forcefield = "params.toml"
kernel = "accelerator"

[system]
bonds = [[0, 1]]

[[system.particles]]
type = "C"
mass = 12.011
position = [0.0, 0.0, 0.0]

[[system.particles]]
type = "C"
mass = 12.011
position = [1.5, 0.0, 0.0]

[simulation]
integrator = "langevin"
time-step = 0.5
steps = 200
report-interval = 20
temperature = 300.0
seed = 3
initial-temperature = 300.0
velocity-seed = 9

[minimization]
max-iterations = 50
"#;

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["mdflow", "run", "-c", "run.toml"];
        argv.extend_from_slice(extra);
        let Commands::Run(args) = Cli::parse_from(argv).command;
        args
    }

    fn with_params() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("params.toml"), "[bond]\n\"C-C\" = [305.0, 1.375]\n").unwrap();
        dir
    }

    #[test]
    fn run_file_merges_with_defaults() {
        let dir = with_params();
        let app = PartialRunConfig::from_toml(RUN_FILE)
            .unwrap()
            .merge_with_cli(&args(&[]), dir.path())
            .unwrap();

        assert_eq!(app.forcefield_path, dir.path().join("params.toml"));
        assert_eq!(app.kernel, Kernel::Accelerator);
        assert_eq!(app.system.particles.len(), 2);
        assert_eq!(
            app.simulation.integrator,
            core_config::IntegratorConfig::Langevin {
                time_step: 0.5,
                temperature: 300.0,
                friction: DEFAULT_FRICTION_PER_FS,
                seed: 3,
            }
        );
        assert_eq!(app.simulation.num_steps, 200);
        assert_eq!(app.simulation.report_interval, 20);
        let minimization = app.simulation.minimization.unwrap();
        assert_eq!(minimization.max_iterations, 50);
        assert_eq!(minimization.energy_tolerance, 1e-4);
    }

    #[test]
    fn cli_arguments_override_the_run_file() {
        let dir = with_params();
        let app = PartialRunConfig::from_toml(RUN_FILE)
            .unwrap()
            .merge_with_cli(
                &args(&["-n", "10", "-t", "2.0", "--kernel", "host", "--no-minimize"]),
                dir.path(),
            )
            .unwrap();
        assert_eq!(app.kernel, Kernel::Host);
        assert_eq!(app.simulation.num_steps, 10);
        assert_eq!(app.simulation.integrator.time_step(), 2.0);
        assert!(app.simulation.minimization.is_none());
    }

    #[test]
    fn langevin_without_temperature_is_rejected() {
        let dir = with_params();
        let content = RUN_FILE.replace("temperature = 300.0\nseed", "seed");
        let result = PartialRunConfig::from_toml(&content)
            .unwrap()
            .merge_with_cli(&args(&[]), dir.path());
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("temperature")));
    }

    #[test]
    fn missing_forcefield_file_is_reported() {
        let dir = tempdir().unwrap();
        let result = PartialRunConfig::from_toml(RUN_FILE)
            .unwrap()
            .merge_with_cli(&args(&[]), dir.path());
        assert!(matches!(result, Err(CliError::Io(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let content = format!("{RUN_FILE}\n[extras]\nfoo = 1\n");
        assert!(PartialRunConfig::from_toml(&content).is_err());
    }

    #[test]
    fn from_file_reports_the_path_on_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "forcefield = ").unwrap();
        match PartialRunConfig::from_file(&path) {
            Err(CliError::FileParsing { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
