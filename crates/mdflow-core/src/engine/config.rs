use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntegratorConfig {
    Verlet {
        time_step: f64,
    },
    Langevin {
        time_step: f64,
        temperature: f64,
        friction: f64,
        seed: u64,
    },
}

impl IntegratorConfig {
    pub fn time_step(&self) -> f64 {
        match self {
            Self::Verlet { time_step } | Self::Langevin { time_step, .. } => *time_step,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Verlet { .. } => "verlet",
            Self::Langevin { .. } => "langevin",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizationConfig {
    pub energy_tolerance: f64,
    pub max_iterations: usize,
    pub initial_step: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VelocityInit {
    pub temperature: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub integrator: IntegratorConfig,
    pub num_steps: usize,
    pub report_interval: usize,
    pub initial_velocities: Option<VelocityInit>,
    pub minimization: Option<MinimizationConfig>,
}

#[derive(Default)]
pub struct SimulationConfigBuilder {
    integrator: Option<IntegratorConfig>,
    num_steps: Option<usize>,
    report_interval: Option<usize>,
    initial_velocities: Option<VelocityInit>,
    minimization: Option<MinimizationConfig>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integrator(mut self, integrator: IntegratorConfig) -> Self {
        self.integrator = Some(integrator);
        self
    }
    pub fn num_steps(mut self, steps: usize) -> Self {
        self.num_steps = Some(steps);
        self
    }
    pub fn report_interval(mut self, interval: usize) -> Self {
        self.report_interval = Some(interval);
        self
    }
    pub fn initial_velocities(mut self, temperature: f64, seed: u64) -> Self {
        self.initial_velocities = Some(VelocityInit { temperature, seed });
        self
    }
    pub fn minimization(mut self, minimization: MinimizationConfig) -> Self {
        self.minimization = Some(minimization);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let integrator = self
            .integrator
            .ok_or(ConfigError::MissingParameter("integrator"))?;
        let num_steps = self
            .num_steps
            .ok_or(ConfigError::MissingParameter("num_steps"))?;
        // Defaults to a single record at the end of the run.
        let report_interval = self.report_interval.unwrap_or(num_steps.max(1));

        require_positive("time_step", integrator.time_step())?;
        if let IntegratorConfig::Langevin {
            temperature,
            friction,
            ..
        } = &integrator
        {
            require_non_negative("temperature", *temperature)?;
            require_non_negative("friction", *friction)?;
        }
        if report_interval == 0 {
            return Err(ConfigError::InvalidValue {
                name: "report_interval",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(init) = &self.initial_velocities {
            require_non_negative("initial_temperature", init.temperature)?;
        }
        if let Some(minimization) = &self.minimization {
            require_non_negative("energy_tolerance", minimization.energy_tolerance)?;
            require_positive("initial_step", minimization.initial_step)?;
        }

        Ok(SimulationConfig {
            integrator,
            num_steps,
            report_interval,
            initial_velocities: self.initial_velocities,
            minimization: self.minimization,
        })
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            name,
            reason: format!("{value} is not a positive finite number"),
        })
    }
}

fn require_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            name,
            reason: format!("{value} is negative or not finite"),
        })
    }
}
