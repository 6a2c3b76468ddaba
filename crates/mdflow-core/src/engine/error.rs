use thiserror::Error;

use super::config::ConfigError;
use super::ensemble::EnsembleError;
use super::integrator::IntegratorError;
use super::minimizer::MinimizerError;
use super::state::StateError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("State error: {source}")]
    State {
        #[from]
        source: StateError,
    },

    #[error("Ensemble error: {source}")]
    Ensemble {
        #[from]
        source: EnsembleError,
    },

    #[error("Integration failed: {source}")]
    Integrator {
        #[from]
        source: IntegratorError,
    },

    #[error("Minimization failed: {source}")]
    Minimizer {
        #[from]
        source: MinimizerError,
    },
}
