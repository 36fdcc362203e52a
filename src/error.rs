//! Error taxonomy for the simulation core.
//!
//! Configuration problems are caught at construction time, influent
//! problems at load time, and numerical problems abort the run with
//! the offending unit and simulation time attached. Divergence is
//! never recovered from locally: a wrong trajectory is worse than an
//! aborted one.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PlantError>;

/// Errors produced by plant construction, influent loading and the
/// per-step numerics.
#[derive(Debug, thiserror::Error)]
pub enum PlantError {
    /// Invalid unit or topology configuration, rejected before any
    /// step runs.
    #[error("invalid configuration for {unit}: {reason}")]
    Config { unit: &'static str, reason: String },

    /// A state vector left the finite domain during integration.
    #[error("numerical divergence in {unit} at t = {time} d")]
    Diverged { unit: &'static str, time: f64 },

    /// The ODE backend refused or failed the integration step.
    #[error("ODE solver failed in {unit} at t = {time} d: {detail}")]
    Solver {
        unit: &'static str,
        time: f64,
        detail: String,
    },

    /// A stream conversion between model domains could not conserve
    /// mass with the available nitrogen pools.
    #[error("stream conversion failed in {unit}: {reason}")]
    Conversion { unit: &'static str, reason: String },

    /// Malformed or dimensionally wrong influent data, rejected at
    /// load time before any record is consumed.
    #[error("influent data rejected: {reason}")]
    Influent { reason: String },

    /// Steady-state search did not settle within the iteration cap.
    #[error("plant failed to stabilize within {iterations} iterations")]
    StabilizationFailed { iterations: usize },
}

impl PlantError {
    pub(crate) fn config(unit: &'static str, reason: impl Into<String>) -> Self {
        PlantError::Config {
            unit,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlantError::Diverged {
            unit: "reactor3",
            time: 1.25,
        };
        assert_eq!(
            err.to_string(),
            "numerical divergence in reactor3 at t = 1.25 d"
        );
    }

    #[test]
    fn test_config_helper() {
        let err = PlantError::config("splitter", "negative fraction");
        assert!(err.to_string().contains("splitter"));
        assert!(err.to_string().contains("negative fraction"));
    }
}
