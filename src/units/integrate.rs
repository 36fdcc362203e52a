//! Shared ODE time-stepping for the stateful unit models.
//!
//! All integrating units advance their state over one driver step
//! with the [`differential-equations`](https://docs.rs/differential-equations/)
//! crate: the liquid-side models with adaptive Dormand-Prince 5(4),
//! the stiff digester with implicit Radau5.

use differential_equations::methods::{ExplicitRungeKutta, ImplicitRungeKutta};
use differential_equations::ode::{ODE, ODEProblem};
use nalgebra::SVector;

use crate::error::{PlantError, Result};

/// Integration method selection per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Adaptive explicit Dormand-Prince 5(4).
    Dopri5,
    /// Adaptive implicit Radau IIA 5th order, for stiff systems.
    Radau5,
}

/// Advances `y0` from `t0` to `t0 + dt` under the given right-hand
/// side.
///
/// A non-positive `dt` returns the initial state unchanged. The final
/// state is checked for finiteness; divergence aborts with the owning
/// unit's name and the step time attached.
pub(crate) fn advance<const N: usize, F>(
    ode: &F,
    y0: SVector<f64, N>,
    t0: f64,
    dt: f64,
    method: Method,
    unit: &'static str,
) -> Result<SVector<f64, N>>
where
    F: ODE<f64, SVector<f64, N>>,
{
    if dt <= 0.0 {
        return Ok(y0);
    }

    let problem = ODEProblem::new(ode, t0, t0 + dt, y0);
    let solution = match method {
        Method::Dopri5 => {
            let mut solver = ExplicitRungeKutta::dopri5().rtol(1e-6).atol(1e-8);
            problem.solve(&mut solver)
        }
        Method::Radau5 => {
            let mut solver = ImplicitRungeKutta::radau5().rtol(1e-6).atol(1e-8);
            problem.solve(&mut solver)
        }
    };

    match solution {
        Ok(sol) => {
            let y_end = sol.y[sol.y.len() - 1];
            if y_end.iter().all(|v| v.is_finite()) {
                Ok(y_end)
            } else {
                Err(PlantError::Diverged { unit, time: t0 })
            }
        }
        Err(e) => Err(PlantError::Solver {
            unit,
            time: t0,
            detail: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl ODE<f64, SVector<f64, 1>> for Decay {
        fn diff(&self, _t: f64, y: &SVector<f64, 1>, dydt: &mut SVector<f64, 1>) {
            dydt[0] = -y[0];
        }
    }

    #[test]
    fn test_exponential_decay() {
        let y0 = SVector::<f64, 1>::new(1.0);
        let y1 = advance(&Decay, y0, 0.0, 1.0, Method::Dopri5, "decay").unwrap();
        let expected = (-1.0f64).exp();
        assert!((y1[0] - expected).abs() < 1e-4, "got {}", y1[0]);
    }

    #[test]
    fn test_stiff_method_agrees() {
        let y0 = SVector::<f64, 1>::new(1.0);
        let explicit = advance(&Decay, y0, 0.0, 0.5, Method::Dopri5, "decay").unwrap();
        let implicit = advance(&Decay, y0, 0.0, 0.5, Method::Radau5, "decay").unwrap();
        assert!((explicit[0] - implicit[0]).abs() < 1e-4);
    }

    #[test]
    fn test_zero_step_is_identity() {
        let y0 = SVector::<f64, 1>::new(0.75);
        let y1 = advance(&Decay, y0, 3.0, 0.0, Method::Dopri5, "decay").unwrap();
        assert_eq!(y1[0], 0.75);
    }
}
