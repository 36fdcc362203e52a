//! # BSM2 Core: Wastewater Treatment Plant Simulation
//!
//! A simulation core for the Benchmark Simulation Model No. 2 (BSM2)
//! wastewater treatment plant layout: primary clarification, a
//! five-reactor activated sludge line (ASM1), a ten-layer secondary
//! settler, sludge thickening, anaerobic digestion (ADM1) with the
//! ASM/ADM interfaces, dewatering and reject water storage, plus the
//! benchmark's plant performance assessment.
//!
//! ## Example
//!
//! ```no_run
//! use bsm2_core::influent::Influent;
//! use bsm2_core::plant::Bsm2Plant;
//!
//! # fn main() -> bsm2_core::error::Result<()> {
//! let mut plant = Bsm2Plant::bsm2(Influent::bsm2_constant())?;
//!
//! // Drive the recycle streams to a steady state, then simulate
//! // 200 days at 15-minute steps, evaluating the final 5 days.
//! let dt = 15.0 / (24.0 * 60.0);
//! plant.stabilize(dt, 1e-3, 10_000)?;
//! let summary = plant.simulate(200.0, dt, 195.0)?;
//!
//! println!("effluent quality index: {:.1} kg/d", summary.mean_eqi);
//! println!("operational cost index: {:.1}", summary.oci);
//! # Ok(())
//! # }
//! ```
//!
//! Individual unit models are available in [`units`] for custom
//! layouts; all of them exchange the 21-field ASM1 [`stream::Stream`].

pub mod error;
pub mod influent;
pub mod performance;
pub mod plant;
pub mod stream;
pub mod units;

pub use error::{PlantError, Result};
pub use influent::Influent;
pub use performance::{GasProduction, OciInputs, PerfParams, Performance, Violations};
pub use plant::{Bsm2Plant, BoundaryStreams, ControlInput, SimulationSummary, StepReport};
pub use stream::{DigesterStream, Stream};
