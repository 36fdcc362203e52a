//! Unit process models of the plant layout.
//!
//! Each unit lives in its own file:
//!
//! - **Splitter**: ratio and threshold flow splitting
//! - **Combiner**: flow-weighted stream mixing
//! - **Asm1Reactor**: activated sludge tank (ASM1 kinetics)
//! - **PrimaryClarifier**: Otterpohl-Freund primary settling
//! - **Settler**: ten-layer Takacs secondary settler
//! - **Thickener**: ideal gravity thickening
//! - **Dewatering**: ideal sludge dewatering
//! - **Adm1Digester**: anaerobic digestion (ADM1) with the ASM
//!   interfaces
//! - **StorageTank**: variable-volume reject water buffer
//!
//! Stateful units expose a `step(t, dt, feed, ...)` method advancing
//! their internal ODE state over one driver interval; stateless units
//! are plain functions of their inputs. All units exchange 21-field
//! ASM1 streams; only the digester additionally speaks the 51-field
//! digester stream.

mod asm_reactor;
mod combiner;
mod dewatering;
mod digester;
pub(crate) mod integrate;
mod primary_clarifier;
mod settler;
mod splitter;
mod storage;
mod thickener;

pub use asm_reactor::{Asm1Params, Asm1Reactor};
pub use combiner::Combiner;
pub use dewatering::Dewatering;
pub use digester::{Adm1Digester, Adm1Params, DigesterOutput, InterfaceParams};
pub use integrate::Method;
pub use primary_clarifier::{PrimaryClarifier, PrimaryClarifierOutput, PrimaryClarifierParams};
pub use settler::{Settler, SettlerOutput, SettlerParams, N_LAYERS};
pub use splitter::{SplitMode, Splitter};
pub use storage::StorageTank;
pub use thickener::Thickener;
