//! Primary clarifier (Otterpohl-Freund model).
//!
//! The clarifier is modelled as a completely mixed tank for solubles
//! with a retention-time dependent removal efficiency for the
//! particulate fractions. A first-order lag on the internal flow
//! state smooths the hydraulic response. The unit produces an
//! overflow towards the activated sludge section and a primary sludge
//! underflow towards the digestion train.

use differential_equations::ode::ODE;
use nalgebra::SVector;

use crate::error::{PlantError, Result};
use crate::stream::{asm, Stream};
use crate::units::integrate::{self, Method};

/// Otterpohl-Freund clarifier parameters.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryClarifierParams {
    /// Calibration factor on the COD removal correlation.
    pub f_corr: f64,
    /// Particulate fraction of total COD in the feed.
    pub f_x: f64,
    /// Time constant of the flow lag, d.
    pub t_m: f64,
    /// Primary sludge flow as a fraction of the feed flow.
    pub f_ps: f64,
    /// TSS conversion factors for XI, XS, XBH, XBA, XP.
    pub tss_fractions: [f64; 5],
}

impl PrimaryClarifierParams {
    /// The BSM2 parameter set.
    pub fn bsm2() -> Self {
        PrimaryClarifierParams {
            f_corr: 0.65,
            f_x: 0.85,
            t_m: 0.125,
            f_ps: 0.007,
            tss_fractions: [0.75; 5],
        }
    }
}

/// Marks which stream fields settle as particulates.
const PARTICULATE: [f64; 21] = [
    0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 1.0,
];

struct ClarifierOde<'a> {
    feed: [f64; 21],
    volume: f64,
    params: &'a PrimaryClarifierParams,
}

impl ODE<f64, SVector<f64, 21>> for ClarifierOde<'_> {
    fn diff(&self, _t: f64, y: &SVector<f64, 21>, dydt: &mut SVector<f64, 21>) {
        let qv = self.feed[asm::Q] / self.volume;
        for i in 0..asm::TSS {
            dydt[i] = qv * (self.feed[i] - y[i]);
        }
        dydt[asm::TSS] = 0.0;
        dydt[asm::Q] = (self.feed[asm::Q] - y[asm::Q]) / self.params.t_m;
        dydt[asm::TEMP] = 0.0;
        for i in asm::SD1..=asm::XD5 {
            dydt[i] = qv * (self.feed[i] - y[i]);
        }
    }
}

/// Streams leaving the primary clarifier.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryClarifierOutput {
    /// Primary sludge towards the digestion train.
    pub underflow: Stream,
    /// Clarified water towards the activated sludge section.
    pub overflow: Stream,
    /// Tank contents at feed flow, used for inventory bookkeeping.
    pub internal: Stream,
}

/// Primary clarifier with lagged hydraulics and retention-dependent
/// particulate removal.
#[derive(Debug, Clone)]
pub struct PrimaryClarifier {
    volume: f64,
    params: PrimaryClarifierParams,
    state: SVector<f64, 21>,
}

impl PrimaryClarifier {
    pub fn new(volume: f64, initial: Stream, params: PrimaryClarifierParams) -> Result<Self> {
        if !(volume.is_finite() && volume > 0.0) {
            return Err(PlantError::config(
                "primary_clarifier",
                format!("volume must be positive, got {volume}"),
            ));
        }
        if !(params.f_ps > 0.0 && params.f_ps < 1.0) {
            return Err(PlantError::config(
                "primary_clarifier",
                "sludge flow fraction must lie in (0, 1)",
            ));
        }
        if params.t_m <= 0.0 {
            return Err(PlantError::config(
                "primary_clarifier",
                "flow lag time constant must be positive",
            ));
        }
        Ok(PrimaryClarifier {
            volume,
            params,
            state: SVector::from_column_slice(initial.as_array()),
        })
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Advances the clarifier over `[t, t + dt]`.
    pub fn step(&mut self, t: f64, dt: f64, feed: &Stream) -> Result<PrimaryClarifierOutput> {
        self.state[asm::TEMP] = feed.temperature();

        let ode = ClarifierOde {
            feed: *feed.as_array(),
            volume: self.volume,
            params: &self.params,
        };
        self.state = integrate::advance(&ode, self.state, t, dt, Method::Dopri5, "primary_clarifier")?;

        let p = &self.params;
        let q_in = feed.flow();
        let q_under = p.f_ps * q_in;
        // Thickening factor of the sludge stream.
        let enrichment = q_in / q_under;

        // COD removal from the Otterpohl correlation, driven by the
        // smoothed hydraulic retention time in minutes.
        let retention = self.volume / (self.state[asm::Q] + 0.001);
        let n_cod = p.f_corr
            * (2.88 * p.f_x - 0.118)
            * (1.45 + 6.15 * (retention * 24.0 * 60.0).ln());
        let n_x = (n_cod / p.f_x).clamp(0.0, 100.0);

        let mut overflow = Stream::zeros();
        let mut underflow = Stream::zeros();
        for i in 0..21 {
            let ff = 1.0 - PARTICULATE[i] * n_x / 100.0;
            overflow[i] = (ff * self.state[i]).max(0.0);
            underflow[i] = (((1.0 - ff) * enrichment + ff) * self.state[i]).max(0.0);
        }
        overflow.update_tss(&p.tss_fractions);
        underflow.update_tss(&p.tss_fractions);
        overflow[asm::Q] = q_in - q_under;
        underflow[asm::Q] = q_under;
        overflow[asm::TEMP] = feed.temperature();
        underflow[asm::TEMP] = feed.temperature();

        let mut internal = Stream::zeros();
        internal.0.copy_from_slice(self.state.as_slice());
        internal.update_tss(&p.tss_fractions);
        internal[asm::Q] = q_in;
        internal[asm::TEMP] = feed.temperature();

        Ok(PrimaryClarifierOutput {
            underflow,
            overflow,
            internal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// BSM2 steady-state clarifier contents.
    fn clarifier_init() -> Stream {
        Stream([
            28.067, 59.0473, 94.3557, 356.8434, 50.8946, 0.0946, 0.6531, 0.0175, 0.1174, 34.9215,
            5.5457, 15.8132, 7.6965, 377.1311, 21086.0, 14.8581, 0.0, 0.0, 0.0, 0.0, 0.0,
        ])
    }

    fn raw_feed() -> Stream {
        let mut s = clarifier_init();
        s[asm::Q] = 21_086.0;
        s
    }

    #[test]
    fn test_flow_balance() {
        let mut unit =
            PrimaryClarifier::new(900.0, clarifier_init(), PrimaryClarifierParams::bsm2()).unwrap();
        let feed = raw_feed();
        let out = unit.step(0.0, 1.0 / 96.0, &feed).unwrap();
        let q_total = out.overflow.flow() + out.underflow.flow();
        assert!((q_total - feed.flow()).abs() < 1e-6 * feed.flow());
        assert!((out.underflow.flow() - 0.007 * feed.flow()).abs() < 1e-9);
    }

    #[test]
    fn test_particulates_concentrate_in_underflow() {
        let mut unit =
            PrimaryClarifier::new(900.0, clarifier_init(), PrimaryClarifierParams::bsm2()).unwrap();
        let out = unit.step(0.0, 1.0 / 96.0, &raw_feed()).unwrap();
        assert!(out.underflow[asm::XS] > out.overflow[asm::XS]);
        assert!(out.underflow.tss() > out.overflow.tss());
        // Solubles pass largely unchanged.
        assert!((out.overflow[asm::SI] - out.underflow[asm::SI]).abs() < 1e-9);
    }

    #[test]
    fn test_particulate_mass_is_conserved() {
        let mut unit =
            PrimaryClarifier::new(900.0, clarifier_init(), PrimaryClarifierParams::bsm2()).unwrap();
        // Step at steady feed so the tank state barely moves; the
        // split itself must then conserve mass of each particulate.
        let feed = raw_feed();
        let out = unit.step(0.0, 1e-3, &feed).unwrap();
        for idx in [asm::XI, asm::XS, asm::XBH, asm::XND] {
            let load_out = out.overflow[idx] * out.overflow.flow()
                + out.underflow[idx] * out.underflow.flow();
            let load_state = out.internal[idx] * feed.flow();
            assert!(
                (load_out - load_state).abs() < 1e-6 * load_state.max(1.0),
                "field {idx}: {load_out} vs {load_state}"
            );
        }
    }

    #[test]
    fn test_temperature_follows_feed() {
        let mut unit =
            PrimaryClarifier::new(900.0, clarifier_init(), PrimaryClarifierParams::bsm2()).unwrap();
        let mut feed = raw_feed();
        feed[asm::TEMP] = 11.2;
        let out = unit.step(0.0, 1.0 / 96.0, &feed).unwrap();
        assert_eq!(out.overflow.temperature(), 11.2);
        assert_eq!(out.underflow.temperature(), 11.2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let p = PrimaryClarifierParams::bsm2();
        assert!(PrimaryClarifier::new(0.0, Stream::zeros(), p).is_err());
        let mut bad = p;
        bad.f_ps = 0.0;
        assert!(PrimaryClarifier::new(900.0, Stream::zeros(), bad).is_err());
        let mut bad = p;
        bad.t_m = -1.0;
        assert!(PrimaryClarifier::new(900.0, Stream::zeros(), bad).is_err());
    }
}
