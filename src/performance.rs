//! Plant performance assessment.
//!
//! Effluent quality, energy demands, sludge production, gas
//! production and the operational cost index, evaluated per step from
//! the plant's streams and actuator values. All formulas follow the
//! BSM2 evaluation protocol.

use crate::stream::{adm, asm, DigesterStream, Stream};

/// Gas constant used for the gas mass conversions, kJ/(mole K).
const R_GAS: f64 = 0.0831;
/// Atmospheric pressure, bar.
const P_ATM: f64 = 1.013;
/// Density of water, kg/m3.
const RHO_WATER: f64 = 1000.0;
/// Specific heat capacity of water, kJ/(kg K).
const CP_WATER: f64 = 4.186;

/// Effluent limits, quality weights and energy factors.
#[derive(Debug, Clone, Copy)]
pub struct PerfParams {
    /// Effluent ammonia limit, g N/m3.
    pub snh_limit: f64,
    /// Effluent total nitrogen limit, g N/m3.
    pub tn_limit: f64,
    /// Effluent COD limit, g COD/m3.
    pub cod_limit: f64,
    /// Effluent solids limit, g/m3.
    pub tss_limit: f64,
    /// Effluent BOD5 limit, g/m3.
    pub bod5_limit: f64,
    /// Quality index weights for TSS, COD, Kjeldahl N, nitrate, BOD5.
    pub quality_weights: [f64; 5],
    /// Pumping energy factors, kWh/m3, for internal recycle, return
    /// sludge, wastage, primary underflow, thickener underflow and
    /// dewatering sludge.
    pub pump_factors: [f64; 6],
    /// Mixing power per reactor volume when aeration is off, kW/m3.
    pub me_reactor: f64,
    /// Mixing power per digester volume, kW/m3.
    pub me_digester: f64,
    /// KLa below which a reactor counts as unaerated, 1/d.
    pub kla_mixing_limit: f64,
    /// N content of biomass, g N/g COD.
    pub i_xb: f64,
    /// N content of particulate products, g N/g COD.
    pub i_xp: f64,
    /// Fraction of biomass yielding particulate products.
    pub f_p: f64,
}

impl PerfParams {
    /// The BSM2 evaluation parameter set.
    pub fn bsm2() -> Self {
        PerfParams {
            snh_limit: 4.0,
            tn_limit: 18.0,
            cod_limit: 100.0,
            tss_limit: 30.0,
            bod5_limit: 10.0,
            quality_weights: [2.0, 1.0, 30.0, 10.0, 2.0],
            pump_factors: [0.004, 0.008, 0.05, 0.075, 0.060, 0.004],
            me_reactor: 0.005,
            me_digester: 0.005,
            kla_mixing_limit: 20.0,
            i_xb: 0.08,
            i_xp: 0.06,
            f_p: 0.08,
        }
    }
}

/// Which effluent limits a sample exceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Violations {
    pub snh: bool,
    pub total_n: bool,
    pub cod: bool,
    pub tss: bool,
    pub bod5: bool,
}

impl Violations {
    pub fn any(&self) -> bool {
        self.snh || self.total_n || self.cod || self.tss || self.bod5
    }
}

/// Gas mass flows leaving the digester head space.
#[derive(Debug, Clone, Copy)]
pub struct GasProduction {
    /// Methane, kg/d.
    pub ch4: f64,
    /// Hydrogen, kg/d.
    pub h2: f64,
    /// Carbon dioxide, kg/d.
    pub co2: f64,
    /// Total gas flow at atmospheric pressure, m3/d.
    pub q_gas: f64,
}

/// Daily operating figures entering the cost index, energies in
/// kWh/d, masses in kg/d.
#[derive(Debug, Clone, Copy, Default)]
pub struct OciInputs {
    pub pumping_energy: f64,
    pub aeration_energy: f64,
    pub mixing_energy: f64,
    pub sludge_production: f64,
    pub added_carbon: f64,
    pub heating_energy: f64,
    pub methane_production: f64,
}

/// Performance evaluator.
#[derive(Debug, Clone, Copy)]
pub struct Performance {
    params: PerfParams,
}

impl Performance {
    pub fn new(params: PerfParams) -> Self {
        Performance { params }
    }

    pub fn bsm2() -> Self {
        Performance::new(PerfParams::bsm2())
    }

    pub fn params(&self) -> &PerfParams {
        &self.params
    }

    /// Kjeldahl nitrogen of a stream, g N/m3.
    pub fn kjeldahl_nitrogen(&self, s: &Stream) -> f64 {
        let p = &self.params;
        s[asm::SNH]
            + s[asm::SND]
            + s[asm::XND]
            + p.i_xb * (s[asm::XBH] + s[asm::XBA])
            + p.i_xp * (s[asm::XP] + s[asm::XI])
    }

    /// Total nitrogen of a stream, g N/m3.
    pub fn total_nitrogen(&self, s: &Stream) -> f64 {
        self.kjeldahl_nitrogen(s) + s[asm::SNO]
    }

    /// Total COD of a stream, g COD/m3.
    pub fn total_cod(&self, s: &Stream) -> f64 {
        s[asm::SS] + s[asm::SI] + s[asm::XS] + s[asm::XI] + s[asm::XBH] + s[asm::XBA] + s[asm::XP]
    }

    /// Five-day biological oxygen demand, g/m3.
    ///
    /// The effluent variant uses the reduced BOD factor of treated
    /// water.
    pub fn bod5(&self, s: &Stream, effluent: bool) -> f64 {
        let factor = if effluent { 0.25 } else { 0.65 };
        factor * (s[asm::SS] + s[asm::XS] + (1.0 - self.params.f_p) * (s[asm::XBH] + s[asm::XBA]))
    }

    /// Pollution quality index of a stream, kg pollution units/d.
    ///
    /// Applied to the influent this is the IQI, to the effluent the
    /// EQI.
    pub fn quality_index(&self, s: &Stream, effluent: bool) -> f64 {
        let [b_ss, b_cod, b_nkj, b_no, b_bod5] = self.params.quality_weights;
        (b_ss * s[asm::TSS]
            + b_cod * self.total_cod(s)
            + b_nkj * self.kjeldahl_nitrogen(s)
            + b_no * s[asm::SNO]
            + b_bod5 * self.bod5(s, effluent))
            * s.flow()
            / 1000.0
    }

    /// Effluent limit check for one sample.
    pub fn violations(&self, effluent: &Stream) -> Violations {
        let p = &self.params;
        Violations {
            snh: effluent[asm::SNH] > p.snh_limit,
            total_n: self.total_nitrogen(effluent) > p.tn_limit,
            cod: self.total_cod(effluent) > p.cod_limit,
            tss: effluent[asm::TSS] > p.tss_limit,
            bod5: self.bod5(effluent, true) > p.bod5_limit,
        }
    }

    /// Aeration power of the reactor line, kW.
    pub fn aeration_energy(&self, kla: &[f64], volumes: &[f64], so_sat: &[f64]) -> f64 {
        kla.iter()
            .zip(volumes)
            .zip(so_sat)
            .map(|((kla, vol), sat)| sat * vol * kla.max(0.0))
            .sum::<f64>()
            / (1.8 * 1000.0)
            / 24.0
    }

    /// Pumping power, kW. Flows ordered as
    /// [`PerfParams::pump_factors`].
    pub fn pumping_energy(&self, flows: &[f64; 6]) -> f64 {
        flows
            .iter()
            .zip(&self.params.pump_factors)
            .map(|(q, f)| q * f)
            .sum::<f64>()
            / 24.0
    }

    /// Mixing power of unaerated reactors plus the digester, kW.
    pub fn mixing_energy(&self, kla: &[f64], volumes: &[f64], digester_volume: f64) -> f64 {
        let p = &self.params;
        let reactors: f64 = kla
            .iter()
            .zip(volumes)
            .filter(|(kla, _)| **kla < p.kla_mixing_limit)
            .map(|(_, vol)| vol)
            .sum();
        p.me_reactor * reactors + p.me_digester * digester_volume
    }

    /// Power needed to heat the digester feed to the operating
    /// temperature, kW. `t_op` in K, the feed temperature in deg C.
    pub fn heat_demand(&self, digester_feed: &Stream, t_op: f64) -> f64 {
        let dt = t_op - (digester_feed.temperature() + 273.15);
        digester_feed.flow() / 86_400.0 * RHO_WATER * CP_WATER * dt
    }

    /// Gas mass flows from the digester head space state.
    pub fn gas_production(&self, digester: &DigesterStream, t_op: f64) -> GasProduction {
        let p_gas = digester[adm::P_GAS];
        let q_gas = digester.gas_flow();
        let mass = |p_partial: f64, molar_mass: f64| {
            p_partial / p_gas * P_ATM * molar_mass / (R_GAS * t_op) * q_gas
        };
        GasProduction {
            ch4: mass(digester[adm::P_GAS_CH4], 16.0),
            h2: mass(digester[adm::P_GAS_H2], 2.0),
            co2: mass(digester[adm::P_GAS_CO2], 44.0),
            q_gas,
        }
    }

    /// TSS inventory of a vessel, kg.
    pub fn tss_mass(&self, contents: &Stream, volume: f64) -> f64 {
        contents.tss() * volume / 1000.0
    }

    /// TSS mass flow of a stream, kg/d.
    pub fn tss_flow(&self, s: &Stream) -> f64 {
        s.tss() * s.flow() / 1000.0
    }

    /// Mass of dosed external carbon, kg COD/d.
    pub fn added_carbon_mass(&self, q_carbon: f64, concentration: f64) -> f64 {
        q_carbon * concentration / 1000.0
    }

    /// Operational cost index.
    ///
    /// Sludge disposal and carbon dosing are weighted cost factors,
    /// heating can be partly covered by methane, and surplus methane
    /// is credited.
    pub fn oci(&self, inputs: &OciInputs) -> f64 {
        3.0 * inputs.sludge_production
            + inputs.aeration_energy
            + inputs.mixing_energy
            + inputs.pumping_energy
            + 3.0 * inputs.added_carbon
            + (inputs.heating_energy - 7.0 * inputs.methane_production).max(0.0)
            - 6.0 * inputs.methane_production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effluent() -> Stream {
        let mut s = Stream::zeros();
        s[asm::SI] = 28.1;
        s[asm::SS] = 0.67;
        s[asm::XI] = 5.6;
        s[asm::XS] = 0.08;
        s[asm::XBH] = 8.2;
        s[asm::XBA] = 0.6;
        s[asm::XP] = 3.5;
        s[asm::SNO] = 9.2;
        s[asm::SNH] = 0.16;
        s[asm::SND] = 0.56;
        s[asm::XND] = 0.005;
        s[asm::TSS] = 13.5;
        s[asm::Q] = 18_061.0;
        s[asm::TEMP] = 14.86;
        s
    }

    #[test]
    fn test_nitrogen_aggregates() {
        let perf = Performance::bsm2();
        let e = effluent();
        let kj = perf.kjeldahl_nitrogen(&e);
        let expected = 0.16 + 0.56 + 0.005 + 0.08 * (8.2 + 0.6) + 0.06 * (3.5 + 5.6);
        assert!((kj - expected).abs() < 1e-12);
        assert!((perf.total_nitrogen(&e) - (kj + 9.2)).abs() < 1e-12);
    }

    #[test]
    fn test_quality_index_scales_with_flow() {
        let perf = Performance::bsm2();
        let e = effluent();
        let mut double = e;
        double[asm::Q] = 2.0 * e.flow();
        assert!((perf.quality_index(&double, true) - 2.0 * perf.quality_index(&e, true)).abs() < 1e-9);
    }

    #[test]
    fn test_effluent_bod_uses_reduced_factor() {
        let perf = Performance::bsm2();
        let e = effluent();
        assert!(perf.bod5(&e, true) < perf.bod5(&e, false));
        assert!((perf.bod5(&e, false) / perf.bod5(&e, true) - 0.65 / 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_clean_effluent_has_no_violations() {
        let perf = Performance::bsm2();
        assert!(!perf.violations(&effluent()).any());
    }

    #[test]
    fn test_violations_flag_each_limit() {
        let perf = Performance::bsm2();
        let mut bad = effluent();
        bad[asm::SNH] = 5.0;
        bad[asm::TSS] = 45.0;
        let v = perf.violations(&bad);
        assert!(v.snh);
        assert!(v.tss);
        assert!(!v.cod);
        assert!(v.any());
    }

    #[test]
    fn test_aeration_energy() {
        let perf = Performance::bsm2();
        let ae = perf.aeration_energy(
            &[0.0, 0.0, 120.0, 120.0, 60.0],
            &[1_500.0, 1_500.0, 3_000.0, 3_000.0, 3_000.0],
            &[8.0; 5],
        );
        let expected = (8.0 * 3_000.0 * 120.0 * 2.0 + 8.0 * 3_000.0 * 60.0) / 1_800.0 / 24.0;
        assert!((ae - expected).abs() < 1e-9);
    }

    #[test]
    fn test_mixing_energy_counts_unaerated_reactors() {
        let perf = Performance::bsm2();
        let me = perf.mixing_energy(
            &[0.0, 0.0, 120.0, 120.0, 60.0],
            &[1_500.0, 1_500.0, 3_000.0, 3_000.0, 3_000.0],
            3_400.0,
        );
        // Two anoxic tanks mixed, plus the digester.
        assert!((me - (0.005 * 3_000.0 + 0.005 * 3_400.0)).abs() < 1e-9);
    }

    #[test]
    fn test_pumping_energy() {
        let perf = Performance::bsm2();
        let pe = perf.pumping_energy(&[61_944.0, 20_648.0, 300.0, 147.0, 253.0, 178.0]);
        let expected = (61_944.0 * 0.004
            + 20_648.0 * 0.008
            + 300.0 * 0.05
            + 147.0 * 0.075
            + 253.0 * 0.060
            + 178.0 * 0.004)
            / 24.0;
        assert!((pe - expected).abs() < 1e-9);
    }

    #[test]
    fn test_heat_demand_sign() {
        let perf = Performance::bsm2();
        let mut sludge = Stream::zeros();
        sludge[asm::Q] = 178.0;
        sludge[asm::TEMP] = 14.86;
        // Heating cold sludge to 35 degC costs power.
        assert!(perf.heat_demand(&sludge, 308.15) > 0.0);
        // Sludge already above the digester temperature needs none.
        sludge[asm::TEMP] = 40.0;
        assert!(perf.heat_demand(&sludge, 308.15) < 0.0);
    }

    #[test]
    fn test_gas_production_partitions_total() {
        let perf = Performance::bsm2();
        let mut d = DigesterStream::zeros();
        d[adm::P_GAS_H2] = 1.0e-5;
        d[adm::P_GAS_CH4] = 0.65;
        d[adm::P_GAS_CO2] = 0.36;
        d[adm::P_GAS] = 1.069;
        d[adm::Q_GAS] = 2_708.0;
        let gas = perf.gas_production(&d, 308.15);
        assert!(gas.ch4 > 0.0 && gas.co2 > 0.0);
        assert!(gas.ch4 > gas.h2);
        assert!((gas.q_gas - 2_708.0).abs() < 1e-9);
    }

    #[test]
    fn test_oci_methane_credit() {
        let perf = Performance::bsm2();
        let base = OciInputs {
            pumping_energy: 500.0,
            aeration_energy: 4_000.0,
            mixing_energy: 800.0,
            sludge_production: 2_500.0,
            added_carbon: 800.0,
            heating_energy: 4_000.0,
            methane_production: 1_000.0,
        };
        // Methane fully covers the heating demand here.
        let oci = perf.oci(&base);
        let expected = 3.0 * 2_500.0 + 4_000.0 + 800.0 + 500.0 + 3.0 * 800.0 + 0.0 - 6_000.0;
        assert!((oci - expected).abs() < 1e-9);
        // Without methane the heating bill is paid in full.
        let no_gas = OciInputs {
            methane_production: 0.0,
            ..base
        };
        assert!(perf.oci(&no_gas) > oci);
    }
}
