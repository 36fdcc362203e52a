//! Stream data model shared by all plant units.
//!
//! Every liquid-side connection in the plant carries a fixed-width
//! 21-field vector in the ASM1 layout: 13 ASM1 state concentrations,
//! total suspended solids, flow rate, temperature and five dummy
//! states reserved for future model extensions. The anaerobic digester
//! internally uses the larger ADM1 layout (see [`DigesterStream`]);
//! the digester performs the explicit format conversion on entry and
//! exit.
//!
//! Concentrations are g/m3 (COD-based where applicable), flow is
//! m3/d, temperature is deg C.

use std::ops::{Index, IndexMut};

/// Field indices of the ASM1 stream layout.
pub mod asm {
    /// Soluble inert organic matter.
    pub const SI: usize = 0;
    /// Readily biodegradable substrate.
    pub const SS: usize = 1;
    /// Particulate inert organic matter.
    pub const XI: usize = 2;
    /// Slowly biodegradable substrate.
    pub const XS: usize = 3;
    /// Active heterotrophic biomass.
    pub const XBH: usize = 4;
    /// Active autotrophic biomass.
    pub const XBA: usize = 5;
    /// Particulate decay products.
    pub const XP: usize = 6;
    /// Dissolved oxygen.
    pub const SO: usize = 7;
    /// Nitrate and nitrite nitrogen.
    pub const SNO: usize = 8;
    /// Ammonium nitrogen.
    pub const SNH: usize = 9;
    /// Soluble biodegradable organic nitrogen.
    pub const SND: usize = 10;
    /// Particulate biodegradable organic nitrogen.
    pub const XND: usize = 11;
    /// Alkalinity.
    pub const SALK: usize = 12;
    /// Total suspended solids.
    pub const TSS: usize = 13;
    /// Flow rate.
    pub const Q: usize = 14;
    /// Temperature.
    pub const TEMP: usize = 15;
    /// Soluble dummy states.
    pub const SD1: usize = 16;
    pub const SD2: usize = 17;
    pub const SD3: usize = 18;
    /// Particulate dummy states.
    pub const XD4: usize = 19;
    pub const XD5: usize = 20;
}

/// Field indices of the 51-field digester output layout.
///
/// Fields 0..26 are the 26 ADM1 state concentrations (kg COD/m3 and
/// kmol/m3), followed by flow, temperature, dummy states, the pH
/// block with dissolved acid-base species, and the gas phase.
pub mod adm {
    pub const S_SU: usize = 0;
    pub const S_AA: usize = 1;
    pub const S_FA: usize = 2;
    pub const S_VA: usize = 3;
    pub const S_BU: usize = 4;
    pub const S_PRO: usize = 5;
    pub const S_AC: usize = 6;
    pub const S_H2: usize = 7;
    pub const S_CH4: usize = 8;
    pub const S_IC: usize = 9;
    pub const S_IN: usize = 10;
    pub const S_I: usize = 11;
    pub const X_XC: usize = 12;
    pub const X_CH: usize = 13;
    pub const X_PR: usize = 14;
    pub const X_LI: usize = 15;
    pub const X_SU: usize = 16;
    pub const X_AA: usize = 17;
    pub const X_FA: usize = 18;
    pub const X_C4: usize = 19;
    pub const X_PRO: usize = 20;
    pub const X_AC: usize = 21;
    pub const X_H2: usize = 22;
    pub const X_I: usize = 23;
    pub const S_CAT: usize = 24;
    pub const S_AN: usize = 25;
    pub const Q: usize = 26;
    pub const TEMP: usize = 27;
    pub const SD1: usize = 28;
    pub const SD2: usize = 29;
    pub const SD3: usize = 30;
    pub const XD4: usize = 31;
    pub const XD5: usize = 32;
    pub const PH: usize = 33;
    pub const S_H_ION: usize = 34;
    pub const S_HVA: usize = 35;
    pub const S_HBU: usize = 36;
    pub const S_HPRO: usize = 37;
    pub const S_HAC: usize = 38;
    pub const S_HCO3: usize = 39;
    pub const S_CO2: usize = 40;
    pub const S_NH3: usize = 41;
    pub const S_NH4: usize = 42;
    pub const S_GAS_H2: usize = 43;
    pub const S_GAS_CH4: usize = 44;
    pub const S_GAS_CO2: usize = 45;
    pub const P_GAS_H2: usize = 46;
    pub const P_GAS_CH4: usize = 47;
    pub const P_GAS_CO2: usize = 48;
    pub const P_GAS: usize = 49;
    pub const Q_GAS: usize = 50;
}

/// One wastewater/sludge flow at one instant, in the ASM1 layout.
///
/// # Examples
///
/// ```
/// use bsm2_core::stream::{asm, Stream};
///
/// let mut s = Stream::zeros();
/// s[asm::Q] = 20648.0;
/// s[asm::TEMP] = 15.0;
/// assert_eq!(s.flow(), 20648.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stream(pub [f64; 21]);

impl Stream {
    pub const LEN: usize = 21;

    /// An all-zero stream (zero flow, zero concentrations).
    pub fn zeros() -> Self {
        Stream([0.0; 21])
    }

    /// Flow rate in m3/d.
    pub fn flow(&self) -> f64 {
        self.0[asm::Q]
    }

    /// Temperature in deg C.
    pub fn temperature(&self) -> f64 {
        self.0[asm::TEMP]
    }

    /// Total suspended solids in g/m3.
    pub fn tss(&self) -> f64 {
        self.0[asm::TSS]
    }

    pub fn is_zero_flow(&self) -> bool {
        self.0[asm::Q] <= 0.0
    }

    /// True if every field is a finite number.
    pub fn all_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Largest absolute field-wise difference to another stream.
    pub fn max_abs_diff(&self, other: &Stream) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Recomputes the TSS field from the particulate fractions.
    ///
    /// `fractions` are the TSS conversion factors for XI, XS, XBH,
    /// XBA and XP (0.75 each in BSM2).
    pub fn update_tss(&mut self, fractions: &[f64; 5]) {
        self.0[asm::TSS] = fractions[0] * self.0[asm::XI]
            + fractions[1] * self.0[asm::XS]
            + fractions[2] * self.0[asm::XBH]
            + fractions[3] * self.0[asm::XBA]
            + fractions[4] * self.0[asm::XP];
    }

    pub fn as_array(&self) -> &[f64; 21] {
        &self.0
    }
}

impl Index<usize> for Stream {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl IndexMut<usize> for Stream {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.0[i]
    }
}

impl From<[f64; 21]> for Stream {
    fn from(fields: [f64; 21]) -> Self {
        Stream(fields)
    }
}

/// Digester-side stream in the 51-field ADM1 layout, including the
/// dissolved acid-base species and the gas phase. Produced by the
/// digester as a diagnostic readout; consumed only by the performance
/// evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigesterStream(pub [f64; 51]);

impl DigesterStream {
    pub const LEN: usize = 51;

    pub fn zeros() -> Self {
        DigesterStream([0.0; 51])
    }

    /// Normalized gas flow at atmospheric pressure, m3/d.
    pub fn gas_flow(&self) -> f64 {
        self.0[adm::Q_GAS]
    }

    /// Digester pH.
    pub fn ph(&self) -> f64 {
        self.0[adm::PH]
    }

    pub fn all_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Default for DigesterStream {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Index<usize> for DigesterStream {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl IndexMut<usize> for DigesterStream {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.0[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_stream() {
        let s = Stream::zeros();
        assert!(s.is_zero_flow());
        assert!(s.all_finite());
        assert_eq!(s.flow(), 0.0);
    }

    #[test]
    fn test_indexing() {
        let mut s = Stream::zeros();
        s[asm::SNH] = 31.56;
        s[asm::Q] = 20648.0;
        assert_eq!(s[asm::SNH], 31.56);
        assert_eq!(s.flow(), 20648.0);
        assert!(!s.is_zero_flow());
    }

    #[test]
    fn test_update_tss() {
        let mut s = Stream::zeros();
        s[asm::XI] = 100.0;
        s[asm::XS] = 200.0;
        s[asm::XBH] = 300.0;
        s.update_tss(&[0.75; 5]);
        assert!((s.tss() - 450.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_abs_diff() {
        let mut a = Stream::zeros();
        let mut b = Stream::zeros();
        a[asm::SS] = 5.0;
        b[asm::SS] = 3.0;
        b[asm::SNO] = 0.5;
        assert!((a.max_abs_diff(&b) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_detection() {
        let mut s = Stream::zeros();
        s[asm::SO] = f64::NAN;
        assert!(!s.all_finite());
    }
}
