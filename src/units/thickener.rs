//! Gravity thickener (ideal, flow-independent separation).
//!
//! The thickener concentrates waste sludge to a target solids
//! percentage at a fixed solids removal efficiency, with no hold-up
//! and no reaction. Soluble concentrations pass through unchanged on
//! both sides; only the particulate fractions and the flow split
//! move.

use crate::error::{PlantError, Result};
use crate::stream::{asm, Stream};

/// Stream fields that follow the solids split.
pub(crate) const PARTICULATE_FIELDS: [usize; 8] = [
    asm::XI,
    asm::XS,
    asm::XBH,
    asm::XBA,
    asm::XP,
    asm::XND,
    asm::XD4,
    asm::XD5,
];

/// Ideal thickener.
///
/// # Examples
///
/// ```
/// use bsm2_core::stream::{asm, Stream};
/// use bsm2_core::units::Thickener;
///
/// let mut feed = Stream::zeros();
/// feed[asm::XS] = 200.0;
/// feed[asm::XI] = 300.0;
/// feed[asm::Q] = 300.0;
/// feed.update_tss(&[0.75; 5]);
///
/// let thickener = Thickener::new(7.0, 98.0, [0.75; 5]).unwrap();
/// let [under, over] = thickener.separate(&feed);
/// assert!(under.tss() > feed.tss());
/// assert!(over.tss() < feed.tss());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Thickener {
    /// Target solids content of the thickened sludge, % TSS.
    target_percent: f64,
    /// Solids capture efficiency, %.
    removal_percent: f64,
    tss_fractions: [f64; 5],
}

impl Thickener {
    pub fn new(target_percent: f64, removal_percent: f64, tss_fractions: [f64; 5]) -> Result<Self> {
        if !(target_percent > 0.0 && target_percent < 100.0) {
            return Err(PlantError::config(
                "thickener",
                format!("target solids percentage must lie in (0, 100), got {target_percent}"),
            ));
        }
        if !(removal_percent > 0.0 && removal_percent <= 100.0) {
            return Err(PlantError::config(
                "thickener",
                format!("solids removal percentage must lie in (0, 100], got {removal_percent}"),
            ));
        }
        Ok(Thickener {
            target_percent,
            removal_percent,
            tss_fractions,
        })
    }

    /// The BSM2 thickener: 7 % solids at 98 % capture.
    pub fn bsm2() -> Self {
        Thickener {
            target_percent: 7.0,
            removal_percent: 98.0,
            tss_fractions: [0.75; 5],
        }
    }

    /// Splits the feed into `[underflow, overflow]`.
    ///
    /// If the feed is already at or above the target solids content
    /// the whole feed leaves as underflow and the overflow is a
    /// zero-flow stream.
    pub fn separate(&self, feed: &Stream) -> [Stream; 2] {
        separate_ideal(
            feed,
            self.target_percent,
            self.removal_percent,
            &self.tss_fractions,
        )
    }
}

/// Shared ideal-separation arithmetic for thickening and dewatering.
pub(crate) fn separate_ideal(
    feed: &Stream,
    target_percent: f64,
    removal_percent: f64,
    tss_fractions: &[f64; 5],
) -> [Stream; 2] {
    let tss_in = tss_fractions[0] * feed[asm::XI]
        + tss_fractions[1] * feed[asm::XS]
        + tss_fractions[2] * feed[asm::XBH]
        + tss_fractions[3] * feed[asm::XBA]
        + tss_fractions[4] * feed[asm::XP];

    // 1 % solids is 10000 g/m3.
    let thickening = target_percent * 10_000.0 / tss_in;
    if !(thickening > 1.0) {
        // Feed already thicker than the target: pass it through.
        return [*feed, Stream::zeros()];
    }

    let q_under_fraction = removal_percent / (100.0 * thickening);
    let thinning = (1.0 - removal_percent / 100.0) / (1.0 - q_under_fraction);

    let mut underflow = *feed;
    let mut overflow = *feed;
    for field in PARTICULATE_FIELDS {
        underflow[field] = feed[field] * thickening;
        overflow[field] = feed[field] * thinning;
    }
    underflow[asm::TSS] = tss_in * thickening;
    overflow[asm::TSS] = tss_in * thinning;
    underflow[asm::Q] = feed.flow() * q_under_fraction;
    overflow[asm::Q] = feed.flow() * (1.0 - q_under_fraction);
    [underflow, overflow]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Waste sludge in the BSM2 range.
    fn waste_sludge() -> Stream {
        let mut s = Stream::zeros();
        s[asm::SI] = 28.0;
        s[asm::SS] = 0.67;
        s[asm::XI] = 1_532.0;
        s[asm::XS] = 19.0;
        s[asm::XBH] = 2_245.0;
        s[asm::XBA] = 167.0;
        s[asm::XP] = 965.0;
        s[asm::SNH] = 0.16;
        s[asm::XND] = 0.013;
        s[asm::Q] = 300.0;
        s[asm::TEMP] = 14.8581;
        s.update_tss(&[0.75; 5]);
        s
    }

    #[test]
    fn test_underflow_hits_target_solids() {
        let feed = waste_sludge();
        let [under, _] = Thickener::bsm2().separate(&feed);
        assert!((under.tss() - 70_000.0).abs() < 1e-6 * 70_000.0);
    }

    #[test]
    fn test_mass_balance() {
        let feed = waste_sludge();
        let [under, over] = Thickener::bsm2().separate(&feed);
        assert!((under.flow() + over.flow() - feed.flow()).abs() < 1e-9 * feed.flow());
        for field in PARTICULATE_FIELDS {
            let load_in = feed[field] * feed.flow();
            let load_out = under[field] * under.flow() + over[field] * over.flow();
            assert!(
                (load_in - load_out).abs() < 1e-9 * load_in.max(1.0),
                "field {field}"
            );
        }
    }

    #[test]
    fn test_solubles_untouched() {
        let feed = waste_sludge();
        let [under, over] = Thickener::bsm2().separate(&feed);
        assert_eq!(under[asm::SI], feed[asm::SI]);
        assert_eq!(over[asm::SI], feed[asm::SI]);
        assert_eq!(under[asm::SNH], feed[asm::SNH]);
        assert_eq!(under.temperature(), feed.temperature());
    }

    #[test]
    fn test_capture_efficiency() {
        let feed = waste_sludge();
        let [under, _] = Thickener::bsm2().separate(&feed);
        let captured = under.tss() * under.flow();
        let fed = feed.tss() * feed.flow();
        assert!((captured / fed - 0.98).abs() < 1e-9);
    }

    #[test]
    fn test_thick_feed_passes_through() {
        let mut feed = waste_sludge();
        feed[asm::XI] = 100_000.0;
        feed.update_tss(&[0.75; 5]);
        let [under, over] = Thickener::bsm2().separate(&feed);
        assert_eq!(under, feed);
        assert!(over.is_zero_flow());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Thickener::new(0.0, 98.0, [0.75; 5]).is_err());
        assert!(Thickener::new(100.0, 98.0, [0.75; 5]).is_err());
        assert!(Thickener::new(7.0, 0.0, [0.75; 5]).is_err());
        assert!(Thickener::new(7.0, 101.0, [0.75; 5]).is_err());
    }
}
