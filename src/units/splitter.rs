//! Flow splitter with ratio and threshold variants.
//!
//! A splitter takes one stream and produces two, partitioning flow
//! while leaving concentrations untouched. The ratio variant routes
//! fixed fractions of the inflow to each outlet; the threshold
//! variant fills the primary outlet up to a configured flow and
//! routes only the excess to the secondary outlet. Splitters are
//! stateless: identical inputs always produce identical outputs.

use crate::error::{PlantError, Result};
use crate::stream::{asm, Stream};

/// Flow partitioning rule of a [`Splitter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitMode {
    /// Fixed flow fractions per outlet, normalized by their sum.
    Ratio { fractions: [f64; 2] },
    /// Primary outlet carries at most `q_max`; excess goes to the
    /// secondary outlet.
    Threshold { q_max: f64 },
}

/// One-inlet, two-outlet flow splitter.
///
/// # Examples
///
/// ```
/// use bsm2_core::stream::{asm, Stream};
/// use bsm2_core::units::Splitter;
///
/// let mut feed = Stream::zeros();
/// feed[asm::Q] = 20_000.0;
/// feed[asm::SNH] = 30.0;
///
/// let splitter = Splitter::ratio(0.9, 0.1).unwrap();
/// let [a, b] = splitter.split(&feed);
/// assert!((a.flow() - 18_000.0).abs() < 1e-9);
/// assert!((b.flow() - 2_000.0).abs() < 1e-9);
/// assert_eq!(a[asm::SNH], 30.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    mode: SplitMode,
}

impl Splitter {
    /// Creates a ratio splitter with the given outlet fractions.
    ///
    /// Fractions may be given unnormalized; they are scaled by their
    /// sum. Both must be non-negative and at least one positive.
    pub fn ratio(first: f64, second: f64) -> Result<Self> {
        if !(first.is_finite() && second.is_finite()) || first < 0.0 || second < 0.0 {
            return Err(PlantError::config(
                "splitter",
                format!("split fractions must be non-negative, got ({first}, {second})"),
            ));
        }
        if first + second <= 0.0 {
            return Err(PlantError::config(
                "splitter",
                "split fractions must not both be zero",
            ));
        }
        Ok(Splitter {
            mode: SplitMode::Ratio {
                fractions: [first, second],
            },
        })
    }

    /// Creates a threshold splitter that caps the primary outlet at
    /// `q_max` m3/d.
    pub fn threshold(q_max: f64) -> Result<Self> {
        if !q_max.is_finite() || q_max < 0.0 {
            return Err(PlantError::config(
                "splitter",
                format!("flow threshold must be non-negative, got {q_max}"),
            ));
        }
        Ok(Splitter {
            mode: SplitMode::Threshold { q_max },
        })
    }

    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    /// Splits the inflow into two outlet streams.
    ///
    /// Outlet flows always sum to the inflow. A zero-flow outlet is a
    /// full-width stream with flow and concentrations zeroed, never a
    /// missing stream.
    pub fn split(&self, inflow: &Stream) -> [Stream; 2] {
        let q_in = inflow.flow();
        let flows = match self.mode {
            SplitMode::Ratio { fractions } => {
                let total = fractions[0] + fractions[1];
                [q_in * fractions[0] / total, q_in * fractions[1] / total]
            }
            SplitMode::Threshold { q_max } => {
                if q_in >= q_max {
                    [q_max, q_in - q_max]
                } else {
                    [q_in, 0.0]
                }
            }
        };

        let mut outputs = [Stream::zeros(), Stream::zeros()];
        for (out, q) in outputs.iter_mut().zip(flows) {
            if q > 0.0 {
                *out = *inflow;
                out[asm::Q] = q;
            }
        }
        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(q: f64) -> Stream {
        let mut s = Stream::zeros();
        s[asm::Q] = q;
        s[asm::SI] = 30.0;
        s[asm::SNH] = 25.0;
        s[asm::TSS] = 380.0;
        s[asm::TEMP] = 15.0;
        s
    }

    #[test]
    fn test_ratio_split_scenario() {
        // 20000 m3/d at 0.9/0.1 must yield 18000 and 2000 with
        // untouched concentrations.
        let splitter = Splitter::ratio(0.9, 0.1).unwrap();
        let [a, b] = splitter.split(&feed(20_000.0));
        assert!((a.flow() - 18_000.0).abs() < 1e-9);
        assert!((b.flow() - 2_000.0).abs() < 1e-9);
        assert_eq!(a[asm::SNH], 25.0);
        assert_eq!(b[asm::SNH], 25.0);
        assert_eq!(a[asm::TSS], b[asm::TSS]);
    }

    #[test]
    fn test_ratio_normalization() {
        let splitter = Splitter::ratio(3.0, 1.0).unwrap();
        let [a, b] = splitter.split(&feed(8_000.0));
        assert!((a.flow() - 6_000.0).abs() < 1e-9);
        assert!((b.flow() - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_below_capacity() {
        let splitter = Splitter::threshold(60_000.0).unwrap();
        let [a, b] = splitter.split(&feed(20_648.0));
        assert!((a.flow() - 20_648.0).abs() < 1e-9);
        assert_eq!(b.flow(), 0.0);
        // Secondary is a full-width zero stream, not a truncated one.
        assert_eq!(b[asm::SNH], 0.0);
    }

    #[test]
    fn test_threshold_above_capacity() {
        let splitter = Splitter::threshold(60_000.0).unwrap();
        let [a, b] = splitter.split(&feed(75_000.0));
        assert!((a.flow() - 60_000.0).abs() < 1e-9);
        assert!((b.flow() - 15_000.0).abs() < 1e-9);
        assert_eq!(b[asm::SNH], 25.0);
    }

    #[test]
    fn test_zero_inflow() {
        let splitter = Splitter::ratio(0.5, 0.5).unwrap();
        let [a, b] = splitter.split(&feed(0.0));
        assert_eq!(a.flow(), 0.0);
        assert_eq!(b.flow(), 0.0);
        assert!(a.all_finite() && b.all_finite());
    }

    #[test]
    fn test_idempotence() {
        let splitter = Splitter::ratio(0.7, 0.3).unwrap();
        let first = splitter.split(&feed(12_345.6));
        let second = splitter.split(&feed(12_345.6));
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_configurations() {
        assert!(Splitter::ratio(-0.1, 1.1).is_err());
        assert!(Splitter::ratio(0.0, 0.0).is_err());
        assert!(Splitter::ratio(f64::NAN, 0.5).is_err());
        assert!(Splitter::threshold(-1.0).is_err());
    }

    proptest! {
        #[test]
        fn prop_ratio_split_conserves_flow(
            q in 0.0..1.0e6f64,
            f0 in 0.0..1.0f64,
        ) {
            prop_assume!(f0 > 1e-12 || (1.0 - f0) > 1e-12);
            let splitter = Splitter::ratio(f0, 1.0 - f0).unwrap();
            let [a, b] = splitter.split(&feed(q));
            prop_assert!((a.flow() + b.flow() - q).abs() <= 1e-9 * q.max(1.0));
        }

        #[test]
        fn prop_threshold_split_conserves_flow(
            q in 0.0..1.0e6f64,
            q_max in 0.0..1.0e6f64,
        ) {
            let splitter = Splitter::threshold(q_max).unwrap();
            let [a, b] = splitter.split(&feed(q));
            prop_assert!((a.flow() + b.flow() - q).abs() <= 1e-9 * q.max(1.0));
            prop_assert!(a.flow() <= q_max + 1e-9);
        }
    }
}
