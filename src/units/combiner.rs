//! Flow-weighted stream mixing.
//!
//! A combiner merges any number of inlet streams into one: the outlet
//! flow is the sum of inlet flows and every other field is the
//! flow-weighted average of the inlet fields (temperature included).
//! Mixing is mass-conservative and stateless.

use crate::stream::{asm, Stream};

/// N-inlet, one-outlet mixing junction.
///
/// # Examples
///
/// ```
/// use bsm2_core::stream::{asm, Stream};
/// use bsm2_core::units::Combiner;
///
/// let mut a = Stream::zeros();
/// a[asm::Q] = 1_000.0;
/// a[asm::SNH] = 10.0;
/// let mut b = Stream::zeros();
/// b[asm::Q] = 3_000.0;
/// b[asm::SNH] = 30.0;
///
/// let mixed = Combiner.combine(&[a, b]);
/// assert!((mixed.flow() - 4_000.0).abs() < 1e-9);
/// assert!((mixed[asm::SNH] - 25.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Combiner;

impl Combiner {
    /// Mixes the given inlet streams.
    ///
    /// Zero-flow inlets contribute nothing. An all-zero total flow
    /// yields an all-zero stream rather than dividing by zero.
    pub fn combine(&self, inputs: &[Stream]) -> Stream {
        let q_total: f64 = inputs.iter().map(Stream::flow).filter(|q| *q > 0.0).sum();

        let mut out = Stream::zeros();
        if q_total <= 0.0 {
            return out;
        }

        for input in inputs.iter().filter(|s| s.flow() > 0.0) {
            let weight = input.flow() / q_total;
            for field in 0..Stream::LEN {
                if field != asm::Q {
                    out[field] += weight * input[field];
                }
            }
        }
        out[asm::Q] = q_total;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stream(q: f64, snh: f64, temp: f64) -> Stream {
        let mut s = Stream::zeros();
        s[asm::Q] = q;
        s[asm::SNH] = snh;
        s[asm::TEMP] = temp;
        s
    }

    #[test]
    fn test_two_stream_scenario() {
        // 1000 m3/d at 10 plus 3000 m3/d at 30 mixes to 4000 at 25.
        let mixed = Combiner.combine(&[stream(1_000.0, 10.0, 15.0), stream(3_000.0, 30.0, 15.0)]);
        assert!((mixed.flow() - 4_000.0).abs() < 1e-9);
        assert!((mixed[asm::SNH] - 25.0).abs() < 1e-9);
        assert!((mixed.temperature() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_temperature_is_flow_weighted() {
        let mixed = Combiner.combine(&[stream(500.0, 0.0, 10.0), stream(1_500.0, 0.0, 20.0)]);
        assert!((mixed.temperature() - 17.5).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_flow_is_finite() {
        let mixed = Combiner.combine(&[stream(0.0, 50.0, 15.0), stream(0.0, 80.0, 15.0)]);
        assert_eq!(mixed.flow(), 0.0);
        assert!(mixed.all_finite());
        assert_eq!(mixed[asm::SNH], 0.0);
    }

    #[test]
    fn test_zero_flow_inlet_is_ignored() {
        let mixed = Combiner.combine(&[stream(2_000.0, 12.0, 15.0), stream(0.0, 999.0, 99.0)]);
        assert!((mixed[asm::SNH] - 12.0).abs() < 1e-9);
        assert!((mixed.flow() - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_five_inlets() {
        let inputs: Vec<Stream> = (1..=5).map(|i| stream(1_000.0, i as f64, 15.0)).collect();
        let mixed = Combiner.combine(&inputs);
        assert!((mixed.flow() - 5_000.0).abs() < 1e-9);
        assert!((mixed[asm::SNH] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_idempotence() {
        let inputs = [stream(1_234.5, 6.7, 14.8), stream(890.1, 2.3, 15.2)];
        assert_eq!(Combiner.combine(&inputs), Combiner.combine(&inputs));
    }

    proptest! {
        #[test]
        fn prop_flow_is_conserved(
            q1 in 0.0..1.0e5f64,
            q2 in 0.0..1.0e5f64,
            q3 in 0.0..1.0e5f64,
        ) {
            let mixed = Combiner.combine(&[
                stream(q1, 1.0, 15.0),
                stream(q2, 2.0, 15.0),
                stream(q3, 3.0, 15.0),
            ]);
            prop_assert!((mixed.flow() - (q1 + q2 + q3)).abs() <= 1e-9 * (q1 + q2 + q3).max(1.0));
        }

        #[test]
        fn prop_concentration_within_hull(
            q1 in 1.0..1.0e5f64,
            q2 in 1.0..1.0e5f64,
            c1 in 0.0..500.0f64,
            c2 in 0.0..500.0f64,
        ) {
            let mixed = Combiner.combine(&[stream(q1, c1, 15.0), stream(q2, c2, 15.0)]);
            let lo = c1.min(c2) - 1e-9;
            let hi = c1.max(c2) + 1e-9;
            prop_assert!(mixed[asm::SNH] >= lo && mixed[asm::SNH] <= hi);
        }
    }
}
