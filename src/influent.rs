//! Influent sources.
//!
//! The plant is driven either by a constant influent (steady-state
//! work) or by a time-stamped record table (dynamic weather files).
//! Tables are validated once at load time; lookups afterwards cannot
//! fail. Between samples the influent holds the last record, which
//! matches the piecewise-constant file format the benchmark uses.

use crate::error::{PlantError, Result};
use crate::stream::{asm, Stream};

/// A validated influent source.
///
/// # Examples
///
/// ```
/// use bsm2_core::influent::Influent;
///
/// let influent = Influent::bsm2_constant();
/// let s = influent.at(1.5);
/// assert!((s.flow() - 18_446.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub enum Influent {
    /// The same stream at every time.
    Constant(Stream),
    /// Time-stamped records, held piecewise constant.
    Table {
        /// Sample times in days, strictly increasing.
        times: Vec<f64>,
        records: Vec<Stream>,
    },
}

fn validate_record(stream: &Stream, context: &str) -> Result<()> {
    if !stream.all_finite() {
        return Err(PlantError::Influent {
            reason: format!("{context}: non-finite concentration"),
        });
    }
    if stream.flow() < 0.0 {
        return Err(PlantError::Influent {
            reason: format!("{context}: negative flow {}", stream.flow()),
        });
    }
    for i in 0..Stream::LEN {
        if i != asm::TEMP && stream[i] < 0.0 {
            return Err(PlantError::Influent {
                reason: format!("{context}: negative concentration in field {i}"),
            });
        }
    }
    Ok(())
}

impl Influent {
    /// Creates a constant influent.
    pub fn constant(stream: Stream) -> Result<Self> {
        validate_record(&stream, "constant influent")?;
        Ok(Influent::Constant(stream))
    }

    /// Creates a table influent from `(time, record)` pairs.
    ///
    /// Times must be finite and strictly increasing and at least one
    /// record must be present.
    pub fn from_records(records: Vec<(f64, Stream)>) -> Result<Self> {
        if records.is_empty() {
            return Err(PlantError::Influent {
                reason: "empty record table".into(),
            });
        }
        for (i, (t, stream)) in records.iter().enumerate() {
            if !t.is_finite() {
                return Err(PlantError::Influent {
                    reason: format!("record {i}: non-finite time"),
                });
            }
            if i > 0 && *t <= records[i - 1].0 {
                return Err(PlantError::Influent {
                    reason: format!("record {i}: time {t} not increasing"),
                });
            }
            validate_record(stream, &format!("record {i}"))?;
        }
        let (times, streams) = records.into_iter().unzip();
        Ok(Influent::Table {
            times,
            records: streams,
        })
    }

    /// The BSM2 constant influent (steady-state load case).
    pub fn bsm2_constant() -> Self {
        Influent::Constant(Stream([
            30.0, 69.5, 51.2, 202.32, 28.17, 0.0, 0.0, 0.0, 0.0, 31.56, 6.95, 10.59, 7.0,
            211.2675, 18_446.0, 15.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ]))
    }

    /// Influent stream at time `t` (days), holding the last sample.
    ///
    /// Before the first sample the first record applies.
    pub fn at(&self, t: f64) -> Stream {
        match self {
            Influent::Constant(stream) => *stream,
            Influent::Table { times, records } => {
                let idx = times.partition_point(|&sample| sample <= t);
                records[idx.saturating_sub(1)]
            }
        }
    }

    /// Last sample time of a table, `None` for a constant influent.
    pub fn end_time(&self) -> Option<f64> {
        match self {
            Influent::Constant(_) => None,
            Influent::Table { times, .. } => times.last().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(q: f64) -> Stream {
        let mut s = Stream::zeros();
        s[asm::Q] = q;
        s[asm::SNH] = 30.0;
        s[asm::TEMP] = 15.0;
        s
    }

    #[test]
    fn test_constant_lookup() {
        let influent = Influent::bsm2_constant();
        assert_eq!(influent.at(0.0), influent.at(364.9));
        assert!((influent.at(5.0).flow() - 18_446.0).abs() < 1e-9);
        assert_eq!(influent.end_time(), None);
    }

    #[test]
    fn test_table_holds_last_sample() {
        let influent = Influent::from_records(vec![
            (0.0, record(10_000.0)),
            (0.5, record(25_000.0)),
            (1.0, record(15_000.0)),
        ])
        .unwrap();
        assert_eq!(influent.at(0.0).flow(), 10_000.0);
        assert_eq!(influent.at(0.25).flow(), 10_000.0);
        assert_eq!(influent.at(0.5).flow(), 25_000.0);
        assert_eq!(influent.at(0.75).flow(), 25_000.0);
        assert_eq!(influent.at(7.0).flow(), 15_000.0);
        assert_eq!(influent.end_time(), Some(1.0));
    }

    #[test]
    fn test_before_first_sample() {
        let influent =
            Influent::from_records(vec![(1.0, record(10_000.0)), (2.0, record(20_000.0))]).unwrap();
        assert_eq!(influent.at(0.0).flow(), 10_000.0);
    }

    #[test]
    fn test_validation_rejects_bad_data() {
        assert!(Influent::from_records(vec![]).is_err());
        assert!(
            Influent::from_records(vec![(0.0, record(1.0)), (0.0, record(2.0))]).is_err(),
            "non-increasing times"
        );
        let mut bad = record(1_000.0);
        bad[asm::SNH] = f64::NAN;
        assert!(Influent::from_records(vec![(0.0, bad)]).is_err());
        let mut negative = record(1_000.0);
        negative[asm::SS] = -1.0;
        assert!(Influent::constant(negative).is_err());
        let mut negative_q = record(-5.0);
        negative_q[asm::SNH] = 0.0;
        assert!(Influent::constant(negative_q).is_err());
    }

    #[test]
    fn test_negative_temperature_allowed() {
        let mut cold = record(1_000.0);
        cold[asm::TEMP] = -0.5;
        assert!(Influent::constant(cold).is_ok());
    }
}
