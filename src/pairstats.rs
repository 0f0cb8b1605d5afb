//! Per-read-group fragment-length distribution and pair orientation.

use std::fmt;

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{GraphError, Result};

/// Hard stop on the number of records consumed while estimating.
const MAX_RECORDS: usize = 5_000_000;
/// Minimum usable pairs required before refusing to estimate at all.
const MIN_USABLE_PAIRS: usize = 1_000;
/// Two checkpoints match when both statistics differ by less than this.
const CONVERGENCE_PRECISION: f64 = 0.005;

/// Relative mate orientation, derived from strand and position of the
/// first-in-pair read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Ff,
    Fr,
    Rf,
    Rr,
    /// Orientation could not be determined (e.g. mates on different
    /// chromosomes).
    FfUnknown,
}

impl Orientation {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Orientation::Ff => "Ff",
            Orientation::Fr => "Fr",
            Orientation::Rf => "Rf",
            Orientation::Rr => "Rr",
            Orientation::FfUnknown => "FF_UNKNOWN",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "Ff" => Orientation::Ff,
            "Fr" => Orientation::Fr,
            "Rf" => Orientation::Rf,
            "Rr" => Orientation::Rr,
            _ => Orientation::FfUnknown,
        }
    }

    /// Derive from the strand of read 1 and read 2 in genomic order (the
    /// read with the lower position is considered "first" in orientation
    /// terms, matching `getRelOrient` in the original estimator).
    pub fn from_strands(first_fwd: bool, second_fwd: bool) -> Self {
        match (first_fwd, second_fwd) {
            (true, true) => Orientation::Ff,
            (true, false) => Orientation::Fr,
            (false, true) => Orientation::Rf,
            (false, false) => Orientation::Rr,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

/// A fragment-length distribution summarized as median + IQR-as-SD, fit
/// to a Normal approximation for quantile/CDF queries.
///
/// The Normal approximation is an intentional design choice inherited
/// from the original estimator; exact values only matter at the
/// quantiles the scanner actually consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairStats {
    pub median: f64,
    pub sd: f64,
    pub orientation: Orientation,
}

/// Bookkeeping returned alongside a freshly estimated [`PairStats`],
/// recovering the convergence-protocol accounting the original estimator
/// logs but which this crate's consumer (the scanner) doesn't otherwise
/// need to see.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairStatsSummary {
    pub sample_count: usize,
    pub checkpoints_consumed: usize,
    pub converged: bool,
}

impl PairStats {
    /// Estimate median/IQR-as-sd from a batch of fragment lengths.
    ///
    /// Fails with [`GraphError::StatsUnderflow`] if `frag_lengths` is
    /// empty. Does not itself implement the streaming convergence loop;
    /// see [`PairStats::estimate_streaming`] for that.
    pub fn from_samples(frag_lengths: &[i32]) -> Result<Self> {
        if frag_lengths.is_empty() {
            return Err(GraphError::StatsUnderflow(
                "no fragment-length samples provided".to_string(),
            ));
        }
        let mut sorted: Vec<i32> = frag_lengths.to_vec();
        sorted.sort_unstable();
        let n = sorted.len();
        let median = sorted[(n as f64 * 0.5) as usize] as f64;
        let sd = (sorted[(n as f64 * 0.75) as usize] - sorted[(n as f64 * 0.25) as usize]) as f64;
        Ok(Self {
            median,
            sd,
            orientation: Orientation::FfUnknown,
        })
    }

    /// Run the full convergence protocol over a source of fragment-length
    /// batches, ideally 100,000 records at a time.
    ///
    /// `next_batch` should append up to 100,000 more usable
    /// fragment lengths into the passed buffer and return `false` once the
    /// source is exhausted. Accepts samples until two consecutive
    /// checkpoints match within [`CONVERGENCE_PRECISION`], hard-stops at
    /// [`MAX_RECORDS`], and refuses if fewer than [`MIN_USABLE_PAIRS`]
    /// usable pairs were ever observed.
    pub fn estimate_streaming<F>(orientation: Orientation, mut next_batch: F) -> Result<(Self, PairStatsSummary)>
    where
        F: FnMut(&mut Vec<i32>) -> bool,
    {
        let mut samples: Vec<i32> = Vec::new();
        let mut prev: Option<PairStats> = None;
        let mut checkpoints = 0usize;
        let mut converged = false;

        // Each call to `next_batch` is treated as one checkpoint boundary;
        // callers typically add up to 100,000 records per call to
        // match the original estimator's cadence.
        loop {
            let had_more = next_batch(&mut samples);
            let hit_max = samples.len() >= MAX_RECORDS;
            checkpoints += 1;

            if let Ok(mut stats) = PairStats::from_samples(&samples) {
                stats.orientation = orientation;
                if let Some(p) = prev {
                    if Self::matches_within_precision(&p, &stats) {
                        converged = true;
                    }
                }
                prev = Some(stats);
            }

            if converged || hit_max || !had_more {
                break;
            }
        }

        if !converged {
            if samples.len() < MIN_USABLE_PAIRS {
                return Err(GraphError::StatsUnderflow(format!(
                    "only {} usable read pairs observed, need at least {}",
                    samples.len(),
                    MIN_USABLE_PAIRS
                )));
            }
            log::warn!(
                "read pair statistics did not converge after {} records ({} checkpoints); forcing final estimate",
                samples.len(),
                checkpoints
            );
        }

        let mut final_stats = PairStats::from_samples(&samples)?;
        final_stats.orientation = orientation;

        Ok((
            final_stats,
            PairStatsSummary {
                sample_count: samples.len(),
                checkpoints_consumed: checkpoints,
                converged,
            },
        ))
    }

    fn matches_within_precision(a: &PairStats, b: &PairStats) -> bool {
        (a.median - b.median).abs() < CONVERGENCE_PRECISION && (a.sd - b.sd).abs() < CONVERGENCE_PRECISION
    }

    fn normal(&self) -> Normal {
        let sd = if self.sd > 0.0 { self.sd } else { f64::MIN_POSITIVE };
        Normal::new(self.median, sd).expect("median/sd always produce a valid Normal distribution")
    }

    /// Inverse CDF (quantile function) of the fitted Normal distribution.
    pub fn quantile(&self, p: f64) -> f64 {
        self.normal().inverse_cdf(p)
    }

    /// CDF of the fitted Normal distribution.
    pub fn cdf(&self, x: f64) -> f64 {
        self.normal().cdf(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples_basic() {
        let samples: Vec<i32> = (1..=100).collect();
        let stats = PairStats::from_samples(&samples).unwrap();
        assert_eq!(stats.median, 51.0);
        assert_eq!(stats.sd, 75.0 - 26.0);
    }

    #[test]
    fn test_from_samples_empty_fails() {
        let err = PairStats::from_samples(&[]).unwrap_err();
        assert!(matches!(err, GraphError::StatsUnderflow(_)));
    }

    #[test]
    fn test_quantile_cdf_roundtrip() {
        let stats = PairStats {
            median: 300.0,
            sd: 50.0,
            orientation: Orientation::Fr,
        };
        let q = stats.quantile(0.5);
        assert!((q - 300.0).abs() < 1e-6);
        let p = stats.cdf(300.0);
        assert!((p - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_orientation_tag_roundtrip() {
        for o in [Orientation::Ff, Orientation::Fr, Orientation::Rf, Orientation::Rr] {
            assert_eq!(Orientation::from_tag(o.as_tag()), o);
        }
    }

    #[test]
    fn test_estimate_streaming_converges_immediately_on_stable_data() {
        // Two identical checkpoints in a row should converge.
        let batch: Vec<i32> = (1..=1000).collect();
        let mut calls = 0;
        let result = PairStats::estimate_streaming(Orientation::Fr, |buf| {
            calls += 1;
            if calls <= 2 {
                buf.extend_from_slice(&batch);
                true
            } else {
                false
            }
        });
        let (stats, summary) = result.unwrap();
        assert!(summary.converged);
        assert_eq!(stats.orientation, Orientation::Fr);
    }

    #[test]
    fn test_estimate_streaming_underflow() {
        let result = PairStats::estimate_streaming(Orientation::Fr, |_buf| false);
        assert!(result.is_err());
    }
}
