//! Medians of binned distributions and their margins.
//!
//! The margin follows the standard-error-of-a-50%-proportion method: a
//! confidence interval is placed around the 50th percentile of the
//! cumulative distribution and both ends are mapped back to values by
//! linear interpolation inside their bins.
use super::kernel;
use super::ComputationError;
use crate::catalog::MedianRange;
use crate::model::{GeoType, IndicatorRecord};
use std::collections::BTreeMap;

/// Two-sided 90% critical value.
pub const Z90: f64 = 1.645;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MedianEstimate {
    pub e: f64,
    pub m: Option<f64>,
}

/// Why a median has no margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unbounded {
    /// The median sits in the open-ended top bin.
    OpenEnded,
    /// No observations at all.
    EmptyBase,
    /// The standard error spans the whole distribution.
    Unreliable { se50: f64 },
    /// The lower confidence bound falls in the top bin.
    LowerInTopBin,
}

/// Intermediate values of the margin calculation, kept for the audit trace.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginWorkings {
    pub total: f64,
    pub se50: f64,
    pub p_lower: f64,
    pub p_upper: f64,
    /// Cumulative percentage at the top of each bin.
    pub cumulative: Vec<f64>,
    pub lower_bin: usize,
    pub upper_bin: usize,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl MarginWorkings {
    pub fn moe(&self) -> f64 {
        (self.upper_bound - self.lower_bound) * Z90 / 2.0
    }
}

fn check_counts(range: &MedianRange, counts: &[f64]) -> Result<(), ComputationError> {
    if range.len() != counts.len() || range.is_empty() {
        return Err(ComputationError::BinCount { bins: range.len(), counts: counts.len() });
    }
    Ok(())
}

/// Point estimate of the median.
///
/// Walks the bins until the running count reaches half the total. A stop
/// in the first bin returns its upper bound, a stop in the last bin
/// returns its lower bound, anything else interpolates linearly. An empty
/// distribution has median 0.
pub fn median(range: &MedianRange, counts: &[f64]) -> Result<f64, ComputationError> {
    check_counts(range, counts)?;
    let total = kernel::sum(counts);
    if total == 0.0 {
        return Ok(0.0);
    }
    let half = total / 2.0;
    let last = counts.len() - 1;

    let mut running = 0.0;
    for (i, &count) in counts.iter().enumerate() {
        let before = running;
        running += count;
        if running < half {
            continue;
        }
        let bin = &range.bins[i];
        return Ok(if i == 0 {
            bin.upper
        } else if i == last {
            bin.lower
        } else {
            bin.lower + (half - before) * bin.width() / count
        });
    }
    // Only reachable with negative counts.
    Ok(range.bins[last].lower)
}

/// Interpolated value at cumulative percentage `p` inside `bin`.
fn bound(range: &MedianRange, cumulative: &[f64], bin: usize, p: f64) -> f64 {
    let a1 = range.bins[bin].lower;
    let a2 = range.bins.get(bin + 1).map_or(a1, |next| next.lower);
    let c1 = if bin == 0 { 0.0 } else { cumulative[bin - 1] };
    let c2 = cumulative[bin];
    (p - c1) * (a2 - a1) / (c2 - c1) + a1
}

/// Full margin calculation for a distribution whose median is `median`.
pub fn margin_workings(range: &MedianRange, counts: &[f64], median: f64) -> Result<Result<MarginWorkings, Unbounded>, ComputationError> {
    check_counts(range, counts)?;
    let top_lower = range.top_lower().unwrap_or(f64::INFINITY);
    if median >= top_lower {
        return Ok(Err(Unbounded::OpenEnded));
    }
    let total = kernel::sum(counts);
    if total <= 0.0 {
        return Ok(Err(Unbounded::EmptyBase));
    }

    // 1. Standard error of a 50% proportion
    let se50 = range.design_factor * (93.0 / (7.0 * total) * 2500.0).sqrt();
    if se50 >= 50.0 {
        return Ok(Err(Unbounded::Unreliable { se50 }));
    }
    let p_lower = 50.0 - se50;
    let p_upper = 50.0 + se50;

    // 2. Cumulative percentage distribution
    let mut cumulative = Vec::with_capacity(counts.len());
    let mut running = 0.0;
    for count in counts {
        running += count;
        cumulative.push(running / total * 100.0);
    }

    // 3. Bins holding each confidence bound
    let last = counts.len() - 1;
    let first_above = |p: f64| cumulative.iter().position(|&c| c > p).unwrap_or(last);
    let lower_bin = first_above(p_lower);
    let upper_bin = first_above(p_upper);
    if lower_bin >= last {
        return Ok(Err(Unbounded::LowerInTopBin));
    }

    // 4. Interpolate both bounds
    let lower_bound = bound(range, &cumulative, lower_bin, p_lower);
    let upper_bound = bound(range, &cumulative, upper_bin, p_upper);

    Ok(Ok(MarginWorkings { total, se50, p_lower, p_upper, cumulative, lower_bin, upper_bin, lower_bound, upper_bound }))
}

pub fn median_moe(range: &MedianRange, counts: &[f64], median: f64) -> Result<Option<f64>, ComputationError> {
    Ok(margin_workings(range, counts, median)?.ok().map(|w| w.moe()))
}

pub fn estimate(range: &MedianRange, counts: &[f64]) -> Result<MedianEstimate, ComputationError> {
    let e = median(range, counts)?;
    let m = median_moe(range, counts, e)?;
    Ok(MedianEstimate { e, m })
}

/// Estimates the median for every geography present in `bin_records`.
///
/// `bin_records` holds the aggregated bin-component records; a bin missing
/// for a geography counts as zero. Rows come back ordered by geoid.
pub fn estimate_table(
    variable: &str,
    geotype: GeoType,
    range: &MedianRange,
    bin_records: &[IndicatorRecord],
) -> Result<Vec<IndicatorRecord>, ComputationError> {
    let slot: BTreeMap<&str, usize> = range.bin_variables().enumerate().map(|(i, v)| (v, i)).collect();
    let mut pivot: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in bin_records {
        if let Some(&i) = slot.get(record.variable.as_str()) {
            let counts = pivot.entry(record.geoid.as_str()).or_insert_with(|| vec![0.0; range.len()]);
            counts[i] += record.e.unwrap_or(0.0);
        }
    }

    let mut out = Vec::with_capacity(pivot.len());
    for (geoid, counts) in pivot {
        let est = estimate(range, &counts)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let trace = crate::display::trace::format_median_trace(variable, geoid, range, &counts, est.e)?;
            tracing::debug!(target: "factfinder_core::median", "{}", trace);
        }
        out.push(IndicatorRecord::new(geoid, variable, geotype, Some(est.e), est.m));
    }
    Ok(out)
}
