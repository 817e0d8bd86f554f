use crate::catalog::MedianRange;
use crate::compute::median::{margin_workings, Unbounded};
use crate::compute::ComputationError;
use std::fmt::Write;

/// Renders how a median and its margin were reached for one geography.
pub fn format_median_trace(
    variable: &str,
    geoid: &str,
    range: &MedianRange,
    counts: &[f64],
    median: f64,
) -> Result<String, ComputationError> {
    let workings = margin_workings(range, counts, median)?;
    let mut out = String::new();

    let _ = writeln!(out, "MEDIAN TRACE for '{}' at {}:", variable, geoid);
    let _ = writeln!(out, "--------------------------------------------------");
    let cumulative = workings.as_ref().ok().map(|w| w.cumulative.as_slice());
    for (i, (bin, count)) in range.bins.iter().zip(counts).enumerate() {
        let upper = if bin.upper.is_finite() { format!("{}", bin.upper) } else { "+".to_string() };
        let _ = write!(out, "  [{:>2}] {:<16} [{}, {}) count {}", i, bin.variable, bin.lower, upper, count);
        if let Some(cum) = cumulative {
            let _ = write!(out, "  cum {:.3}%", cum[i]);
        }
        if let Ok(w) = &workings {
            if i == w.lower_bin {
                let _ = write!(out, "  <- lower");
            }
            if i == w.upper_bin {
                let _ = write!(out, "  <- upper");
            }
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "  median = {}", median);
    match workings {
        Ok(w) => {
            let _ = writeln!(out, "  N = {}, design factor = {}, se50 = {:.4}", w.total, range.design_factor, w.se50);
            let _ = writeln!(out, "  p bounds = [{:.4}, {:.4}]", w.p_lower, w.p_upper);
            let _ = writeln!(out, "  value bounds = [{:.4}, {:.4}]", w.lower_bound, w.upper_bound);
            let _ = writeln!(out, "  moe = {:.4}", w.moe());
        }
        Err(why) => {
            let reason = match why {
                Unbounded::OpenEnded => "median in open-ended top bin".to_string(),
                Unbounded::EmptyBase => "no observations".to_string(),
                Unbounded::Unreliable { se50 } => format!("se50 {:.4} >= 50", se50),
                Unbounded::LowerInTopBin => "lower bound in top bin".to_string(),
            };
            let _ = writeln!(out, "  moe = undefined ({})", reason);
        }
    }
    Ok(out)
}
