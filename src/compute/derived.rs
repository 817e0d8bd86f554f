//! Coefficient of variation, percentage of base and percentage margin.
use super::median::Z90;
use crate::model::{DerivedRecord, Domain, IndicatorRecord, PercentPair};
use std::collections::HashMap;

/// Coefficient of variation in percent; undefined for a zero estimate.
#[inline(always)]
pub fn coefficient_of_variation(e: Option<f64>, m: Option<f64>) -> Option<f64> {
    match (e, m) {
        (Some(e), Some(m)) if e != 0.0 => Some(m / Z90 / e * 100.0),
        _ => None,
    }
}

/// Share of the base, in percent.
#[inline(always)]
pub fn percentage(e: Option<f64>, agg_e: Option<f64>) -> Option<f64> {
    match (e, agg_e) {
        (Some(e), Some(agg_e)) if agg_e != 0.0 => Some(e / agg_e * 100.0),
        _ => None,
    }
}

/// Margin of the percentage.
///
/// Uses the proportion formula and falls back to the ratio formula when
/// the radicand would go negative. Undefined at 0% and 100%.
pub fn percentage_moe(e: Option<f64>, m: Option<f64>, p: Option<f64>, agg_e: Option<f64>, agg_m: Option<f64>) -> Option<f64> {
    let (e, m, p, agg_e, agg_m) = (e?, m?, p?, agg_e?, agg_m?);
    if p == 0.0 || p == 100.0 || agg_e == 0.0 {
        return None;
    }
    let cross = e * agg_m / agg_e;
    let radicand = if m * m - cross * cross < 0.0 { m * m + cross * cross } else { m * m - cross * cross };
    Some(radicand.sqrt() / agg_e * 100.0)
}

/// `c`, `p` and `z` for one record against its base record.
pub fn derive(record: &IndicatorRecord, base: Option<&IndicatorRecord>, domain: Domain) -> DerivedRecord {
    let mut out = DerivedRecord::from_indicator(record, domain);
    out.c = coefficient_of_variation(record.e, record.m);
    if let Some(base) = base {
        out.p = percentage(record.e, base.e);
        out.z = percentage_moe(record.e, record.m, out.p, base.e, base.m);
    }
    out
}

/// Derives every record. With `base == None` no percentage is computed; a
/// geography missing from the base table gets undefined `p` and `z`.
pub fn derive_table(records: &[IndicatorRecord], base: Option<&[IndicatorRecord]>, domain: Domain) -> Vec<DerivedRecord> {
    match base {
        None => records.iter().map(|r| derive(r, None, domain)).collect(),
        Some(base) => {
            let by_geoid: HashMap<&str, &IndicatorRecord> = base.iter().map(|b| (b.geoid.as_str(), b)).collect();
            records.iter().map(|r| derive(r, by_geoid.get(r.geoid.as_str()).copied(), domain)).collect()
        }
    }
}

/// Derives `c` and takes `p`, `z` as given (profile tables, percent companions).
/// A published share of 0% carries no margin.
pub fn with_published_percent(record: &IndicatorRecord, percent: PercentPair, domain: Domain) -> DerivedRecord {
    let mut out = derive(record, None, domain);
    out.p = percent.p;
    out.z = if percent.p == Some(0.0) { None } else { percent.z };
    out
}
