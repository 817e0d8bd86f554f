//! Ordered suppression rules applied to every published row.
//!
//! Rules run in table order; later rules see the output of earlier ones.
use crate::model::{DerivedRecord, GeoType};

/// What the rules need to know about the row's variable and geography.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningContext {
    pub is_base: bool,
    pub is_median: bool,
    pub is_median_input: bool,
    pub is_median_input_exception: bool,
    pub geotype: GeoType,
    /// False for full-count sources, which never get a zero margin invented.
    pub sampled: bool,
}

type Rule = fn(&mut DerivedRecord, &CleaningContext);

const RULES: [(&str, Rule); 7] = [
    ("negative values", drop_negatives),
    ("percent above 100", drop_overflowing_percent),
    ("z without usable p", drop_orphan_z),
    ("zero estimate", zero_estimate),
    ("city and borough bases", city_borough_base),
    ("base percent", base_percent),
    ("median inputs", median_inputs),
];

pub fn clean(record: &mut DerivedRecord, ctx: &CleaningContext) {
    for (_, rule) in RULES.iter() {
        rule(record, ctx);
    }
}

/// Names of the rules, in application order.
pub fn rule_names() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|(name, _)| *name)
}

#[inline(always)]
fn drop_negative(v: &mut Option<f64>) {
    if matches!(v, Some(x) if *x < 0.0) {
        *v = None;
    }
}

fn drop_negatives(r: &mut DerivedRecord, _: &CleaningContext) {
    for v in [&mut r.c, &mut r.e, &mut r.m, &mut r.p, &mut r.z] {
        drop_negative(v);
    }
}

fn drop_overflowing_percent(r: &mut DerivedRecord, _: &CleaningContext) {
    if matches!(r.p, Some(p) if p > 100.0) {
        r.p = None;
    }
}

fn drop_orphan_z(r: &mut DerivedRecord, _: &CleaningContext) {
    if r.p.map_or(true, |p| p == 100.0) {
        r.z = None;
    }
}

fn zero_estimate(r: &mut DerivedRecord, ctx: &CleaningContext) {
    if r.e != Some(0.0) {
        return;
    }
    r.c = None;
    r.p = None;
    r.z = None;
    if !ctx.is_base {
        r.m = None;
    } else if r.m.is_none() && ctx.sampled {
        r.m = Some(0.0);
    }
}

fn city_borough_base(r: &mut DerivedRecord, ctx: &CleaningContext) {
    if !(ctx.is_base && ctx.geotype.is_city_or_borough()) {
        return;
    }
    if r.c.is_none() {
        r.c = Some(0.0);
    }
    if r.m.is_none() && ctx.sampled {
        r.m = Some(0.0);
    }
}

fn base_percent(r: &mut DerivedRecord, ctx: &CleaningContext) {
    if ctx.is_base && !ctx.is_median {
        r.p = Some(100.0);
        r.z = None;
    }
}

fn median_inputs(r: &mut DerivedRecord, ctx: &CleaningContext) {
    if ctx.is_median_input && !ctx.is_median_input_exception {
        r.m = None;
        r.p = None;
        r.z = None;
        r.c = None;
    }
}
