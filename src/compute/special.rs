//! Special composites: fixed formulas over other variables' (e, m).
use super::ComputationError;
use crate::catalog::{SpecialDefinition, SpecialFunction};
use crate::model::{GeoType, IndicatorRecord};
use std::collections::BTreeMap;

#[inline(always)]
fn square(x: f64) -> f64 {
    x * x
}

/// Applies `function` to one geography's constituents, in catalog order.
pub fn combine(function: SpecialFunction, a: (Option<f64>, Option<f64>), b: (Option<f64>, Option<f64>)) -> (Option<f64>, Option<f64>) {
    let (ae, am) = a;
    let (be, bm) = b;
    match function {
        SpecialFunction::Ratio | SpecialFunction::Proportion => {
            let (num, den) = match (ae, be) {
                (Some(num), Some(den)) if den != 0.0 => (num, den),
                _ => return (None, None),
            };
            let e = num / den;
            let m = match (am, bm) {
                (Some(num_m), Some(den_m)) => {
                    let ratio_form = square(num_m) + square(num * den_m / den);
                    let radicand = if function == SpecialFunction::Proportion {
                        let proportion_form = square(num_m) - square(e * den_m);
                        if proportion_form < 0.0 {
                            ratio_form
                        } else {
                            proportion_form
                        }
                    } else {
                        ratio_form
                    };
                    Some(radicand.sqrt() / den)
                }
                _ => None,
            };
            (Some(e), m)
        }
        SpecialFunction::Difference => {
            let e = match (ae, be) {
                (Some(a), Some(b)) => Some(a - b),
                _ => None,
            };
            let m = match (am, bm) {
                (Some(a), Some(b)) => Some((square(a) + square(b)).sqrt()),
                _ => None,
            };
            (e, m)
        }
    }
}

/// Combines the constituent tables geography by geography.
///
/// `inputs[i]` holds the records of `special.base_variables[i]`. A
/// geography missing from any constituent is undefined.
pub fn combine_tables(
    variable: &str,
    geotype: GeoType,
    special: &SpecialDefinition,
    inputs: &[Vec<IndicatorRecord>],
) -> Result<Vec<IndicatorRecord>, ComputationError> {
    let arity = special.function.arity();
    if inputs.len() != arity {
        return Err(ComputationError::Arity { variable: variable.to_string(), expected: arity, actual: inputs.len() });
    }

    let mut pivot: BTreeMap<&str, [(Option<f64>, Option<f64>); 2]> = BTreeMap::new();
    for (slot, table) in inputs.iter().enumerate() {
        for record in table {
            pivot.entry(record.geoid.as_str()).or_insert([(None, None); 2])[slot] = (record.e, record.m);
        }
    }

    Ok(pivot
        .into_iter()
        .map(|(geoid, [a, b])| {
            let (e, m) = combine(special.function, a, b);
            IndicatorRecord::new(geoid, variable, geotype, e, m)
        })
        .collect())
}
