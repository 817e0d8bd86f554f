//! Horizontal aggregation: raw source fields -> one (e, m) per geography.
use super::kernel;
use super::ComputationError;
use crate::catalog::VariableDefinition;
use crate::geography::geoid::census_geoid;
use crate::model::{GeoType, IndicatorRecord, ObservationTable, PercentPair, RawField};
use smallvec::SmallVec;

/// Suppression and annotation codes a source uses in place of a value.
pub const OUTLIER_CODES: [f64; 12] = [
    999_999_999.0,
    333_333_333.0,
    222_222_222.0,
    666_666_666.0,
    888_888_888.0,
    555_555_555.0,
    -999_999_999.0,
    -333_333_333.0,
    -222_222_222.0,
    -666_666_666.0,
    -888_888_888.0,
    -555_555_555.0,
];

/// Maps sentinel codes and non-finite values to undefined.
#[inline(always)]
pub fn scrub(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && !OUTLIER_CODES.contains(v))
}

/// Per-field normalization ahead of the sum.
///
/// An undefined estimate takes its margin with it, and an estimate of
/// exactly zero carries a zero margin whatever the source reported.
#[inline(always)]
pub fn clean_field(field: &RawField) -> (Option<f64>, Option<f64>) {
    match scrub(field.estimate) {
        None => (None, None),
        Some(e) if e == 0.0 => (Some(0.0), Some(0.0)),
        Some(e) => (Some(e), scrub(field.moe)),
    }
}

/// Combines already-cleaned fields. `m` is undefined for full-count sources.
pub fn combine(fields: &[(Option<f64>, Option<f64>)], sampled: bool) -> (Option<f64>, Option<f64>) {
    let e = kernel::sum_defined(fields.iter().map(|f| f.0));
    let m = if sampled { kernel::rss_defined(fields.iter().map(|f| f.1)) } else { None };
    (e, m)
}

fn check_shape(def: &VariableDefinition, actual: usize) -> Result<(), ComputationError> {
    if actual != def.fields.len() {
        return Err(ComputationError::Shape { variable: def.id.clone(), expected: def.fields.len(), actual });
    }
    Ok(())
}

/// Sums `def`'s raw fields for every row of `table`, fetched at `geotype`.
///
/// Rows come back ordered by geoid.
pub fn aggregate(def: &VariableDefinition, geotype: GeoType, table: &ObservationTable) -> Result<Vec<IndicatorRecord>, ComputationError> {
    let sampled = def.has_sampling_error();
    let mut out = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        check_shape(def, row.fields.len())?;
        let cleaned: SmallVec<[(Option<f64>, Option<f64>); 4]> = row.fields.iter().map(clean_field).collect();
        let (e, m) = combine(&cleaned, sampled);
        let geoid = census_geoid(geotype, &row.parts)?;
        out.push(IndicatorRecord::new(geoid, def.id.as_str(), geotype, e, m));
    }

    out.sort_by(|a, b| a.geoid.cmp(&b.geoid));
    Ok(out)
}

/// Reads a single profile field together with the percentage the source
/// publishes for it.
pub fn profile_fields(
    def: &VariableDefinition,
    geotype: GeoType,
    table: &ObservationTable,
) -> Result<Vec<(IndicatorRecord, PercentPair)>, ComputationError> {
    let sampled = def.has_sampling_error();
    let mut out = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        check_shape(def, row.fields.len())?;
        let field = &row.fields[0];
        let (e, m) = clean_field(field);
        let geoid = census_geoid(geotype, &row.parts)?;
        let record = IndicatorRecord::new(geoid, def.id.as_str(), geotype, e, if sampled { m } else { None });
        out.push((record, PercentPair { p: scrub(field.percent), z: scrub(field.percent_moe) }));
    }

    out.sort_by(|a, b| a.0.geoid.cmp(&b.0.geoid));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::model::{GeoParts, Observation};
    use crate::testutil::CATALOG_JSON;
    use rstest::rstest;

    fn tract(code: &str, fields: &[RawField]) -> Observation {
        Observation {
            parts: GeoParts {
                state: Some("36".into()),
                county: Some("061".into()),
                tract: Some(code.into()),
                ..Default::default()
            },
            fields: fields.iter().copied().collect(),
        }
    }

    #[rstest]
    #[case(RawField::new(0.0, 17.0), (Some(0.0), Some(0.0)))]
    #[case(RawField::new(-666_666_666.0, 12.0), (None, None))]
    #[case(RawField::new(10.0, -222_222_222.0), (Some(10.0), None))]
    #[case(RawField::new(10.0, 4.0), (Some(10.0), Some(4.0)))]
    fn test_clean_field(#[case] field: RawField, #[case] expected: (Option<f64>, Option<f64>)) {
        assert_eq!(clean_field(&field), expected);
    }

    #[test]
    fn test_sum_and_rss_across_fields() {
        let catalog = Catalog::from_json(CATALOG_JSON).unwrap();
        let def = catalog.get("pop65pl").unwrap();
        let table = ObservationTable {
            geotype: Some(GeoType::Tract),
            rows: vec![
                tract("000200", &[RawField::new(30.0, 3.0), RawField::new(40.0, 4.0)]),
                tract("000100", &[RawField::new(-666_666_666.0, 9.0), RawField::new(0.0, 25.0)]),
            ],
        };
        let out = aggregate(def, GeoType::Tract, &table).unwrap();
        assert_eq!(out[0].geoid, "36061000100");
        assert_eq!((out[0].e, out[0].m), (Some(0.0), Some(0.0)));
        assert_eq!((out[1].e, out[1].m), (Some(70.0), Some(5.0)));
    }

    #[test]
    fn test_all_fields_undefined_leaves_estimate_undefined() {
        let catalog = Catalog::from_json(CATALOG_JSON).unwrap();
        let def = catalog.get("pop65pl").unwrap();
        let table = ObservationTable {
            geotype: None,
            rows: vec![tract("000100", &[RawField::default(), RawField::new(999_999_999.0, 1.0)])],
        };
        let out = aggregate(def, GeoType::Tract, &table).unwrap();
        assert_eq!((out[0].e, out[0].m), (None, None));
    }

    #[test]
    fn test_full_count_has_no_margin() {
        let catalog = Catalog::from_json(CATALOG_JSON).unwrap();
        let def = catalog.get("pop2010").unwrap();
        let table = ObservationTable { geotype: None, rows: vec![tract("000100", &[RawField::count(1200.0)])] };
        let out = aggregate(def, GeoType::Tract, &table).unwrap();
        assert_eq!((out[0].e, out[0].m), (Some(1200.0), None));
    }

    #[test]
    fn test_field_count_mismatch() {
        let catalog = Catalog::from_json(CATALOG_JSON).unwrap();
        let def = catalog.get("pop65pl").unwrap();
        let table = ObservationTable { geotype: None, rows: vec![tract("000100", &[RawField::new(1.0, 1.0)])] };
        let err = aggregate(def, GeoType::Tract, &table).unwrap_err();
        assert!(matches!(err, ComputationError::Shape { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_profile_percent_is_read_from_source() {
        let catalog = Catalog::from_json(CATALOG_JSON).unwrap();
        let def = catalog.get("f16pl").unwrap();
        let field = RawField { estimate: Some(500.0), moe: Some(40.0), percent: Some(62.5), percent_moe: Some(-888_888_888.0) };
        let table = ObservationTable { geotype: None, rows: vec![tract("000100", &[field])] };
        let out = profile_fields(def, GeoType::Tract, &table).unwrap();
        assert_eq!(out[0].0.e, Some(500.0));
        assert_eq!(out[0].1, PercentPair { p: Some(62.5), z: None });
    }
}
