use crate::model::DerivedRecord;

/// Decimal places kept for `c`, `p` and `z`.
pub const PERCENT_DIGITS: i32 = 1;

/// Rounds half away from zero to `digits` decimal places (negative digits
/// round to tens, hundreds, ...).
#[inline(always)]
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

pub fn round_record(record: &mut DerivedRecord, digits: i32) {
    let r = |v: Option<f64>, d: i32| v.map(|v| round_to(v, d));
    record.e = r(record.e, digits);
    record.m = r(record.m, digits);
    record.c = r(record.c, PERCENT_DIGITS);
    record.p = r(record.p, PERCENT_DIGITS);
    record.z = r(record.z, PERCENT_DIGITS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2.5, 0, 3.0)]
    #[case(-2.5, 0, -3.0)]
    #[case(12.345, 1, 12.3)]
    #[case(1234.0, -2, 1200.0)]
    #[case(0.04, 1, 0.0)]
    fn test_round_to(#[case] value: f64, #[case] digits: i32, #[case] expected: f64) {
        assert_eq!(round_to(value, digits), expected);
    }
}
