//! Lane-parallel reductions behind every estimate and margin combination.
use smallvec::SmallVec;
use wide::f64x4;

const LANES: usize = 4;

/// Sum of `values`, four lanes at a time.
#[inline(always)]
pub fn sum(values: &[f64]) -> f64 {
    let mut acc = f64x4::splat(0.0);
    let chunks = values.chunks_exact(LANES);
    let tail = chunks.remainder();
    for chunk in chunks {
        acc = acc + f64x4::from([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    let lanes = acc.to_array();
    lanes.iter().sum::<f64>() + tail.iter().sum::<f64>()
}

/// Sum of squares of `values`, four lanes at a time.
#[inline(always)]
pub fn sum_of_squares(values: &[f64]) -> f64 {
    let mut acc = f64x4::splat(0.0);
    let chunks = values.chunks_exact(LANES);
    let tail = chunks.remainder();
    for chunk in chunks {
        let v = f64x4::from([chunk[0], chunk[1], chunk[2], chunk[3]]);
        acc = acc + v * v;
    }
    let lanes = acc.to_array();
    lanes.iter().sum::<f64>() + tail.iter().map(|x| x * x).sum::<f64>()
}

/// Root-sum-of-squares: the margin of a sum of independent estimates.
#[inline(always)]
pub fn root_sum_of_squares(values: &[f64]) -> f64 {
    sum_of_squares(values).sqrt()
}

/// Sums the defined values; `None` when nothing is defined.
pub fn sum_defined<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let defined: SmallVec<[f64; 8]> = values.into_iter().flatten().collect();
    if defined.is_empty() {
        None
    } else {
        Some(sum(&defined))
    }
}

/// RSS over the defined margins; `None` when nothing is defined.
pub fn rss_defined<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let defined: SmallVec<[f64; 8]> = values.into_iter().flatten().collect();
    if defined.is_empty() {
        None
    } else {
        Some(root_sum_of_squares(&defined))
    }
}

/// RSS that is undefined as soon as any margin is undefined.
pub fn rss_strict<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let defined: Option<SmallVec<[f64; 8]>> = values.into_iter().collect();
    match defined {
        Some(v) if !v.is_empty() => Some(root_sum_of_squares(&v)),
        _ => None,
    }
}
