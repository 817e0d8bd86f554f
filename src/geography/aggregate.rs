//! Vertical aggregation: fine-geography (e, m) rolled up to coarse units.
use super::crosswalk::{GeographyReference, RatioEntry};
use crate::compute::kernel;
use crate::compute::ComputationError;
use crate::model::{GeoType, IndicatorRecord, Membership};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Below this reapportionment factor the margin is scaled down.
const FULL_MARGIN_FACTOR: f64 = 100.0;

pub trait Aggregator: Send + Sync {
    /// Rolls `records` (one variable, one fine level) up to the target level.
    fn aggregate(&self, records: &[IndicatorRecord]) -> Result<Vec<IndicatorRecord>, ComputationError>;

    fn target(&self) -> GeoType;
}

type Members = Vec<(Option<f64>, Option<f64>)>;

/// Estimates sum over defined members; one undefined margin leaves the
/// group margin undefined.
fn emit(variable: &str, target: GeoType, groups: BTreeMap<&str, Members>) -> Vec<IndicatorRecord> {
    groups
        .into_iter()
        .map(|(geoid, members)| {
            let e = kernel::sum_defined(members.iter().map(|m| m.0));
            let m = kernel::rss_strict(members.iter().map(|m| m.1));
            IndicatorRecord::new(geoid, variable, target, e, m)
        })
        .collect()
}

fn variable_of(records: &[IndicatorRecord]) -> Option<&str> {
    records.first().map(|r| r.variable.as_str())
}

/// Many-to-one crosswalk between two levels. Fine units without a coarse
/// unit are dropped.
pub struct CrosswalkAggregator<'a> {
    pairs: Vec<(&'a str, &'a str)>,
    target: GeoType,
}

impl<'a> CrosswalkAggregator<'a> {
    pub fn new(reference: &'a GeographyReference, from: GeoType, to: GeoType) -> Self {
        Self { pairs: reference.pairs(from, to, None), target: to }
    }
}

impl<'a> Aggregator for CrosswalkAggregator<'a> {
    fn aggregate(&self, records: &[IndicatorRecord]) -> Result<Vec<IndicatorRecord>, ComputationError> {
        let Some(variable) = variable_of(records) else { return Ok(Vec::new()) };
        let mut coarse_of: HashMap<&str, Vec<&str>> = HashMap::new();
        for (fine, coarse) in &self.pairs {
            coarse_of.entry(*fine).or_default().push(*coarse);
        }

        let mut groups: BTreeMap<&str, Members> = BTreeMap::new();
        let mut dropped = 0usize;
        for record in records {
            match coarse_of.get(record.geoid.as_str()) {
                Some(targets) => {
                    for coarse in targets {
                        groups.entry(*coarse).or_default().push((record.e, record.m));
                    }
                }
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(variable, target = %self.target, dropped, "rows without a crosswalk entry were dropped");
        }
        Ok(emit(variable, self.target, groups))
    }

    fn target(&self) -> GeoType {
        self.target
    }
}

/// Crosswalk restricted to fine units inside a subset (flood plain, park
/// access). Every coarse unit of the subset is produced; subset members
/// with no data count as undefined.
pub struct MembershipAggregator<'a> {
    pairs: Vec<(&'a str, &'a str)>,
    membership: Membership,
    target: GeoType,
}

impl<'a> MembershipAggregator<'a> {
    pub fn new(reference: &'a GeographyReference, from: GeoType, via: GeoType, membership: Membership, to: GeoType) -> Self {
        Self { pairs: reference.pairs(from, via, Some(membership)), membership, target: to }
    }
}

impl<'a> Aggregator for MembershipAggregator<'a> {
    fn aggregate(&self, records: &[IndicatorRecord]) -> Result<Vec<IndicatorRecord>, ComputationError> {
        let Some(variable) = variable_of(records) else { return Ok(Vec::new()) };
        let by_geoid: HashMap<&str, &IndicatorRecord> = records.iter().map(|r| (r.geoid.as_str(), r)).collect();

        let mut groups: BTreeMap<&str, Members> = BTreeMap::new();
        for (fine, coarse) in &self.pairs {
            let member = by_geoid.get(fine).map_or((None, None), |r| (r.e, r.m));
            groups.entry(*coarse).or_default().push(member);
        }
        debug!(variable, membership = ?self.membership, members = self.pairs.len(), "membership crosswalk");
        Ok(emit(variable, self.target, groups))
    }

    fn target(&self) -> GeoType {
        self.target
    }
}

/// Margin of a fragment carrying `ratio` of its source unit.
///
/// `fragment_e` is the already-apportioned estimate. The scaling factor is
/// `(100 * ratio)^0.56901 * 7.96309`, in percent.
pub fn reapportion_moe(m: Option<f64>, ratio: f64, fragment_e: Option<f64>) -> Option<f64> {
    if ratio == 1.0 {
        return m;
    }
    if fragment_e == Some(0.0) {
        return None;
    }
    let factor = (ratio * 100.0).powf(0.56901) * 7.96309;
    if factor >= FULL_MARGIN_FACTOR {
        m
    } else {
        m.map(|m| m * factor / 100.0)
    }
}

/// Splits 2010 tracts into 2020 tracts by population ratio.
///
/// Fragments are summed like any crosswalk group, so a zero-estimate
/// fragment (which has no margin) leaves its destination margin undefined.
pub struct ReapportionAggregator<'a> {
    ratios: &'a [RatioEntry],
}

impl<'a> ReapportionAggregator<'a> {
    pub fn new(reference: &'a GeographyReference) -> Self {
        Self { ratios: reference.ratios() }
    }
}

impl<'a> Aggregator for ReapportionAggregator<'a> {
    fn aggregate(&self, records: &[IndicatorRecord]) -> Result<Vec<IndicatorRecord>, ComputationError> {
        let Some(variable) = variable_of(records) else { return Ok(Vec::new()) };
        let by_geoid: HashMap<&str, &IndicatorRecord> = records.iter().map(|r| (r.geoid.as_str(), r)).collect();

        let mut groups: BTreeMap<&str, Members> = BTreeMap::new();
        for entry in self.ratios {
            let Some(source) = by_geoid.get(entry.from_geoid.as_str()) else { continue };
            let e = source.e.map(|e| e * entry.ratio);
            let m = reapportion_moe(source.m, entry.ratio, e);
            groups.entry(entry.to_geoid.as_str()).or_default().push((e, m));
        }

        Ok(emit(variable, GeoType::Tract2020, groups))
    }

    fn target(&self) -> GeoType {
        GeoType::Tract2020
    }
}

/// Runs aggregators back to back, each on the previous one's output.
pub struct ChainedAggregator<'a> {
    stages: Vec<Box<dyn Aggregator + 'a>>,
}

impl<'a> ChainedAggregator<'a> {
    pub fn new(stages: Vec<Box<dyn Aggregator + 'a>>) -> Self {
        Self { stages }
    }
}

impl<'a> Aggregator for ChainedAggregator<'a> {
    fn aggregate(&self, records: &[IndicatorRecord]) -> Result<Vec<IndicatorRecord>, ComputationError> {
        let mut current = records.to_vec();
        for stage in &self.stages {
            current = stage.aggregate(&current)?;
        }
        Ok(current)
    }

    fn target(&self) -> GeoType {
        self.stages.last().map_or(GeoType::Tract2020, |s| s.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CROSSWALK_JSON, RATIO_JSON};
    use rstest::rstest;

    fn reference() -> GeographyReference {
        GeographyReference::from_json(CROSSWALK_JSON, RATIO_JSON).unwrap()
    }

    fn tract(code: &str, e: Option<f64>, m: Option<f64>) -> IndicatorRecord {
        IndicatorRecord::new(format!("36061{}", code), "pop", GeoType::Tract, e, m)
    }

    #[test]
    fn test_crosswalk_sums_and_rss() {
        let reference = reference();
        let agg = CrosswalkAggregator::new(&reference, GeoType::Tract, GeoType::Nta);
        let out = agg
            .aggregate(&[
                tract("000100", Some(30.0), Some(3.0)),
                tract("000200", Some(40.0), Some(4.0)),
                tract("000300", Some(5.0), Some(1.0)),
                tract("999900", Some(1.0), Some(1.0)),
            ])
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].geoid.as_str(), out[0].e, out[0].m), ("MN01", Some(70.0), Some(5.0)));
        assert_eq!(out[0].geotype, GeoType::Nta);
        assert_eq!((out[1].geoid.as_str(), out[1].e), ("MN02", Some(5.0)));
    }

    #[test]
    fn test_crosswalk_undefined_margin_poisons_group() {
        let reference = reference();
        let agg = CrosswalkAggregator::new(&reference, GeoType::Tract, GeoType::Nta);
        let out = agg.aggregate(&[tract("000100", Some(30.0), None), tract("000200", None, None)]).unwrap();
        assert_eq!((out[0].e, out[0].m), (Some(30.0), None));
    }

    #[test]
    fn test_crosswalk_margin_is_order_independent() {
        let reference = reference();
        let agg = CrosswalkAggregator::new(&reference, GeoType::Tract, GeoType::CommunityDistrict);
        let a = tract("000100", Some(30.0), Some(3.3));
        let b = tract("000200", Some(40.0), Some(4.7));
        let forward = agg.aggregate(&[a.clone(), b.clone()]).unwrap();
        let backward = agg.aggregate(&[b, a]).unwrap();
        assert!((forward[0].m.unwrap() - backward[0].m.unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_membership_keeps_only_subset() {
        let reference = reference();
        let agg = MembershipAggregator::new(
            &reference,
            GeoType::BlockGroup,
            GeoType::CommunityDistrict,
            Membership::Floodplain500,
            GeoType::CdFloodplain500,
        );
        let bg = |g: &str, e: f64| IndicatorRecord::new(g, "pop", GeoType::BlockGroup, Some(e), Some(2.0));
        let out = agg
            .aggregate(&[bg("360610001001", 10.0), bg("360610001002", 20.0), bg("360610002001", 40.0)])
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].geoid.as_str(), out[0].geotype), ("101", GeoType::CdFloodplain500));
        assert_eq!(out[0].e, Some(30.0));

        // A subset member with no data leaves the margin undefined.
        let out = agg.aggregate(&[bg("360610001001", 10.0)]).unwrap();
        assert_eq!((out[0].e, out[0].m), (Some(10.0), None));
    }

    #[rstest]
    #[case(Some(10.0), 1.0, Some(50.0), Some(10.0))]
    #[case(Some(10.0), 0.9, Some(45.0), Some(10.0))]
    #[case(Some(10.0), 0.3, Some(0.0), None)]
    #[case(None, 0.3, Some(15.0), None)]
    fn test_reapportion_moe(#[case] m: Option<f64>, #[case] ratio: f64, #[case] e: Option<f64>, #[case] expected: Option<f64>) {
        assert_eq!(reapportion_moe(m, ratio, e), expected);
    }

    #[test]
    fn test_reapportion_moe_scales_small_fragments() {
        let factor = 50.0f64.powf(0.56901) * 7.96309;
        assert!(factor < 100.0);
        let m = reapportion_moe(Some(10.0), 0.5, Some(25.0)).unwrap();
        assert!((m - 10.0 * factor / 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_reapportion_splits_tracts() {
        let reference = reference();
        let agg = ReapportionAggregator::new(&reference);
        let out = agg
            .aggregate(&[tract("000100", Some(100.0), Some(10.0)), tract("000200", Some(40.0), Some(4.0))])
            .unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.geoid.as_str()).collect();
        assert_eq!(ids, vec!["36061000101", "36061000102", "36061000200"]);
        assert_eq!(out[0].e, Some(60.0));
        assert_eq!(out[1].e, Some(40.0));
        assert_eq!((out[2].e, out[2].m), (Some(40.0), Some(4.0)));
        assert!(out.iter().all(|r| r.geotype == GeoType::Tract2020));
    }

    #[test]
    fn test_zero_fragment_leaves_destination_margin_undefined() {
        let ratios = vec![
            RatioEntry { from_geoid: "a".into(), to_geoid: "d".into(), ratio: 0.5 },
            RatioEntry { from_geoid: "b".into(), to_geoid: "d".into(), ratio: 0.5 },
        ];
        let reference = GeographyReference::new(Vec::new(), ratios).unwrap();
        let agg = ReapportionAggregator::new(&reference);
        let rec = |g: &str, e: f64, m: f64| IndicatorRecord::new(g, "pop", GeoType::Tract, Some(e), Some(m));
        let out = agg.aggregate(&[rec("a", 0.0, 0.0), rec("b", 40.0, 4.0)]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].geoid.as_str(), out[0].e, out[0].m), ("d", Some(20.0), None));
    }

    #[test]
    fn test_chain_reapportions_then_crosswalks() {
        let reference = reference();
        let stages: Vec<Box<dyn Aggregator + '_>> = vec![
            Box::new(ReapportionAggregator::new(&reference)),
            Box::new(CrosswalkAggregator::new(&reference, GeoType::Tract2020, GeoType::Cdta)),
        ];
        let chain = ChainedAggregator::new(stages);
        let out = chain
            .aggregate(&[
                tract("000100", Some(100.0), Some(10.0)),
                tract("000200", Some(40.0), Some(4.0)),
                tract("000300", Some(7.0), Some(1.0)),
            ])
            .unwrap();
        assert_eq!(chain.target(), GeoType::Cdta);
        assert_eq!((out[0].geoid.as_str(), out[0].e), ("MN01", Some(140.0)));
        assert_eq!((out[1].geoid.as_str(), out[1].e, out[1].m), ("MN02", Some(7.0), Some(1.0)));
    }
}
