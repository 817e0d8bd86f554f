//! Static table of which level a target geography is built from, and how.
use super::aggregate::{Aggregator, ChainedAggregator, CrosswalkAggregator, MembershipAggregator, ReapportionAggregator};
use super::crosswalk::GeographyReference;
use crate::model::{GeoType, Membership, SourceKind, Vintage};

/// How a fine level is rolled up. Bound to reference data with [`Route::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStrategy {
    Crosswalk,
    /// Crosswalk to `via`, keeping only fine units with `membership`.
    MembershipFilter { via: GeoType, membership: Membership },
    Reapportion,
    /// Reapportion to 2020 tracts, then crosswalk from there.
    ReapportionThenCrosswalk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Level the raw fields are fetched at.
    pub from: GeoType,
    pub to: GeoType,
    /// `None` when the target is fetched directly.
    pub strategy: Option<AggregationStrategy>,
}

type RouteEntry = (GeoType, GeoType, AggregationStrategy);

use AggregationStrategy::*;
use GeoType::*;

const SAMPLED_2010: &[RouteEntry] = &[
    (Tract, Nta, Crosswalk),
    (Tract, CommunityDistrict, Crosswalk),
    (BlockGroup, CdFloodplain500, MembershipFilter { via: CommunityDistrict, membership: Membership::Floodplain500 }),
    (BlockGroup, CdFloodplain100, MembershipFilter { via: CommunityDistrict, membership: Membership::Floodplain100 }),
    (BlockGroup, CdParkAccess, MembershipFilter { via: CommunityDistrict, membership: Membership::ParkAccess }),
];

const FULL_COUNT_2010: &[RouteEntry] = &[
    (Block, CdFloodplain500, MembershipFilter { via: CommunityDistrict, membership: Membership::Floodplain500 }),
    (Block, CdFloodplain100, MembershipFilter { via: CommunityDistrict, membership: Membership::Floodplain100 }),
    (Block, CdParkAccess, MembershipFilter { via: CommunityDistrict, membership: Membership::ParkAccess }),
    (Tract, Nta, Crosswalk),
    (Tract, CommunityDistrict, Crosswalk),
];

const SAMPLED_2010_TO_2020: &[RouteEntry] = &[
    (Tract, Tract2020, Reapportion),
    (Tract, Nta, ReapportionThenCrosswalk),
    (Tract, Cdta, ReapportionThenCrosswalk),
];

const FULL_COUNT_2010_TO_2020: &[RouteEntry] = &[(Tract2020, Nta, Crosswalk), (Tract2020, Cdta, Crosswalk)];

/// Every route available for a vintage and source family.
pub fn routes(vintage: Vintage, source: SourceKind) -> &'static [RouteEntry] {
    match (vintage, source.is_sampled()) {
        (Vintage::Boundaries2010, true) => SAMPLED_2010,
        (Vintage::Boundaries2010, false) => FULL_COUNT_2010,
        (Vintage::Boundaries2010To2020, true) => SAMPLED_2010_TO_2020,
        (Vintage::Boundaries2010To2020, false) => FULL_COUNT_2010_TO_2020,
    }
}

/// Looks up how `target` is produced; targets without an entry are fetched
/// as they are.
pub fn route(vintage: Vintage, source: SourceKind, target: GeoType) -> Route {
    routes(vintage, source)
        .iter()
        .find(|(_, to, _)| *to == target)
        .map(|&(from, to, strategy)| Route { from, to, strategy: Some(strategy) })
        .unwrap_or(Route { from: target, to: target, strategy: None })
}

impl Route {
    pub fn is_aggregated(&self) -> bool {
        self.strategy.is_some()
    }

    pub fn bind<'a>(&self, reference: &'a GeographyReference) -> Option<Box<dyn Aggregator + 'a>> {
        let strategy = self.strategy?;
        let aggregator: Box<dyn Aggregator + 'a> = match strategy {
            Crosswalk => Box::new(CrosswalkAggregator::new(reference, self.from, self.to)),
            MembershipFilter { via, membership } => {
                Box::new(MembershipAggregator::new(reference, self.from, via, membership, self.to))
            }
            Reapportion => Box::new(ReapportionAggregator::new(reference)),
            ReapportionThenCrosswalk => {
                let stages: Vec<Box<dyn Aggregator + 'a>> = vec![
                    Box::new(ReapportionAggregator::new(reference)),
                    Box::new(CrosswalkAggregator::new(reference, Tract2020, self.to)),
                ];
                Box::new(ChainedAggregator::new(stages))
            }
        };
        Some(aggregator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndicatorRecord;
    use crate::testutil::{CROSSWALK_JSON, RATIO_JSON};

    #[test]
    fn test_city_and_borough_pass_through() {
        for vintage in [Vintage::Boundaries2010, Vintage::Boundaries2010To2020] {
            for target in [City, Borough] {
                let r = route(vintage, SourceKind::DetailTables, target);
                assert_eq!((r.from, r.strategy), (target, None));
            }
        }
    }

    #[test]
    fn test_routes_depend_on_source_and_vintage() {
        let fp = route(Vintage::Boundaries2010, SourceKind::DetailTables, CdFloodplain100);
        assert_eq!(fp.from, BlockGroup);
        let fp = route(Vintage::Boundaries2010, SourceKind::FullCount, CdFloodplain100);
        assert_eq!(fp.from, Block);

        let nta = route(Vintage::Boundaries2010To2020, SourceKind::Profile, Nta);
        assert_eq!((nta.from, nta.strategy), (Tract, Some(ReapportionThenCrosswalk)));
        let nta = route(Vintage::Boundaries2010To2020, SourceKind::FullCount, Nta);
        assert_eq!((nta.from, nta.strategy), (Tract2020, Some(Crosswalk)));
    }

    #[test]
    fn test_bound_route_aggregates() {
        let reference = GeographyReference::from_json(CROSSWALK_JSON, RATIO_JSON).unwrap();
        let r = route(Vintage::Boundaries2010To2020, SourceKind::DetailTables, Cdta);
        let agg = r.bind(&reference).unwrap();
        assert_eq!(agg.target(), Cdta);
        let records = vec![IndicatorRecord::new("36061000300", "pop", Tract, Some(7.0), Some(1.0))];
        let out = agg.aggregate(&records).unwrap();
        assert_eq!((out[0].geoid.as_str(), out[0].geotype), ("MN02", Cdta));

        assert!(route(Vintage::Boundaries2010, SourceKind::DetailTables, Tract).bind(&reference).is_none());
    }
}
