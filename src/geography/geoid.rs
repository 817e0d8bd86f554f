//! Assembles geography identifiers from the parts a data source reports.
use crate::compute::ComputationError;
use crate::model::{GeoParts, GeoType};

fn part(value: &Option<String>, geotype: GeoType, name: &'static str) -> Result<String, ComputationError> {
    value.clone().ok_or(ComputationError::MissingGeoPart { geotype, part: name })
}

/// The census identifier of a row fetched at `geotype`.
///
/// City is state + place, borough is state + county, a tract appends its
/// code to the borough id; block groups and blocks append theirs to the
/// tract id.
pub fn census_geoid(geotype: GeoType, parts: &GeoParts) -> Result<String, ComputationError> {
    let state = || part(&parts.state, geotype, "state");
    let county = || part(&parts.county, geotype, "county");
    let tract = || part(&parts.tract, geotype, "tract");

    match geotype {
        GeoType::City => Ok(format!("{}{}", state()?, part(&parts.place, geotype, "place")?)),
        GeoType::Borough => Ok(format!("{}{}", state()?, county()?)),
        GeoType::Tract | GeoType::Tract2020 => Ok(format!("{}{}{}", state()?, county()?, tract()?)),
        GeoType::BlockGroup => {
            Ok(format!("{}{}{}{}", state()?, county()?, tract()?, part(&parts.block_group, geotype, "block_group")?))
        }
        GeoType::Block => Ok(format!("{}{}{}{}", state()?, county()?, tract()?, part(&parts.block, geotype, "block")?)),
        other => Err(ComputationError::NotFetchable(other)),
    }
}
