//! Fixtures shared by unit tests across modules.
use crate::engine::{DataSource, FetchRequest, SourceError};
use crate::model::{GeoParts, GeoType, Observation, ObservationTable, RawField};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A small catalog covering every variable kind.
pub const CATALOG_JSON: &str = r#"{
    "variables": [
        {"pff_variable": "pop_1", "census_variable": ["B01003_001"], "domain": "demographic", "base_variable": "pop_1", "rounding": 0, "source": "acs"},
        {"pff_variable": "fem", "census_variable": ["B01001_026"], "domain": "demographic", "base_variable": "pop_1", "rounding": 0, "source": "acs"},
        {"pff_variable": "pop65pl", "census_variable": ["B01001_020", "B01001_044"], "domain": "demographic", "base_variable": "pop_1", "rounding": 0, "source": "acs"},
        {"pff_variable": "inc_lo", "census_variable": ["B19001_002"], "domain": "economic", "base_variable": "hh", "rounding": 0, "source": "acs"},
        {"pff_variable": "inc_mid", "census_variable": ["B19001_003"], "domain": "economic", "base_variable": "hh", "rounding": 0, "source": "acs"},
        {"pff_variable": "inc_hi", "census_variable": ["B19001_004"], "domain": "economic", "base_variable": "hh", "rounding": 0, "source": "acs"},
        {"pff_variable": "hh", "census_variable": ["B11001_001"], "domain": "economic", "base_variable": "hh", "rounding": 0, "source": "acs"},
        {"pff_variable": "mdhhinc", "census_variable": [], "domain": "economic", "base_variable": null, "rounding": 0, "source": "acs"},
        {"pff_variable": "agghhinc", "census_variable": ["B19025_001"], "domain": "economic", "base_variable": "nan", "rounding": 0, "source": "acs"},
        {"pff_variable": "mnhhinc", "census_variable": [], "domain": "economic", "base_variable": null, "rounding": 0, "source": "acs"},
        {"pff_variable": "f16pl", "census_variable": ["DP03_0010"], "domain": "economic", "base_variable": "pop_1", "rounding": 1, "source": "profile"},
        {"pff_variable": "pop2010", "census_variable": ["P001001"], "domain": "decennial", "base_variable": "pop2010", "rounding": 0, "source": "decennial"}
    ],
    "median": {
        "mdhhinc": {"ranges": {"inc_lo": [0, 10000], "inc_mid": [10000, 20000], "inc_hi": [20000, null]}, "design_factor": 1.5}
    },
    "special": [
        {"pff_variable": "mnhhinc", "base_variables": ["agghhinc", "hh"], "function": "ratio"}
    ],
    "median_input_exceptions": []
}"#;

/// Three 2010 tracts in one borough, their block groups, and the 2020
/// tracts they were split into.
pub const CROSSWALK_JSON: &str = r#"[
    {"fine_type": "tract", "fine_geoid": "36061000100", "coarse_type": "NTA", "coarse_geoid": "MN01"},
    {"fine_type": "tract", "fine_geoid": "36061000200", "coarse_type": "NTA", "coarse_geoid": "MN01"},
    {"fine_type": "tract", "fine_geoid": "36061000300", "coarse_type": "NTA", "coarse_geoid": "MN02"},
    {"fine_type": "tract", "fine_geoid": "36061000100", "coarse_type": "cd", "coarse_geoid": "101"},
    {"fine_type": "tract", "fine_geoid": "36061000200", "coarse_type": "cd", "coarse_geoid": "101"},
    {"fine_type": "tract", "fine_geoid": "36061000300", "coarse_type": "cd", "coarse_geoid": "102"},
    {"fine_type": "block_group", "fine_geoid": "360610001001", "coarse_type": "cd", "coarse_geoid": "101", "memberships": ["fp_100", "fp_500"]},
    {"fine_type": "block_group", "fine_geoid": "360610001002", "coarse_type": "cd", "coarse_geoid": "101", "memberships": ["fp_500"]},
    {"fine_type": "block_group", "fine_geoid": "360610002001", "coarse_type": "cd", "coarse_geoid": "101", "memberships": ["park_access"]},
    {"fine_type": "block", "fine_geoid": "360610001001000", "coarse_type": "cd", "coarse_geoid": "101", "memberships": ["fp_500", "park_access"]},
    {"fine_type": "CT20", "fine_geoid": "36061000101", "coarse_type": "NTA", "coarse_geoid": "MN0101"},
    {"fine_type": "CT20", "fine_geoid": "36061000102", "coarse_type": "NTA", "coarse_geoid": "MN0101"},
    {"fine_type": "CT20", "fine_geoid": "36061000200", "coarse_type": "NTA", "coarse_geoid": "MN0101"},
    {"fine_type": "CT20", "fine_geoid": "36061000300", "coarse_type": "NTA", "coarse_geoid": "MN0102"},
    {"fine_type": "CT20", "fine_geoid": "36061000101", "coarse_type": "CDTA", "coarse_geoid": "MN01"},
    {"fine_type": "CT20", "fine_geoid": "36061000102", "coarse_type": "CDTA", "coarse_geoid": "MN01"},
    {"fine_type": "CT20", "fine_geoid": "36061000200", "coarse_type": "CDTA", "coarse_geoid": "MN01"},
    {"fine_type": "CT20", "fine_geoid": "36061000300", "coarse_type": "CDTA", "coarse_geoid": "MN02"}
]"#;

/// 2010 tract 000100 was split 60/40; the others carried over whole.
pub const RATIO_JSON: &str = r#"[
    {"from_geoid": "36061000100", "to_geoid": "36061000101", "ratio": 0.6},
    {"from_geoid": "36061000100", "to_geoid": "36061000102", "ratio": 0.4},
    {"from_geoid": "36061000200", "to_geoid": "36061000200", "ratio": 1.0},
    {"from_geoid": "36061000300", "to_geoid": "36061000300", "ratio": 1.0}
]"#;

struct MockRow {
    parts: GeoParts,
    values: HashMap<String, RawField>,
}

/// In-memory data source with scripted failures.
#[derive(Default)]
pub struct MockSource {
    rows: HashMap<GeoType, Vec<MockRow>>,
    calls: AtomicUsize,
    transient_failures: AtomicUsize,
    permanent: bool,
}

impl MockSource {
    fn with_row(mut self, geotype: GeoType, parts: GeoParts, values: &[(&str, RawField)]) -> Self {
        let values = values.iter().map(|(f, v)| (f.to_string(), *v)).collect();
        self.rows.entry(geotype).or_default().push(MockRow { parts, values });
        self
    }

    /// A Manhattan tract, `code` being the six-digit tract code.
    pub fn with_tract(self, code: &str, values: &[(&str, RawField)]) -> Self {
        let parts = GeoParts { state: Some("36".into()), county: Some("061".into()), tract: Some(code.into()), ..Default::default() };
        self.with_row(GeoType::Tract, parts, values)
    }

    pub fn with_city(self, values: &[(&str, RawField)]) -> Self {
        let parts = GeoParts { state: Some("36".into()), place: Some("51000".into()), ..Default::default() };
        self.with_row(GeoType::City, parts, values)
    }

    /// The next `n` fetches fail with a transient error.
    pub fn failing_transiently(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn failing_permanently(mut self) -> Self {
        self.permanent = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataSource for MockSource {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<ObservationTable, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.permanent {
            return Err(SourceError::Permanent(format!("no table for {}", request.variable)));
        }
        let scripted = self.transient_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if scripted.is_ok() {
            return Err(SourceError::Transient("503 Service Unavailable".into()));
        }

        let rows = self
            .rows
            .get(&request.geotype)
            .map(|rows| {
                rows.iter()
                    .map(|row| Observation {
                        parts: row.parts.clone(),
                        fields: request.fields.iter().map(|f| row.values.get(f).copied().unwrap_or_default()).collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ObservationTable { geotype: Some(request.geotype), rows })
    }
}
