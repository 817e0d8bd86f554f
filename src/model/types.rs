use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a variable's raw fields come from.
///
/// Every kind except `FullCount` carries sampling error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Five-year survey detail tables (`B`/`C` tables).
    #[serde(alias = "acs")]
    DetailTables,
    /// Survey data profile (`DP` tables).
    #[serde(alias = "profile")]
    Profile,
    /// Survey subject tables (`S` tables).
    #[serde(alias = "subject")]
    Subject,
    /// Full-count census, no sampling error.
    #[serde(alias = "decennial")]
    FullCount,
}

impl SourceKind {
    #[inline(always)]
    pub fn is_sampled(&self) -> bool {
        !matches!(self, SourceKind::FullCount)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::DetailTables => "acs",
            SourceKind::Profile => "profile",
            SourceKind::Subject => "subject",
            SourceKind::FullCount => "decennial",
        }
    }
}

/// Vintage of the small-area boundaries the output is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Vintage {
    #[serde(rename = "2010")]
    Boundaries2010,
    /// 2010 tract data re-expressed in 2020 boundaries.
    #[default]
    #[serde(rename = "2010_to_2020")]
    Boundaries2010To2020,
}

impl Vintage {
    pub fn label(&self) -> &'static str {
        match self {
            Vintage::Boundaries2010 => "2010",
            Vintage::Boundaries2010To2020 => "2010_to_2020",
        }
    }
}

/// Geography levels the engine knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeoType {
    #[serde(rename = "city")]
    City,
    #[serde(rename = "borough")]
    Borough,
    #[serde(rename = "tract")]
    Tract,
    #[serde(rename = "CT20")]
    Tract2020,
    #[serde(rename = "block_group")]
    BlockGroup,
    #[serde(rename = "block")]
    Block,
    #[serde(rename = "NTA")]
    Nta,
    #[serde(rename = "CDTA")]
    Cdta,
    #[serde(rename = "cd")]
    CommunityDistrict,
    #[serde(rename = "cd_fp_500")]
    CdFloodplain500,
    #[serde(rename = "cd_fp_100")]
    CdFloodplain100,
    #[serde(rename = "cd_park_access")]
    CdParkAccess,
}

impl GeoType {
    pub const ALL: [GeoType; 12] = [
        GeoType::City,
        GeoType::Borough,
        GeoType::Tract,
        GeoType::Tract2020,
        GeoType::BlockGroup,
        GeoType::Block,
        GeoType::Nta,
        GeoType::Cdta,
        GeoType::CommunityDistrict,
        GeoType::CdFloodplain500,
        GeoType::CdFloodplain100,
        GeoType::CdParkAccess,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            GeoType::City => "city",
            GeoType::Borough => "borough",
            GeoType::Tract => "tract",
            GeoType::Tract2020 => "CT20",
            GeoType::BlockGroup => "block_group",
            GeoType::Block => "block",
            GeoType::Nta => "NTA",
            GeoType::Cdta => "CDTA",
            GeoType::CommunityDistrict => "cd",
            GeoType::CdFloodplain500 => "cd_fp_500",
            GeoType::CdFloodplain100 => "cd_fp_100",
            GeoType::CdParkAccess => "cd_park_access",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.label() == label)
    }

    /// City and borough rows keep a zero margin instead of an undefined one.
    pub fn is_city_or_borough(&self) -> bool {
        matches!(self, GeoType::City | GeoType::Borough)
    }
}

impl fmt::Display for GeoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Membership predicates a crosswalk entry can be annotated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    /// Inside the 500-year flood plain.
    #[serde(alias = "fp_500")]
    Floodplain500,
    /// Inside the 100-year flood plain.
    #[serde(alias = "fp_100")]
    Floodplain100,
    /// Within walking distance of a park.
    ParkAccess,
}

/// Publication domain of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    #[default]
    Demographic,
    Social,
    Economic,
    Housing,
    Decennial,
}

impl Domain {
    pub fn label(&self) -> &'static str {
        match self {
            Domain::Demographic => "demographic",
            Domain::Social => "social",
            Domain::Economic => "economic",
            Domain::Housing => "housing",
            Domain::Decennial => "decennial",
        }
    }
}
