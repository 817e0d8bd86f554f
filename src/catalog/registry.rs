//! Loads the variable catalog from its JSON documents and resolves every
//! variable to a [`VariableKind`] once.

use super::definition::{MedianBin, MedianRange, SpecialDefinition, SpecialFunction, VariableDefinition, VariableKind};
use super::error::CatalogError;
use super::{topology, validation};
use crate::model::{Domain, SourceKind};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Profile fields whose numerator comes from a profile table but whose base
/// differs from the one the profile publishes.
pub const PROFILE_ONLY_EXCEPTIONS: [&str; 10] = [
    "abroad", "cvlfuem2", "dfhsdfcnt", "dfhssmcnt", "dfhsus", "hh5", "oochu4", "p65plbwpv", "pbwpv", "pu18bwpv",
];

const DEFAULT_DESIGN_FACTOR: f64 = 1.1;

#[derive(Debug, Clone, Deserialize)]
pub struct VariableDocument {
    pub pff_variable: String,
    #[serde(default)]
    pub census_variable: Vec<String>,
    #[serde(default)]
    pub domain: Domain,
    #[serde(default, deserialize_with = "deserialize_base")]
    pub base_variable: Option<String>,
    #[serde(default)]
    pub rounding: i32,
    pub source: SourceKind,
    #[serde(default)]
    pub percent_from: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MedianDocument {
    /// `bin variable -> [lower, upper]`, upper may be null for the top bin.
    pub ranges: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_design_factor")]
    pub design_factor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecialDocument {
    pub pff_variable: String,
    pub base_variables: Vec<String>,
    pub function: SpecialFunction,
}

/// The raw catalog, as read from disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogDocuments {
    pub variables: Vec<VariableDocument>,
    #[serde(default)]
    pub median: HashMap<String, MedianDocument>,
    #[serde(default)]
    pub special: Vec<SpecialDocument>,
    #[serde(default)]
    pub median_input_exceptions: Vec<String>,
    #[serde(default)]
    pub profile_only_exceptions: Option<Vec<String>>,
}

fn default_design_factor() -> f64 {
    DEFAULT_DESIGN_FACTOR
}

/// Accepts `null`, `""` and the `"nan"` sentinel as "no base".
fn deserialize_base<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan") && !s.eq_ignore_ascii_case("none")))
}

/// Immutable, validated variable catalog. Loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    variables: HashMap<String, VariableDefinition>,
    order: Vec<String>,
    median_inputs: HashSet<String>,
    median_input_exceptions: HashSet<String>,
}

impl Catalog {
    /// Reads `metadata.json`, `median.json` and `special.json` from `dir`.
    /// The latter two are optional.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let variables: Vec<VariableDocument> = read_json(&dir.join("metadata.json"))?;
        let median = read_optional_json(&dir.join("median.json"))?.unwrap_or_default();
        let special = read_optional_json(&dir.join("special.json"))?.unwrap_or_default();
        let exceptions = read_optional_json(&dir.join("median_input_exceptions.json"))?.unwrap_or_default();
        Self::from_documents(CatalogDocuments {
            variables,
            median,
            special,
            median_input_exceptions: exceptions,
            profile_only_exceptions: None,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let docs: CatalogDocuments = serde_json::from_str(json)
            .map_err(|source| CatalogError::Parse { path: "<inline>".into(), source })?;
        Self::from_documents(docs)
    }

    pub fn from_documents(docs: CatalogDocuments) -> Result<Self, CatalogError> {
        let mut medians = HashMap::with_capacity(docs.median.len());
        for (id, doc) in &docs.median {
            medians.insert(id.clone(), parse_range(id, doc)?);
        }
        let specials: HashMap<&str, &SpecialDocument> =
            docs.special.iter().map(|s| (s.pff_variable.as_str(), s)).collect();
        let referenced_bases: HashSet<&str> =
            docs.variables.iter().filter_map(|v| v.base_variable.as_deref()).collect();
        let profile_exceptions: HashSet<String> = match &docs.profile_only_exceptions {
            Some(list) => list.iter().cloned().collect(),
            None => PROFILE_ONLY_EXCEPTIONS.iter().map(|s| s.to_string()).collect(),
        };

        let mut variables = HashMap::with_capacity(docs.variables.len());
        let mut order = Vec::with_capacity(docs.variables.len());
        for doc in &docs.variables {
            let kind = if let Some(range) = medians.remove(&doc.pff_variable) {
                VariableKind::Median(range)
            } else if let Some(special) = specials.get(doc.pff_variable.as_str()) {
                VariableKind::Special(SpecialDefinition {
                    base_variables: special.base_variables.clone(),
                    function: special.function,
                })
            } else if referenced_bases.contains(doc.pff_variable.as_str()) {
                VariableKind::Base
            } else if is_profile_only(doc, &profile_exceptions) {
                VariableKind::ProfileOnly
            } else {
                VariableKind::Derived
            };

            let def = VariableDefinition {
                id: doc.pff_variable.clone(),
                fields: doc.census_variable.iter().cloned().collect(),
                source: doc.source,
                base: doc.base_variable.clone(),
                rounding: doc.rounding,
                domain: doc.domain,
                percent_from: doc.percent_from.clone(),
                kind,
            };
            if variables.insert(def.id.clone(), def).is_none() {
                order.push(doc.pff_variable.clone());
            }
        }

        // Medians whose id has no metadata row still need a definition.
        for (id, range) in medians {
            let source = range
                .bins
                .first()
                .and_then(|b| docs.variables.iter().find(|v| v.pff_variable == b.variable))
                .map(|v| v.source)
                .unwrap_or(SourceKind::DetailTables);
            order.push(id.clone());
            variables.insert(id.clone(), VariableDefinition {
                id,
                fields: Default::default(),
                source,
                base: None,
                rounding: 0,
                domain: Domain::default(),
                percent_from: None,
                kind: VariableKind::Median(range),
            });
        }

        let median_inputs = variables
            .values()
            .filter_map(|v| match &v.kind {
                VariableKind::Median(range) => Some(range.bin_variables().map(str::to_string).collect::<Vec<_>>()),
                _ => None,
            })
            .flatten()
            .collect();

        let catalog = Self {
            variables,
            order,
            median_inputs,
            median_input_exceptions: docs.median_input_exceptions.into_iter().collect(),
        };

        validation::validate(&catalog).map_err(CatalogError::Invalid)?;
        topology::dependency_order(&catalog)?;
        debug!(variables = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&VariableDefinition, CatalogError> {
        self.variables.get(id).ok_or_else(|| CatalogError::UnknownVariable(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.variables.contains_key(id)
    }

    /// Definitions in catalog document order.
    pub fn iter(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.order.iter().filter_map(|id| self.variables.get(id))
    }

    /// True for bin-component variables that exist only to feed a median.
    pub fn is_median_input(&self, id: &str) -> bool {
        self.median_inputs.contains(id)
    }

    /// Bin components that are still published on their own (room counts).
    pub fn is_median_input_exception(&self, id: &str) -> bool {
        self.median_input_exceptions.contains(id)
    }

    pub fn base_variables(&self) -> Vec<&str> {
        self.ids_where(|v| matches!(v.kind, VariableKind::Base))
    }

    pub fn median_variables(&self) -> Vec<&str> {
        self.ids_where(|v| matches!(v.kind, VariableKind::Median(_)))
    }

    pub fn special_variables(&self) -> Vec<&str> {
        self.ids_where(|v| matches!(v.kind, VariableKind::Special(_)))
    }

    pub fn profile_only_variables(&self) -> Vec<&str> {
        self.ids_where(|v| matches!(v.kind, VariableKind::ProfileOnly))
    }

    pub fn variables_in_domain(&self, domain: Domain) -> Vec<&str> {
        self.ids_where(|v| v.domain == domain)
    }

    fn ids_where(&self, pred: impl Fn(&VariableDefinition) -> bool) -> Vec<&str> {
        self.iter().filter(|v| pred(v)).map(|v| v.id.as_str()).collect()
    }
}

fn is_profile_only(doc: &VariableDocument, exceptions: &HashSet<String>) -> bool {
    doc.census_variable.len() == 1
        && doc.census_variable[0].starts_with("DP")
        && !exceptions.contains(&doc.pff_variable)
}

fn parse_range(id: &str, doc: &MedianDocument) -> Result<MedianRange, CatalogError> {
    let mut bins = Vec::with_capacity(doc.ranges.len());
    for (variable, value) in &doc.ranges {
        let (lower, upper): (f64, Option<f64>) = serde_json::from_value(value.clone()).map_err(|e| {
            CatalogError::MalformedRange { variable: id.to_string(), msg: format!("bin '{}': {}", variable, e) }
        })?;
        bins.push(MedianBin { variable: variable.clone(), lower, upper: upper.unwrap_or(f64::INFINITY) });
    }
    Ok(MedianRange { bins, design_factor: doc.design_factor })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let text = fs::read_to_string(path).map_err(|source| CatalogError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text).map_err(|source| CatalogError::Parse { path: path.to_path_buf(), source })
}

fn read_optional_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, CatalogError> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}
