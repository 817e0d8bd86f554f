//! The orchestrator: resolves a variable's kind, routes it through the
//! stages and reads through the result cache.
use super::config::EngineConfig;
use super::error::EngineError;
use super::pool::WorkerPool;
use super::retry::RetryPolicy;
use super::source::{DataSource, FetchRequest};
use super::store::{CacheKey, FileStore, MemoryStore, ResultStore};
use crate::catalog::{Catalog, VariableDefinition, VariableKind};
use crate::compute::{cleaner, derived, horizontal, median, rounding, special, CleaningContext};
use crate::geography::{registry, GeographyReference};
use crate::model::{DerivedRecord, GeoType, IndicatorRecord, ObservationTable, PercentPair};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Suffix of the cache entry holding a profile field's published (p, z).
const PUBLISHED_PERCENT: &str = "#published_percent";

pub struct Calculator {
    config: EngineConfig,
    catalog: Arc<Catalog>,
    geography: Arc<GeographyReference>,
    source: Arc<dyn DataSource>,
    store: Arc<dyn ResultStore>,
    pool: WorkerPool,
    retry: RetryPolicy,
}

impl Calculator {
    /// Uses a file-backed store when `config.cache_dir` is set, an
    /// in-memory one otherwise.
    pub fn new(
        config: EngineConfig,
        catalog: Arc<Catalog>,
        geography: Arc<GeographyReference>,
        source: Arc<dyn DataSource>,
    ) -> Result<Self, EngineError> {
        let store: Arc<dyn ResultStore> = match &config.cache_dir {
            Some(dir) => Arc::new(FileStore::new(dir)),
            None => Arc::new(MemoryStore::default()),
        };
        Self::with_store(config, catalog, geography, source, store)
    }

    pub fn with_store(
        config: EngineConfig,
        catalog: Arc<Catalog>,
        geography: Arc<GeographyReference>,
        source: Arc<dyn DataSource>,
        store: Arc<dyn ResultStore>,
    ) -> Result<Self, EngineError> {
        let pool = WorkerPool::new(config.workers)?;
        let retry = config.retry_policy();
        Ok(Self { config, catalog, geography, source, store, pool, retry })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn key(&self, variable: &str, geotype: GeoType) -> CacheKey {
        CacheKey {
            period: self.config.year.clone(),
            source: self.config.source.clone(),
            vintage: self.config.vintage,
            geotype,
            variable: variable.to_string(),
        }
    }

    /// Published rows (c, e, m, p, z) for one variable at one geography,
    /// rounded and cleaned, ordered by geoid.
    pub fn calculate(&self, variable: &str, geotype: GeoType) -> Result<Vec<DerivedRecord>, EngineError> {
        let unit = format!("{}@{}", variable, geotype);
        self.retry.run(&unit, || self.calculate_once(variable, geotype))
    }

    fn calculate_once(&self, variable: &str, geotype: GeoType) -> Result<Vec<DerivedRecord>, EngineError> {
        let def = self.catalog.get(variable)?;
        let route = registry::route(self.config.vintage, def.source, geotype);

        let mut rows = match def.kind {
            VariableKind::ProfileOnly if !route.is_aggregated() => self.published_rows(def, geotype)?,
            _ => {
                let estimates = self.calculate_e_m(variable, geotype)?;
                self.derived_rows(def, geotype, &estimates)?
            }
        };

        let ctx = CleaningContext {
            is_base: def.is_base(),
            is_median: def.is_median(),
            is_median_input: self.catalog.is_median_input(&def.id),
            is_median_input_exception: self.catalog.is_median_input_exception(&def.id),
            geotype,
            sampled: def.has_sampling_error(),
        };
        for row in &mut rows {
            rounding::round_record(row, def.rounding);
            cleaner::clean(row, &ctx);
        }
        rows.sort_by(|a, b| a.geoid.cmp(&b.geoid));
        info!(variable, geotype = %geotype, kind = def.kind.tag(), rows = rows.len(), "calculated");
        Ok(rows)
    }

    fn derived_rows(&self, def: &VariableDefinition, geotype: GeoType, estimates: &[IndicatorRecord]) -> Result<Vec<DerivedRecord>, EngineError> {
        if let Some(companion) = &def.percent_from {
            let percents = self.calculate_e_m(companion, geotype)?;
            let by_geoid: HashMap<&str, &IndicatorRecord> = percents.iter().map(|r| (r.geoid.as_str(), r)).collect();
            return Ok(estimates
                .iter()
                .map(|r| {
                    let pair = by_geoid.get(r.geoid.as_str()).map_or(PercentPair::default(), |c| PercentPair { p: c.e, z: c.m });
                    derived::with_published_percent(r, pair, def.domain)
                })
                .collect());
        }

        let base = match (&def.kind, &def.base) {
            (VariableKind::Median(_) | VariableKind::Special(_), _) | (_, None) => None,
            (_, Some(base)) => Some(self.calculate_e_m(base, geotype)?),
        };
        Ok(derived::derive_table(estimates, base.as_deref(), def.domain))
    }

    /// Profile fields at a fetched level: (p, z) come from the source.
    fn published_rows(&self, def: &VariableDefinition, geotype: GeoType) -> Result<Vec<DerivedRecord>, EngineError> {
        let em_key = self.key(&def.id, geotype);
        let pct_key = self.key(&format!("{}{}", def.id, PUBLISHED_PERCENT), geotype);

        let (estimates, percents) = match (self.store.read(&em_key)?, self.store.read(&pct_key)?) {
            (Some(estimates), Some(percents)) => {
                debug!(variable = %def.id, geotype = %geotype, "cache hit");
                (estimates, percents)
            }
            _ => {
                debug!(variable = %def.id, geotype = %geotype, "cache miss");
                let table = self.fetch(def, geotype)?;
                let rows = horizontal::profile_fields(def, geotype, &table)?;
                let percents: Vec<IndicatorRecord> = rows
                    .iter()
                    .map(|(r, pct)| IndicatorRecord::new(r.geoid.as_str(), r.variable.as_str(), geotype, pct.p, pct.z))
                    .collect();
                let estimates: Vec<IndicatorRecord> = rows.into_iter().map(|(r, _)| r).collect();
                self.store.write_if_absent(&em_key, &estimates)?;
                self.store.write_if_absent(&pct_key, &percents)?;
                (estimates, percents)
            }
        };

        let by_geoid: HashMap<&str, &IndicatorRecord> = percents.iter().map(|r| (r.geoid.as_str(), r)).collect();
        Ok(estimates
            .iter()
            .map(|r| {
                let pair = by_geoid.get(r.geoid.as_str()).map_or(PercentPair::default(), |pct| PercentPair { p: pct.e, z: pct.m });
                derived::with_published_percent(r, pair, def.domain)
            })
            .collect())
    }

    /// The (e, m) table of one variable at one geography, read through the
    /// result cache.
    pub fn calculate_e_m(&self, variable: &str, geotype: GeoType) -> Result<Vec<IndicatorRecord>, EngineError> {
        let key = self.key(variable, geotype);
        if let Some(hit) = self.store.read(&key)? {
            debug!(variable, geotype = %geotype, "cache hit");
            return Ok(hit);
        }
        debug!(variable, geotype = %geotype, "cache miss");

        let def = self.catalog.get(variable)?;
        let records = match &def.kind {
            VariableKind::Median(range) => {
                let bins: Vec<&str> = range.bin_variables().collect();
                let inputs = self.calculate_e_m_many(&bins, geotype)?;
                median::estimate_table(variable, geotype, range, &inputs)?
            }
            VariableKind::Special(composite) => {
                let inputs = self.pool.map(composite.base_variables.as_slice(), |v| self.calculate_e_m(v, geotype))?;
                special::combine_tables(variable, geotype, composite, &inputs)?
            }
            VariableKind::Base | VariableKind::Derived | VariableKind::ProfileOnly => self.aggregate_fields(def, geotype)?,
        };

        self.store.write_if_absent(&key, &records)?;
        Ok(records)
    }

    /// Independent variables on the worker pool, concatenated and ordered by
    /// (variable, geoid).
    pub fn calculate_e_m_many(&self, variables: &[&str], geotype: GeoType) -> Result<Vec<IndicatorRecord>, EngineError> {
        let tables = self.pool.map(variables, |v| self.calculate_e_m(v, geotype))?;
        let mut out: Vec<IndicatorRecord> = tables.into_iter().flatten().collect();
        out.sort_by(|a, b| (a.variable.as_str(), a.geoid.as_str()).cmp(&(b.variable.as_str(), b.geoid.as_str())));
        Ok(out)
    }

    fn aggregate_fields(&self, def: &VariableDefinition, geotype: GeoType) -> Result<Vec<IndicatorRecord>, EngineError> {
        let route = registry::route(self.config.vintage, def.source, geotype);
        debug!(variable = %def.id, from = %route.from, to = %geotype, strategy = ?route.strategy, "route");
        let table = self.fetch(def, route.from)?;
        let records = horizontal::aggregate(def, route.from, &table)?;
        match route.bind(&self.geography) {
            Some(aggregator) => Ok(aggregator.aggregate(&records)?),
            None => Ok(records),
        }
    }

    fn fetch(&self, def: &VariableDefinition, geotype: GeoType) -> Result<ObservationTable, EngineError> {
        let request = FetchRequest {
            variable: &def.id,
            fields: def.fields.as_slice(),
            source: def.source,
            geotype,
            year: &self.config.year,
        };
        self.source
            .fetch(&request)
            .map_err(|source| EngineError::Source { variable: def.id.clone(), geotype, source })
    }

    /// Computes every unit on the pool. A failing unit is reported and
    /// skipped; the rest still complete.
    pub fn run_batch(&self, units: &[(String, GeoType)]) -> BatchReport {
        let results = self.pool.map_all(units, |(variable, geotype)| self.calculate(variable, *geotype));

        let mut report = BatchReport::default();
        for ((variable, geotype), result) in units.iter().zip(results) {
            match result {
                Ok(rows) => {
                    report.records.extend(rows);
                    report.outcomes.push(UnitOutcome { variable: variable.clone(), geotype: *geotype, error: None });
                }
                Err(e) => {
                    error!(variable = %variable, geotype = %geotype, error = %e, "unit failed");
                    report.outcomes.push(UnitOutcome { variable: variable.clone(), geotype: *geotype, error: Some(e.to_string()) });
                }
            }
        }
        info!(units = units.len(), failed = report.failed().count(), "batch finished");
        report
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitOutcome {
    pub variable: String,
    pub geotype: GeoType,
    /// `None` on success.
    pub error: Option<String>,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a batch produced, plus one outcome per requested unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub records: Vec<DerivedRecord>,
    pub outcomes: Vec<UnitOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}
