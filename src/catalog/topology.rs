use super::definition::{VariableDefinition, VariableKind};
use super::error::CatalogError;
use super::registry::Catalog;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use std::collections::{HashMap, HashSet};

/// Variables `def` needs before it can be computed. A variable that is its
/// own base does not depend on itself.
pub fn dependencies(def: &VariableDefinition) -> Vec<&str> {
    let mut deps: Vec<&str> = Vec::new();
    if let Some(base) = def.base.as_deref() {
        if base != def.id {
            deps.push(base);
        }
    }
    if let Some(companion) = def.percent_from.as_deref() {
        deps.push(companion);
    }
    match &def.kind {
        VariableKind::Median(range) => deps.extend(range.bin_variables()),
        VariableKind::Special(special) => deps.extend(special.base_variables.iter().map(String::as_str)),
        _ => {}
    }
    deps
}

struct DependencyGraph<'a> {
    graph: DiGraph<&'a str, ()>,
    index: HashMap<&'a str, NodeIndex>,
}

/// Edges run dependency -> dependent.
fn build(catalog: &Catalog) -> DependencyGraph<'_> {
    let mut graph = DiGraph::new();
    let mut index = HashMap::new();
    for def in catalog.iter() {
        let node = graph.add_node(def.id.as_str());
        index.insert(def.id.as_str(), node);
    }
    for def in catalog.iter() {
        let target = index[def.id.as_str()];
        for dep in dependencies(def) {
            if let Some(&source) = index.get(dep) {
                graph.add_edge(source, target, ());
            }
        }
    }
    DependencyGraph { graph, index }
}

/// Every catalog variable, each after all of its dependencies.
pub fn dependency_order(catalog: &Catalog) -> Result<Vec<String>, CatalogError> {
    let deps = build(catalog);
    toposort(&deps.graph, None)
        .map(|order| order.into_iter().map(|n| deps.graph[n].to_string()).collect())
        .map_err(|cycle| CatalogError::Cycle { variable: deps.graph[cycle.node_id()].to_string() })
}

/// `roots` plus everything they transitively need, dependencies first.
pub fn closure(catalog: &Catalog, roots: &[&str]) -> Result<Vec<String>, CatalogError> {
    let deps = build(catalog);
    let reversed = Reversed(&deps.graph);
    let mut needed = HashSet::new();
    for root in roots {
        let start = *deps.index.get(root).ok_or_else(|| CatalogError::UnknownVariable(root.to_string()))?;
        let mut dfs = Dfs::new(reversed, start);
        while let Some(node) = dfs.next(reversed) {
            needed.insert(node);
        }
    }
    let order = toposort(&deps.graph, None)
        .map_err(|cycle| CatalogError::Cycle { variable: deps.graph[cycle.node_id()].to_string() })?;
    Ok(order.into_iter().filter(|n| needed.contains(n)).map(|n| deps.graph[n].to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::CATALOG_JSON;

    #[test]
    fn test_dependencies_come_first() {
        let catalog = Catalog::from_json(CATALOG_JSON).unwrap();
        let order = dependency_order(&catalog).unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("pop_1") < pos("fem"));
        assert!(pos("inc_lo") < pos("mdhhinc"));
        assert!(pos("inc_hi") < pos("mdhhinc"));
        assert!(pos("agghhinc") < pos("mnhhinc"));
        assert!(pos("hh") < pos("mnhhinc"));
    }

    #[test]
    fn test_closure_only_pulls_what_is_needed() {
        let catalog = Catalog::from_json(CATALOG_JSON).unwrap();
        let needed = closure(&catalog, &["mnhhinc"]).unwrap();
        assert_eq!(needed.len(), 3);
        assert_eq!(needed.last().map(String::as_str), Some("mnhhinc"));
        assert!(needed.contains(&"agghhinc".to_string()));
        assert!(!needed.contains(&"pop_1".to_string()));
    }

    #[test]
    fn test_cycle_is_rejected_at_load() {
        let json = r#"{
            "variables": [
                {"pff_variable": "a", "census_variable": ["X_1"], "base_variable": "b", "source": "acs"},
                {"pff_variable": "b", "census_variable": ["X_2"], "base_variable": "a", "source": "acs"}
            ]
        }"#;
        let err = Catalog::from_json(json).unwrap_err();
        assert!(matches!(err, CatalogError::Cycle { .. }), "got {}", err);
    }
}
