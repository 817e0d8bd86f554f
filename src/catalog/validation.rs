//! Static checks run once over a freshly loaded catalog.
use super::definition::{MedianRange, VariableDefinition, VariableKind};
use super::error::{IssueKind, ValidationIssue};
use super::registry::Catalog;

/// Runs every rule against every variable and collects all issues, like a
/// linter, instead of stopping at the first.
pub(crate) fn validate(catalog: &Catalog) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    for def in catalog.iter() {
        check_references(catalog, def, &mut issues);
        match &def.kind {
            VariableKind::Base | VariableKind::Derived | VariableKind::ProfileOnly => {
                if def.fields.is_empty() {
                    issues.push(issue(def, IssueKind::NoFields, "variable has no raw source fields".into()));
                }
            }
            VariableKind::Median(range) => check_range(catalog, def, range, &mut issues),
            VariableKind::Special(special) => {
                if special.base_variables.len() != special.function.arity() {
                    issues.push(issue(
                        def,
                        IssueKind::Arity,
                        format!(
                            "function {:?} takes {} constituents, got {}",
                            special.function,
                            special.function.arity(),
                            special.base_variables.len()
                        ),
                    ));
                }
                for base in &special.base_variables {
                    if !catalog.contains(base) {
                        issues.push(issue(def, IssueKind::DanglingReference, format!("constituent '{}' is not defined", base)));
                    }
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn check_references(catalog: &Catalog, def: &VariableDefinition, issues: &mut Vec<ValidationIssue>) {
    if let Some(base) = &def.base {
        if !catalog.contains(base) {
            issues.push(issue(def, IssueKind::DanglingReference, format!("base variable '{}' is not defined", base)));
        }
    }
    if let Some(companion) = &def.percent_from {
        if !catalog.contains(companion) {
            issues.push(issue(def, IssueKind::DanglingReference, format!("percent companion '{}' is not defined", companion)));
        }
    }
}

fn check_range(catalog: &Catalog, def: &VariableDefinition, range: &MedianRange, issues: &mut Vec<ValidationIssue>) {
    if !(range.design_factor.is_finite() && range.design_factor > 0.0) {
        issues.push(issue(def, IssueKind::DesignFactor, format!("design factor {} must be positive", range.design_factor)));
    }
    if range.len() < 2 {
        issues.push(issue(def, IssueKind::MalformedBins, "a median needs at least two bins".into()));
    }

    let mut previous_lower = f64::NEG_INFINITY;
    for bin in &range.bins {
        if !catalog.contains(&bin.variable) {
            issues.push(issue(def, IssueKind::DanglingReference, format!("bin variable '{}' is not defined", bin.variable)));
        }
        if !(bin.lower < bin.upper) {
            issues.push(issue(
                def,
                IssueKind::MalformedBins,
                format!("bin '{}' has lower {} not below upper {}", bin.variable, bin.lower, bin.upper),
            ));
        }
        if bin.lower <= previous_lower {
            issues.push(issue(def, IssueKind::MalformedBins, format!("bin '{}' is out of order", bin.variable)));
        }
        previous_lower = bin.lower;
    }
}

fn issue(def: &VariableDefinition, kind: IssueKind, message: String) -> ValidationIssue {
    ValidationIssue { variable: def.id.clone(), kind, message }
}
