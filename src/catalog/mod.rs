//! The variable catalog: definitions, JSON loading and static checks.
//!
//! Every variable is resolved to a [`VariableKind`] once, when the catalog
//! is loaded, so the aggregation paths never inspect catalog contents at
//! run time.

pub use self::definition::{MedianBin, MedianRange, SpecialDefinition, SpecialFunction, VariableDefinition, VariableKind};
pub use self::error::{CatalogError, IssueKind, ValidationIssue};
pub use self::registry::{Catalog, CatalogDocuments};

mod definition;
mod error;
mod registry;
pub mod topology;
mod validation;
