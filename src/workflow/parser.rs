//! Catalog Parser
//!
//! Loads workflow catalogs from YAML files. Parsing produces a
//! [`CatalogDocument`]; validation happens when the document is turned
//! into a [`WorkflowCatalog`].

use std::fs;
use std::path::Path;

use log::{debug, info};

use super::catalog::WorkflowCatalog;
use super::model::CatalogDocument;
use crate::error::CatalogError;

/// Parses a catalog from YAML text.
pub fn parse_catalog(yaml_content: &str) -> Result<WorkflowCatalog, CatalogError> {
    let document: CatalogDocument = serde_yaml::from_str(yaml_content)?;

    info!(
        "Parsed {} workflows, {} steps total",
        document.workflows.len(),
        document.workflows.iter().map(|w| w.steps.len()).sum::<usize>()
    );

    WorkflowCatalog::new(document.workflows)
}

/// Loads a workflow catalog from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use orderflow::workflow::load_catalog;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let catalog = load_catalog("workflows.yaml")?;
///     println!("Loaded {} workflows", catalog.len());
///     Ok(())
/// }
/// ```
pub fn load_catalog(path: impl AsRef<Path>) -> Result<WorkflowCatalog, CatalogError> {
    let path = path.as_ref();
    info!("Loading workflow catalog from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    parse_catalog(&yaml_content)
}
