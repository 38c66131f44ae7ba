//! Loading a catalog from a directory of JSON class documents.

use crate::catalog::{Catalog, CatalogBuilder};
use crate::error::CatalogError;
use crate::model::ClassDocument;
use std::fs;
use std::path::{Path, PathBuf};

/// Build the catalog `name` from every `*.json` file directly inside `dir`.
///
/// Files are read in file-name order; anything without a `.json`
/// extension is skipped.
pub fn load_catalog_dir(name: &str, dir: impl AsRef<Path>) -> Result<Catalog, CatalogError> {
    let dir = dir.as_ref();
    let io_error = |path: &Path, source| CatalogError::Io {
        catalog: name.to_string(),
        path: path.display().to_string(),
        source,
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|source| io_error(dir, source))? {
        let path = entry.map_err(|source| io_error(dir, source))?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            tracing::warn!(catalog = name, path = %path.display(), "skipping non-json catalog file");
            continue;
        }
        paths.push(path);
    }
    paths.sort();

    let mut builder = CatalogBuilder::new(name);
    for path in &paths {
        let raw = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
        let document: ClassDocument =
            serde_json::from_str(&raw).map_err(|source| CatalogError::ParseJson {
                catalog: name.to_string(),
                path: path.display().to_string(),
                source,
            })?;
        builder.add_class(document);
    }

    let catalog = builder.build()?;
    tracing::info!(
        catalog = name,
        files = paths.len(),
        classes = catalog.classes().count(),
        objects = catalog.objects().count(),
        "catalog loaded"
    );
    Ok(catalog)
}
