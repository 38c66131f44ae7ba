//! Error types for catalog construction and lookup.

/// Errors raised while building, loading, or querying a catalog.
///
/// Every variant names the catalog it came from.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog `{catalog}`: no definition for model class with ID: {id}")]
    UnknownClass { catalog: String, id: String },

    #[error("catalog `{catalog}`: no definition for model object with ID: {id}")]
    UnknownObject { catalog: String, id: String },

    #[error("catalog `{catalog}`: duplicate model class ID: {id}")]
    DuplicateClass { catalog: String, id: String },

    #[error("catalog `{catalog}`: duplicate model object ID: {id}")]
    DuplicateObject { catalog: String, id: String },

    #[error("catalog `{catalog}`: parent class `{parent_id}` missing for class {class_id}")]
    MissingParent {
        catalog: String,
        class_id: String,
        parent_id: String,
    },

    #[error("catalog `{catalog}`: failed to read {path}: {source}")]
    Io {
        catalog: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog `{catalog}`: invalid json at {path}: {source}")]
    ParseJson {
        catalog: String,
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CatalogError {
    /// Name of the catalog the error originated from.
    pub fn catalog(&self) -> &str {
        match self {
            Self::UnknownClass { catalog, .. }
            | Self::UnknownObject { catalog, .. }
            | Self::DuplicateClass { catalog, .. }
            | Self::DuplicateObject { catalog, .. }
            | Self::MissingParent { catalog, .. }
            | Self::Io { catalog, .. }
            | Self::ParseJson { catalog, .. } => catalog,
        }
    }
}
