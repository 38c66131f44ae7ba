//! # Fitment Catalog
//!
//! The static schema a validation session runs against: classes with
//! single inheritance, objects instantiated from them, and the rule
//! objects that customise how providers are chosen.
//!
//! A catalog is built once and never mutated, so it is shared between
//! sessions behind an `Arc` without locking.
//!
//! ## Architecture
//!
//! ```text
//! ClassDocument (JSON)   ← one file per class, see load_catalog_dir
//!     │
//! CatalogBuilder         ← base model + user classes
//!     │
//! Catalog                ← class/object arenas, inherited lookup,
//!                          per-object applicable rule list
//! ```

pub mod catalog;
pub mod error;
pub mod load;
pub mod model;
pub mod props;
pub mod value;

pub use catalog::{Catalog, CatalogBuilder, base_model};
pub use error::CatalogError;
pub use load::load_catalog_dir;
pub use model::{
    ClassDocument, ClassKey, ListMap, ModelClass, ModelObject, ObjectDocument, ObjectKey,
    ValueMap,
};
pub use value::PropertyValue;
