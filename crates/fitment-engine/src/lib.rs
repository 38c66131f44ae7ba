//! # Fitment Engine
//!
//! Validates a set of selected parts against a catalog. Every selection
//! is instantiated with its needers and providers, then each needer is
//! satisfied by an existing provider in the session or by a freshly
//! created provider parent. A dead end backtracks into the most recent
//! decision and tries its next alternative.
//!
//! ## Architecture
//!
//! ```text
//! SessionManager         ← catalogs by name, sessions by id, persistence
//!     │
//! Session                ← selection queue, work/processed stacks
//!     │
//! ValidationStep         ← one needer, one stage, cached alternatives
//!     │          ╲
//! UndoLog         Rule   ← reversible writes / candidate filters
//!     │
//! InstanceGraph          ← SessionObjects over a shared Catalog
//! ```
//!
//! Search exhaustion is not an error: the needer that could not be
//! satisfied ends up `FAILED` and validation moves on to the next
//! selection.

pub mod change;
pub mod config;
pub mod error;
pub mod instance;
pub mod manager;
pub mod property_value_filter;
pub mod report;
pub mod rule;
pub mod session;
pub mod session_maximum_filter;
pub mod step;

#[cfg(test)]
mod testing;

pub use change::{ReversibleChange, UndoLog};
pub use config::{ConfigError, EngineConfig};
pub use error::EngineError;
pub use instance::{InstanceGraph, InstanceKey, SessionObject, ValidationStatus};
pub use manager::{SavedSession, SessionHandle, SessionManager};
pub use property_value_filter::PropertyValueFilter;
pub use report::{InstanceReport, NeederReport, ProviderRef, ProviderReport, ValidationReport};
pub use rule::{Rule, RuleRegistry, RuleScope};
pub use session::{InputSelection, Session};
pub use session_maximum_filter::SessionMaximumFilter;
pub use step::{Stage, StepKey, ValidationStep, protocol_matches};
