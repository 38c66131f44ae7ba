//! Error types for sessions, rules, and the session manager.

use crate::config::ConfigError;
use fitment_catalog::CatalogError;

/// Errors raised by the engine.
///
/// Search exhaustion is not an error; it shows up as a `FAILED` status on
/// the needer that could not be satisfied.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A catalog id referenced while a session was running does not exist.
    #[error("session {session}: {source}")]
    Reference {
        session: String,
        #[source]
        source: CatalogError,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(
        "catalog `{catalog}`, session {session}: a session can only be validated once; create a new session to validate again"
    )]
    AlreadyValidated { catalog: String, session: String },

    #[error(
        "catalog `{catalog}`, session {session}: cannot directly create session object for non top-level object {object_id}"
    )]
    NotTopLevel {
        catalog: String,
        session: String,
        object_id: String,
    },

    #[error("catalog `{catalog}`: rule object {rule_id} names unregistered rule kind `{kind}`")]
    UnknownRuleKind {
        catalog: String,
        rule_id: String,
        kind: String,
    },

    #[error(
        "catalog `{catalog}`, session {session}: no session object {instance_id} for model object {object_id}"
    )]
    InstanceNotFound {
        catalog: String,
        session: String,
        object_id: String,
        instance_id: String,
    },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {0} is already being validated")]
    SessionBusy(String),

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("session file {path}: {message}")]
    Persistence { path: String, message: String },
}

impl EngineError {
    /// Wrap a catalog lookup failure that happened inside `session`.
    pub fn reference(session: &str, source: CatalogError) -> Self {
        Self::Reference {
            session: session.to_string(),
            source,
        }
    }

    /// Catalog the error originated from, when known.
    pub fn catalog(&self) -> Option<&str> {
        match self {
            Self::Reference { source, .. } | Self::Catalog(source) => Some(source.catalog()),
            Self::AlreadyValidated { catalog, .. }
            | Self::NotTopLevel { catalog, .. }
            | Self::UnknownRuleKind { catalog, .. }
            | Self::InstanceNotFound { catalog, .. } => Some(catalog),
            _ => None,
        }
    }

    /// Session the error originated from, when known.
    pub fn session(&self) -> Option<&str> {
        match self {
            Self::Reference { session, .. }
            | Self::AlreadyValidated { session, .. }
            | Self::NotTopLevel { session, .. }
            | Self::InstanceNotFound { session, .. }
            | Self::SessionNotFound(session)
            | Self::SessionBusy(session) => Some(session),
            _ => None,
        }
    }
}
