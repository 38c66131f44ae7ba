//! Registry of catalogs and live sessions.
//!
//! Catalogs are loaded lazily from `<model_path>/<name>/`, checked against
//! the rule registry and shared by every session created on them. Each
//! session sits behind its own mutex; validating a session that is
//! already locked fails fast instead of waiting.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::report::ValidationReport;
use crate::rule::RuleRegistry;
use crate::session::{InputSelection, Session};
use chrono::{DateTime, Utc};
use fitment_catalog::{Catalog, load_catalog_dir};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

pub type SessionHandle = Arc<Mutex<Session>>;

/// Selections of a session, as written by [`SessionManager::save_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    pub catalog: String,
    pub saved_at: DateTime<Utc>,
    pub selections: Vec<InputSelection>,
}

impl SavedSession {
    pub fn read(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| persistence(path, err))?;
        serde_json::from_str(&raw).map_err(|err| persistence(path, err))
    }
}

fn persistence(path: &Path, err: impl std::fmt::Display) -> EngineError {
    EngineError::Persistence {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[derive(Debug)]
pub struct SessionManager {
    config: EngineConfig,
    rules: RuleRegistry,
    catalogs: Mutex<BTreeMap<String, Arc<Catalog>>>,
    sessions: Mutex<BTreeMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_rules(config, RuleRegistry::builtin())
    }

    pub fn with_rules(config: EngineConfig, rules: RuleRegistry) -> Self {
        Self {
            config,
            rules,
            catalogs: Mutex::new(BTreeMap::new()),
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    fn catalogs(&self) -> Result<MutexGuard<'_, BTreeMap<String, Arc<Catalog>>>, EngineError> {
        self.catalogs
            .lock()
            .map_err(|_| EngineError::LockPoisoned("catalogs"))
    }

    fn sessions(&self) -> Result<MutexGuard<'_, BTreeMap<String, SessionHandle>>, EngineError> {
        self.sessions
            .lock()
            .map_err(|_| EngineError::LockPoisoned("sessions"))
    }

    /// Attach an already built catalog, replacing one with the same name.
    pub fn register_catalog(&self, catalog: impl Into<Arc<Catalog>>) -> Result<Arc<Catalog>, EngineError> {
        let catalog = catalog.into();
        self.rules.check_catalog(&catalog)?;
        self.catalogs()?
            .insert(catalog.name().to_string(), Arc::clone(&catalog));
        tracing::debug!(catalog = %catalog.name(), "registered catalog");
        Ok(catalog)
    }

    /// The catalog called `name`, loading it from disk on first use.
    pub fn catalog(&self, name: &str) -> Result<Arc<Catalog>, EngineError> {
        let mut catalogs = self.catalogs()?;
        if let Some(catalog) = catalogs.get(name) {
            return Ok(Arc::clone(catalog));
        }

        let catalog = Arc::new(load_catalog_dir(name, self.config.catalog_dir(name))?);
        self.rules.check_catalog(&catalog)?;
        catalogs.insert(name.to_string(), Arc::clone(&catalog));
        Ok(catalog)
    }

    pub fn create_session(&self, catalog: &str) -> Result<SessionHandle, EngineError> {
        let catalog = self.catalog(catalog)?;
        self.register_session(Session::with_rules(catalog, self.rules.clone()))
    }

    fn register_session(&self, session: Session) -> Result<SessionHandle, EngineError> {
        let id = session.id().to_string();
        let handle = Arc::new(Mutex::new(session));

        let mut sessions = self.sessions()?;
        sessions.insert(id.clone(), Arc::clone(&handle));
        tracing::debug!(session = %id, live = sessions.len(), "created session");
        Ok(handle)
    }

    pub fn session(&self, id: &str) -> Result<SessionHandle, EngineError> {
        self.sessions()?
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))
    }

    /// Forget a session and detach all of its instances.
    pub fn remove_session(&self, id: &str) -> Result<(), EngineError> {
        let handle = self
            .sessions()?
            .remove(id)
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))?;
        handle
            .lock()
            .map_err(|_| EngineError::LockPoisoned("session"))?
            .clear();
        tracing::debug!(session = %id, "removed session");
        Ok(())
    }

    pub fn session_count(&self) -> Result<usize, EngineError> {
        Ok(self.sessions()?.len())
    }

    /// Validate session `id` and return its report.
    pub fn validate(&self, id: &str) -> Result<ValidationReport, EngineError> {
        let handle = self.session(id)?;
        let mut session = match handle.try_lock() {
            Ok(session) => session,
            Err(TryLockError::WouldBlock) => return Err(EngineError::SessionBusy(id.to_string())),
            Err(TryLockError::Poisoned(_)) => return Err(EngineError::LockPoisoned("session")),
        };
        session.validate()?;
        Ok(session.report())
    }

    /// Write the selections of `session` as pretty JSON. Relative paths
    /// land under the configured save directory; the written path is
    /// returned.
    pub fn save_session(&self, path: impl AsRef<Path>, session: &Session) -> Result<PathBuf, EngineError> {
        let path = self.config.session_file(path);
        let saved = SavedSession {
            catalog: session.catalog().name().to_string(),
            saved_at: Utc::now(),
            selections: session.selections().to_vec(),
        };
        let json = serde_json::to_string_pretty(&saved).map_err(|err| persistence(&path, err))?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| persistence(&path, err))?;
        }
        fs::write(&path, json + "\n").map_err(|err| persistence(&path, err))?;
        tracing::debug!(
            session = %session.id(),
            path = %path.display(),
            selections = saved.selections.len(),
            "saved session"
        );
        Ok(path)
    }

    /// Create a session from a saved file and re-queue its selections. The
    /// session is registered only once every selection is queued.
    pub fn restore_session(&self, path: impl AsRef<Path>) -> Result<SessionHandle, EngineError> {
        let path = self.config.session_file(path);
        let saved = SavedSession::read(&path)?;
        let catalog = self.catalog(&saved.catalog)?;
        let mut session = Session::with_rules(catalog, self.rules.clone());
        for selection in &saved.selections {
            session.queue_selection(&selection.selection_id, selection.quantity)?;
        }
        self.register_session(session)
    }
}
