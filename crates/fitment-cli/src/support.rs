use fitment_engine::config::DEFAULT_CONFIG_FILE;
use fitment_engine::{EngineConfig, InputSelection, Session, SessionHandle};
use serde::Serialize;
use std::fmt::Display;
use std::path::Path;
use std::sync::MutexGuard;

pub fn exit_with(err: impl Display) -> ! {
    eprintln!("error: {err}");
    std::process::exit(1);
}

/// An explicitly named config must exist; the default one may be absent.
pub fn load_config_or_exit(path: &str) -> EngineConfig {
    let loaded = if path == DEFAULT_CONFIG_FILE {
        EngineConfig::load_or_default(Path::new(path))
    } else {
        EngineConfig::load(Path::new(path))
    };
    loaded.unwrap_or_else(|e| exit_with(e))
}

/// Parse `OBJECT=QTY` (or a bare `OBJECT`, meaning one).
pub fn parse_selection_or_exit(raw: &str) -> InputSelection {
    let (object, quantity) = match raw.split_once('=') {
        Some((object, quantity)) => {
            let quantity = quantity.trim().parse::<u32>().unwrap_or_else(|e| {
                exit_with(format!("invalid quantity in selection `{raw}`: {e}"))
            });
            (object.trim(), quantity)
        }
        None => (raw.trim(), 1),
    };
    if object.is_empty() {
        exit_with(format!("selection `{raw}` names no object"));
    }
    InputSelection::new(object, quantity)
}

pub fn lock_or_exit(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    handle
        .lock()
        .unwrap_or_else(|_| exit_with("session lock poisoned"))
}

pub fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|e| exit_with(e))
    );
}

pub fn join_or_dash(ids: &[String]) -> String {
    if ids.is_empty() {
        "-".to_string()
    } else {
        ids.join(", ")
    }
}
