use crate::support::{exit_with, lock_or_exit, parse_selection_or_exit, print_json};
use fitment_engine::{EngineConfig, SavedSession, SessionManager};

pub struct Args {
    pub catalog: Option<String>,
    pub selections: Vec<String>,
    pub input: Option<String>,
    pub save: Option<String>,
    pub skip_providers: bool,
    pub json: bool,
}

pub fn run(config: EngineConfig, args: Args) {
    let selections: Vec<_> = args
        .selections
        .iter()
        .map(|raw| parse_selection_or_exit(raw))
        .collect();
    let manager = SessionManager::new(config);

    let handle = match (&args.input, &args.catalog) {
        (Some(input), catalog) => {
            let path = manager.config().session_file(input);
            let saved = SavedSession::read(&path).unwrap_or_else(|e| exit_with(e));
            if let Some(catalog) = catalog.as_deref().filter(|catalog| *catalog != saved.catalog) {
                exit_with(format!(
                    "--catalog {catalog} does not match catalog {} of {}",
                    saved.catalog,
                    path.display()
                ));
            }
            manager.restore_session(input).unwrap_or_else(|e| exit_with(e))
        }
        (None, Some(catalog)) => manager.create_session(catalog).unwrap_or_else(|e| exit_with(e)),
        (None, None) => exit_with("--catalog is required unless --input names a saved session"),
    };

    let id = {
        let mut session = lock_or_exit(&handle);
        for selection in &selections {
            session
                .queue_selection(&selection.selection_id, selection.quantity)
                .unwrap_or_else(|e| exit_with(e));
        }
        if let Some(save) = &args.save {
            let path = manager
                .save_session(save, &session)
                .unwrap_or_else(|e| exit_with(e));
            eprintln!("saved selections to {}", path.display());
        }
        session.id().to_string()
    };

    let mut report = manager.validate(&id).unwrap_or_else(|e| exit_with(e));
    if args.skip_providers {
        report = report.without_providers();
    }

    if args.json {
        print_json(&report);
    } else {
        println!("{}", report.render_text(args.skip_providers));
    }
}
