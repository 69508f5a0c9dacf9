//! CLI smoke entry point.
//!
//! Wires the window reconciler against an in-memory task collection, pages
//! through it and prints the window after each step. An optional first
//! argument points at a JSON `SyncConfig`.

use log::info;
use std::process::ExitCode;
use std::sync::Arc;
use tasksync_core::{
    core_version, init_logging_from_config, NewTask, SqliteTaskCollection, SyncConfig,
    TaskCollection, WindowReconciler, WindowView,
};

const DEMO_TASKS: u32 = 15;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("tasksync: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|err| format!("cannot read config `{path}`: {err}"))?;
            SyncConfig::from_json_str(&raw).map_err(|err| err.to_string())?
        }
        None => SyncConfig::default(),
    };
    init_logging_from_config(&config).map_err(|err| err.to_string())?;
    println!("tasksync_core version={}", core_version());

    let collection =
        Arc::new(SqliteTaskCollection::open_in_memory().map_err(|err| err.to_string())?);
    for n in 1..=DEMO_TASKS {
        let draft = NewTask::new("demo", format!("Demo task {n}"), "")
            .with_created_at(i64::from(DEMO_TASKS - n));
        collection.create(&draft).map_err(|err| err.to_string())?;
    }

    let mut window =
        WindowReconciler::new(Arc::clone(&collection), &config).map_err(|err| err.to_string())?;
    window.start().map_err(|err| err.user_message())?;
    window.pump();
    print_window("start", &window.view());

    while window.has_more() {
        window.load_more().map_err(|err| err.user_message())?;
        print_window("load_more", &window.view());
    }

    if let Some(first) = window.records().first().map(|task| task.id.clone()) {
        window
            .toggle_completed(&first)
            .map_err(|err| err.user_message())?;
        window.pump();
        print_window("toggle", &window.view());
    }

    window.dispose();
    info!("event=cli_done module=cli status=ok");
    Ok(())
}

fn print_window(step: &str, view: &WindowView<'_>) {
    println!(
        "[{step}] visible={} has_more={} listening={}",
        view.len(),
        view.has_more,
        view.listening
    );
    for task in view.records {
        let mark = if task.completed { "x" } else { " " };
        println!("  [{mark}] {} ({})", task.title, task.id);
    }
}
