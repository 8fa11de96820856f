//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `taskmaster_core` linkage.
//! - Drive one in-memory session end to end with deterministic output.

use std::process::ExitCode;
use std::sync::Arc;
use taskmaster_core::{
    AppRuntime, AuthForm, LocalIdentityBackend, MemoryKeyValueStore, NewTask, SystemClock,
    TaskOp,
};

fn main() -> ExitCode {
    println!("taskmaster_core ping={}", taskmaster_core::ping());
    println!("taskmaster_core version={}", taskmaster_core::core_version());

    match probe() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("probe failed: {message}");
            ExitCode::FAILURE
        }
    }
}

fn probe() -> Result<(), String> {
    let mut app = AppRuntime::start(
        Arc::new(LocalIdentityBackend::new()),
        MemoryKeyValueStore::new(),
        Arc::new(SystemClock),
    );

    let mut form = AuthForm::with_credentials("probe@example.com", "probe-secret");
    let update = app.sign_up(&mut form).map_err(|err| err.to_string())?;
    for redirect in &update.redirects {
        println!("probe redirect={}", redirect.to.route());
    }

    let tasks = app.tasks_mut();
    let task_id = tasks
        .add(NewTask::titled("Probe task"))
        .map_err(|err| err.alert(TaskOp::Add).message)?
        .ok_or("task was not created")?;
    tasks
        .toggle_completed(&task_id)
        .map_err(|err| err.alert(TaskOp::Toggle).message)?;
    println!(
        "probe tasks={} completed={}",
        tasks.len(),
        tasks.tasks().iter().filter(|task| task.completed).count()
    );

    let update = app.sign_out().map_err(|alert| alert.message)?;
    for redirect in &update.redirects {
        println!("probe redirect={}", redirect.to.route());
    }
    app.shutdown();
    Ok(())
}
