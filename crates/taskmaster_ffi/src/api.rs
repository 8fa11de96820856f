//! FFI use-case API for the mobile shell.
//!
//! # Responsibility
//! - Expose session, navigation and task use-cases to Dart via FRB.
//! - Own the process-wide `AppRuntime` behind these calls.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Failures are reported in envelopes with a user-facing `message`.
//! - Timestamps cross the boundary as UTC epoch milliseconds.

use chrono::{DateTime, TimeZone, Utc};
use log::error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use taskmaster_core::{
    clamp_deadline, core_version as core_version_inner, default_log_level,
    init_logging as init_logging_inner, ping as ping_inner, AppRuntime, AuthForm, Clock, Flow,
    LocalIdentityBackend, NewTask, Priority, SessionUpdate, SqliteKeyValueStore, SystemClock,
    Task, TaskError, TaskOp, TaskOrder, TaskPatch,
};

const DB_FILE_NAME: &str = "taskmaster.sqlite3";
const DB_PATH_ENV: &str = "TASKMASTER_DB_PATH";

static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static RUNTIME: Mutex<Option<AppRuntime<SqliteKeyValueStore>>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive);
///   blank selects the build default (`debug` or `info`).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and the error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    let level = match level.trim() {
        "" => default_log_level(),
        explicit => explicit,
    };
    match init_logging_inner(level, log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Result of a sign-in, sign-up or sign-out attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub ok: bool,
    /// Signed-in email after the call, if any.
    pub email: Option<String>,
    /// Route the shell must replace the current screen with.
    pub redirect_route: Option<String>,
    /// Error text for inline display and alert; empty on success.
    pub message: String,
}

/// Current session as seen by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub loading: bool,
    pub email: Option<String>,
}

/// Currently mounted flow and screen; `None` while the session is loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    /// `auth` or `tasks`.
    pub flow: Option<String>,
    pub route: Option<String>,
}

/// Task as rendered by the list screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at_ms: i64,
    pub deadline_ms: i64,
    /// `Low|Medium|High`.
    pub priority: String,
    pub completed: bool,
    /// Open and past its deadline.
    pub overdue: bool,
}

/// Task list envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListResponse {
    pub ok: bool,
    pub items: Vec<TaskItem>,
    pub message: String,
}

/// Task mutation envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    pub ok: bool,
    pub task_id: Option<String>,
    pub message: String,
}

impl TaskActionResponse {
    fn success(message: impl Into<String>, task_id: String) -> Self {
        Self {
            ok: true,
            task_id: Some(task_id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task_id: None,
            message: message.into(),
        }
    }
}

/// Signs in with email and password.
///
/// # FFI contract
/// - Sync call; starts the runtime on first use.
/// - On failure `message` carries the text to show inline and as an alert.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_sign_in(email: String, password: String) -> AuthResponse {
    let mut form = AuthForm::with_credentials(email, password);
    auth_response(with_runtime(|app| app.sign_in(&mut form).map_err(|err| err.to_string())))
}

/// Creates an account and signs it in.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_sign_up(email: String, password: String) -> AuthResponse {
    let mut form = AuthForm::with_credentials(email, password);
    auth_response(with_runtime(|app| app.sign_up(&mut form).map_err(|err| err.to_string())))
}

/// Signs out the current user.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_sign_out() -> AuthResponse {
    auth_response(with_runtime(|app| app.sign_out().map_err(|alert| alert.message)))
}

/// Returns the current session snapshot.
#[flutter_rust_bridge::frb(sync)]
pub fn session_state() -> SessionState {
    with_runtime(|app| {
        let snapshot = app.session();
        Ok(SessionState {
            loading: snapshot.loading,
            email: snapshot.identity.map(|identity| identity.email),
        })
    })
    .unwrap_or(SessionState {
        loading: true,
        email: None,
    })
}

/// Returns which flow and screen are mounted.
#[flutter_rust_bridge::frb(sync)]
pub fn navigation_state() -> NavigationState {
    with_runtime(|app| {
        app.pump();
        let gate = app.gate();
        Ok(NavigationState {
            flow: gate.mounted_flow().map(|flow| flow_label(flow).to_string()),
            route: gate.current_screen().map(|screen| screen.route().to_string()),
        })
    })
    .unwrap_or(NavigationState {
        flow: None,
        route: None,
    })
}

/// Switches the auth flow to the register screen; `false` outside the auth flow.
#[flutter_rust_bridge::frb(sync)]
pub fn navigation_open_register() -> bool {
    with_runtime(|app| Ok(app.gate_mut().open_register())).unwrap_or(false)
}

/// Switches the auth flow back to the login screen; `false` outside the auth flow.
#[flutter_rust_bridge::frb(sync)]
pub fn navigation_open_login() -> bool {
    with_runtime(|app| Ok(app.gate_mut().open_login())).unwrap_or(false)
}

/// Lists the signed-in user's tasks.
///
/// `order`: `created|deadline`; anything else keeps insertion order.
#[flutter_rust_bridge::frb(sync)]
pub fn tasks_list(order: Option<String>) -> TaskListResponse {
    let order = match order.as_deref().map(str::trim) {
        Some("created") => TaskOrder::CreatedAt,
        Some("deadline") => TaskOrder::Deadline,
        _ => TaskOrder::Insertion,
    };
    let result = with_runtime(|app| {
        let tasks = app.tasks_mut();
        if let Err(err) = tasks.pump_session_events() {
            return Err(err.alert(TaskOp::Load).message);
        }
        if tasks.owner().is_none() {
            return Err(TaskError::NotAuthenticated.alert(TaskOp::Load).message);
        }
        let now = SystemClock.now();
        Ok(tasks
            .sorted_tasks(order)
            .into_iter()
            .map(|task| to_task_item(task, now))
            .collect::<Vec<_>>())
    });
    task_list_response(result)
}

/// Reloads the signed-in user's tasks from storage.
#[flutter_rust_bridge::frb(sync)]
pub fn tasks_reload() -> TaskListResponse {
    let result = with_runtime(|app| {
        let tasks = app.tasks_mut();
        tasks
            .load()
            .map_err(|err| err.alert(TaskOp::Load).message)?;
        let now = SystemClock.now();
        Ok(tasks
            .tasks()
            .iter()
            .map(|task| to_task_item(task, now))
            .collect::<Vec<_>>())
    });
    task_list_response(result)
}

/// Adds a task for the signed-in user.
///
/// Omitted timestamps default to now; omitted priority is `Medium`.
/// An unknown priority label is rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn task_add(
    title: String,
    description: Option<String>,
    created_at_ms: Option<i64>,
    deadline_ms: Option<i64>,
    priority: Option<String>,
) -> TaskActionResponse {
    let fields = match TaskFields::parse(created_at_ms, deadline_ms, priority) {
        Ok(fields) => fields,
        Err(message) => return TaskActionResponse::failure(message),
    };
    let new_task = NewTask {
        title,
        description,
        created_at: fields.created_at,
        deadline: fields.deadline,
        priority: fields.priority,
    };

    let result = with_runtime(|app| {
        app.tasks_mut()
            .add(new_task)
            .map_err(|err| err.alert(TaskOp::Add).message)
    });
    match result {
        Ok(Some(task_id)) => TaskActionResponse::success("Task created.", task_id),
        Ok(None) => TaskActionResponse::failure("Task title is required."),
        Err(message) => TaskActionResponse::failure(message),
    }
}

/// Updates the provided fields of one task.
#[flutter_rust_bridge::frb(sync)]
pub fn task_update(
    task_id: String,
    title: Option<String>,
    description: Option<String>,
    created_at_ms: Option<i64>,
    deadline_ms: Option<i64>,
    priority: Option<String>,
) -> TaskActionResponse {
    let fields = match TaskFields::parse(created_at_ms, deadline_ms, priority) {
        Ok(fields) => fields,
        Err(message) => return TaskActionResponse::failure(message),
    };
    let patch = TaskPatch {
        title,
        description,
        created_at: fields.created_at,
        deadline: fields.deadline,
        priority: fields.priority,
    };

    let result = with_runtime(|app| {
        app.tasks_mut()
            .update(&task_id, patch)
            .map_err(|err| err.alert(TaskOp::Update).message)
    });
    changed_response(result, "Task updated.", task_id)
}

/// Flips the completed flag of one task.
#[flutter_rust_bridge::frb(sync)]
pub fn task_toggle(task_id: String) -> TaskActionResponse {
    let result = with_runtime(|app| {
        app.tasks_mut()
            .toggle_completed(&task_id)
            .map_err(|err| err.alert(TaskOp::Toggle).message)
    });
    changed_response(result, "Task status updated.", task_id)
}

/// Deletes one task.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(task_id: String) -> TaskActionResponse {
    let result = with_runtime(|app| {
        app.tasks_mut()
            .delete(&task_id)
            .map_err(|err| err.alert(TaskOp::Delete).message)
    });
    changed_response(result, "Task deleted.", task_id)
}

/// Applies the deadline picker policy: past instants become now.
///
/// Returns the value to store, in epoch milliseconds.
#[flutter_rust_bridge::frb(sync)]
pub fn deadline_clamp(selected_ms: i64) -> i64 {
    let now = SystemClock.now();
    match Utc.timestamp_millis_opt(selected_ms).single() {
        Some(selected) => clamp_deadline(selected, now).timestamp_millis(),
        None => now.timestamp_millis(),
    }
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn lock_runtime() -> MutexGuard<'static, Option<AppRuntime<SqliteKeyValueStore>>> {
    RUNTIME
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs `f` against the process runtime, starting it on first use.
fn with_runtime<T>(
    f: impl FnOnce(&mut AppRuntime<SqliteKeyValueStore>) -> Result<T, String>,
) -> Result<T, String> {
    let mut guard = lock_runtime();
    if guard.is_none() {
        let db_path = resolve_db_path();
        let opened = LocalIdentityBackend::open(&db_path).and_then(|backend| {
            SqliteKeyValueStore::open(&db_path).map(|store| (backend, store))
        });
        let (backend, store) = opened.map_err(|err| {
            error!("event=ffi_runtime_start module=ffi status=error error={err}");
            format!("Failed to open local storage: {err}")
        })?;
        *guard = Some(AppRuntime::start(
            Arc::new(backend),
            store,
            Arc::new(SystemClock),
        ));
    }
    match guard.as_mut() {
        Some(app) => f(app),
        None => Err("App runtime is not available.".to_string()),
    }
}

fn auth_response(result: Result<SessionUpdate, String>) -> AuthResponse {
    let email = session_state().email;
    match result {
        Ok(update) => AuthResponse {
            ok: true,
            email,
            redirect_route: update
                .redirects
                .last()
                .map(|redirect| redirect.to.route().to_string()),
            message: update.alert.map(|alert| alert.message).unwrap_or_default(),
        },
        Err(message) => AuthResponse {
            ok: false,
            email,
            redirect_route: None,
            message,
        },
    }
}

fn task_list_response(result: Result<Vec<TaskItem>, String>) -> TaskListResponse {
    match result {
        Ok(items) => TaskListResponse {
            ok: true,
            message: if items.is_empty() {
                "No tasks yet.".to_string()
            } else {
                format!("{} task(s).", items.len())
            },
            items,
        },
        Err(message) => TaskListResponse {
            ok: false,
            items: Vec::new(),
            message,
        },
    }
}

fn changed_response(
    result: Result<bool, String>,
    message: &str,
    task_id: String,
) -> TaskActionResponse {
    match result {
        Ok(true) => TaskActionResponse::success(message, task_id),
        Ok(false) => TaskActionResponse::failure("Task not found or nothing to change."),
        Err(message) => TaskActionResponse::failure(message),
    }
}

/// Optional task fields shared by add and update.
struct TaskFields {
    created_at: Option<DateTime<Utc>>,
    deadline: Option<DateTime<Utc>>,
    priority: Option<Priority>,
}

impl TaskFields {
    fn parse(
        created_at_ms: Option<i64>,
        deadline_ms: Option<i64>,
        priority: Option<String>,
    ) -> Result<Self, String> {
        Ok(Self {
            created_at: optional_time(created_at_ms)?,
            deadline: optional_time(deadline_ms)?,
            priority: optional_priority(priority)?,
        })
    }
}

fn optional_priority(label: Option<String>) -> Result<Option<Priority>, String> {
    match label {
        Some(label) => Priority::parse(&label).map(Some).ok_or_else(|| {
            format!("Unknown priority `{}`; expected Low, Medium or High.", label.trim())
        }),
        None => Ok(None),
    }
}

fn optional_time(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, String> {
    match ms {
        Some(value) => Utc
            .timestamp_millis_opt(value)
            .single()
            .map(Some)
            .ok_or_else(|| format!("invalid timestamp: {value}")),
        None => Ok(None),
    }
}

fn to_task_item(task: &Task, now: DateTime<Utc>) -> TaskItem {
    TaskItem {
        id: task.id.clone(),
        title: task.title.clone(),
        description: task.description.clone(),
        created_at_ms: task.created_at.timestamp_millis(),
        deadline_ms: task.deadline.timestamp_millis(),
        priority: task.priority.as_str().to_string(),
        completed: task.completed,
        overdue: task.is_overdue(now),
    }
}

fn flow_label(flow: Flow) -> &'static str {
    match flow {
        Flow::Auth => "auth",
        Flow::Tasks => "tasks",
    }
}

#[cfg(test)]
mod tests {
    use super::{
        auth_sign_in, auth_sign_out, auth_sign_up, core_version, deadline_clamp, init_logging,
        navigation_state, ping, task_add, task_delete, task_toggle, task_update, tasks_list,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "/tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn blank_level_falls_back_to_build_default() {
        // A relative directory is rejected after the level resolves, so no
        // logger is started here.
        let message = init_logging("  ".to_string(), "relative/logs".to_string());
        assert!(!message.is_empty());
        assert!(!message.contains("unsupported log level"), "{message}");
    }

    #[test]
    fn unknown_priority_is_rejected_instead_of_defaulted() {
        let added = task_add(
            "Buy milk".to_string(),
            None,
            None,
            None,
            Some("urgent".to_string()),
        );
        assert!(!added.ok);
        assert_eq!(
            added.message,
            "Unknown priority `urgent`; expected Low, Medium or High."
        );

        let updated = task_update(
            "1714555800000".to_string(),
            None,
            None,
            None,
            None,
            Some("someday".to_string()),
        );
        assert!(!updated.ok);
        assert!(updated.message.starts_with("Unknown priority"));
    }

    #[test]
    fn deadline_clamp_never_returns_the_past() {
        let now_ms = i64::try_from(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("time went backwards")
                .as_millis(),
        )
        .expect("epoch millis fit in i64");

        assert!(deadline_clamp(0) >= now_ms);
        let future = now_ms + 86_400_000;
        assert_eq!(deadline_clamp(future), future);
    }

    // Session state is process-wide, so the whole flow runs in one test.
    #[test]
    fn sign_up_add_toggle_delete_sign_out_flow() {
        let email = unique_email();

        let signed_up = auth_sign_up(email.clone(), "secret1".to_string());
        assert!(signed_up.ok, "{}", signed_up.message);
        assert_eq!(signed_up.email.as_deref(), Some(email.as_str()));
        assert_eq!(navigation_state().flow.as_deref(), Some("tasks"));

        let blank = task_add("  ".to_string(), None, None, None, None);
        assert!(!blank.ok);

        let added = task_add(
            "Buy milk".to_string(),
            Some("2 liters".to_string()),
            None,
            None,
            Some("high".to_string()),
        );
        assert!(added.ok, "{}", added.message);
        let task_id = added.task_id.expect("task id should be returned");

        let listed = tasks_list(None);
        assert!(listed.ok, "{}", listed.message);
        assert_eq!(listed.items.len(), 1);
        assert_eq!(listed.items[0].priority, "High");

        let renamed = task_update(
            task_id.clone(),
            Some("Buy oat milk".to_string()),
            None,
            None,
            None,
            None,
        );
        assert!(renamed.ok, "{}", renamed.message);
        assert!(task_toggle(task_id.clone()).ok);
        let listed = tasks_list(Some("deadline".to_string()));
        assert_eq!(listed.items[0].title, "Buy oat milk");
        assert!(listed.items[0].completed);

        assert!(task_delete(task_id.clone()).ok);
        assert!(!task_delete(task_id).ok);

        let overdue = task_add("Old bill".to_string(), None, None, Some(1_000), None);
        assert!(overdue.ok, "{}", overdue.message);
        let listed = tasks_list(None);
        assert_eq!(listed.items.len(), 1);
        assert!(listed.items[0].overdue);
        assert!(task_delete(overdue.task_id.expect("task id should be returned")).ok);

        let signed_out = auth_sign_out();
        assert!(signed_out.ok, "{}", signed_out.message);
        assert_eq!(signed_out.email, None);
        assert_eq!(signed_out.redirect_route.as_deref(), Some("/(auth)/login"));

        let rejected = task_add("after".to_string(), None, None, None, None);
        assert!(!rejected.ok);
        assert_eq!(rejected.message, "Please sign in to add todos.");

        let bad_login = auth_sign_in(email, "wrong-password".to_string());
        assert!(!bad_login.ok);
        assert_eq!(bad_login.message, "Invalid email or password.");
    }

    fn unique_email() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("ffi-{nanos}@example.com")
    }
}
