use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use taskmaster_core::{
    storage_key, FixedClock, IdentityBackend, KeyValueStore, LocalIdentityBackend,
    LocalTaskStore, MemoryKeyValueStore, NewTask, Priority, SessionSnapshot, SessionStore,
    StorageError, StorageResult, Task, TaskError, TaskListController, TaskOp, TaskOrder,
    TaskPatch,
};

struct FlakyStore {
    inner: MemoryKeyValueStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryKeyValueStore::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk unavailable".to_string()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk full".to_string()));
        }
        self.inner.set(key, value)
    }
}

struct Fixture {
    backend: Arc<LocalIdentityBackend>,
    session: SessionStore,
    clock: Arc<FixedClock>,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
}

fn fixture() -> Fixture {
    let backend = Arc::new(LocalIdentityBackend::new());
    backend.sign_up("a@x.com", "secret1").unwrap();
    backend.sign_up("b@x.com", "secret2").unwrap();
    let session = SessionStore::init(backend.clone());
    Fixture {
        backend,
        session,
        clock: Arc::new(FixedClock::new(t0())),
    }
}

impl Fixture {
    fn controller<S: KeyValueStore>(&self, kv: S) -> TaskListController<S> {
        TaskListController::new(
            LocalTaskStore::new(kv),
            self.session.handle(),
            self.clock.clone(),
        )
    }

    fn sign_in(&self, email: &str) {
        let password = if email == "a@x.com" { "secret1" } else { "secret2" };
        self.backend.sign_in(email, password).unwrap();
    }
}

#[test]
fn add_buy_milk_persists_one_high_priority_record() {
    let fx = fixture();
    let kv = MemoryKeyValueStore::new();
    let mut tasks = fx.controller(&kv);
    fx.sign_in("a@x.com");

    let id = tasks
        .add(NewTask::titled("Buy milk").priority(Priority::High))
        .unwrap()
        .expect("task should be created");

    assert_eq!(tasks.len(), 1);
    assert_eq!(id, t0().timestamp_millis().to_string());

    let stored = LocalTaskStore::new(&kv).load("a@x.com").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Buy milk");
    assert_eq!(stored[0].priority, Priority::High);
    assert!(!stored[0].completed);
    assert_eq!(stored[0].owner, "a@x.com");
}

#[test]
fn blank_titles_are_ignored() {
    let fx = fixture();
    let kv = MemoryKeyValueStore::new();
    let mut tasks = fx.controller(&kv);
    fx.sign_in("a@x.com");

    assert_eq!(tasks.add(NewTask::titled("")).unwrap(), None);
    assert_eq!(tasks.add(NewTask::titled("   ")).unwrap(), None);
    assert!(tasks.is_empty());
    assert!(kv.get(&storage_key("a@x.com")).unwrap().is_none());
}

#[test]
fn ids_stay_unique_within_the_same_millisecond() {
    let fx = fixture();
    let mut tasks = fx.controller(MemoryKeyValueStore::new());
    fx.sign_in("a@x.com");

    let first = tasks.add(NewTask::titled("one")).unwrap().unwrap();
    let second = tasks.add(NewTask::titled("two")).unwrap().unwrap();
    assert_ne!(first, second);
}

#[test]
fn toggling_twice_restores_completed_flag() {
    let fx = fixture();
    let mut tasks = fx.controller(MemoryKeyValueStore::new());
    fx.sign_in("a@x.com");
    let id = tasks.add(NewTask::titled("Stretch")).unwrap().unwrap();

    assert!(tasks.toggle_completed(&id).unwrap());
    assert!(tasks.get(&id).unwrap().completed);
    assert!(tasks.toggle_completed(&id).unwrap());
    assert!(!tasks.get(&id).unwrap().completed);
    assert!(!tasks.toggle_completed("missing").unwrap());
}

#[test]
fn update_merges_only_provided_fields() {
    let fx = fixture();
    let kv = MemoryKeyValueStore::new();
    let mut tasks = fx.controller(&kv);
    fx.sign_in("a@x.com");
    let id = tasks
        .add(NewTask::titled("Draft").description("first pass"))
        .unwrap()
        .unwrap();

    let patch = TaskPatch {
        title: Some("  Final  ".to_string()),
        priority: Some(Priority::Low),
        ..TaskPatch::default()
    };
    assert!(tasks.update(&id, patch).unwrap());

    let task = tasks.get(&id).unwrap();
    assert_eq!(task.title, "Final");
    assert_eq!(task.description, "first pass");
    assert_eq!(task.priority, Priority::Low);
    assert_eq!(task.created_at, t0());

    let blank = TaskPatch {
        title: Some(" ".to_string()),
        ..TaskPatch::default()
    };
    assert!(!tasks.update(&id, blank).unwrap());
    assert!(!tasks.update("missing", TaskPatch::default()).unwrap());
    assert_eq!(LocalTaskStore::new(&kv).load("a@x.com").unwrap()[0].title, "Final");
}

#[test]
fn delete_removes_record_from_memory_and_storage() {
    let fx = fixture();
    let kv = MemoryKeyValueStore::new();
    let mut tasks = fx.controller(&kv);
    fx.sign_in("a@x.com");
    let keep = tasks.add(NewTask::titled("keep")).unwrap().unwrap();
    let drop_me = tasks.add(NewTask::titled("drop")).unwrap().unwrap();

    assert!(tasks.delete(&drop_me).unwrap());
    assert!(!tasks.delete(&drop_me).unwrap());

    let stored = LocalTaskStore::new(&kv).load("a@x.com").unwrap();
    assert_eq!(stored.iter().map(|t| t.id.clone()).collect::<Vec<_>>(), vec![keep]);
}

#[test]
fn operations_without_identity_fail_with_not_authenticated() {
    let fx = fixture();
    let mut tasks = fx.controller(MemoryKeyValueStore::new());

    let err = tasks.add(NewTask::titled("Buy milk")).unwrap_err();
    assert!(matches!(err, TaskError::NotAuthenticated));
    assert_eq!(err.alert(TaskOp::Add).message, "Please sign in to add todos.");
    assert!(matches!(
        tasks.toggle_completed("1"),
        Err(TaskError::NotAuthenticated)
    ));
    assert!(matches!(tasks.delete("1"), Err(TaskError::NotAuthenticated)));
    assert!(matches!(tasks.load(), Err(TaskError::NotAuthenticated)));
    assert!(tasks.is_empty());
}

#[test]
fn sign_out_clears_list_and_blocks_mutations() {
    let fx = fixture();
    let mut tasks = fx.controller(MemoryKeyValueStore::new());
    fx.sign_in("a@x.com");
    tasks.add(NewTask::titled("Buy milk")).unwrap();

    fx.backend.sign_out().unwrap();
    assert!(matches!(
        tasks.add(NewTask::titled("Another")),
        Err(TaskError::NotAuthenticated)
    ));
    assert!(tasks.is_empty());
    assert_eq!(tasks.owner(), None);
}

#[test]
fn switching_identity_loads_the_new_owners_tasks() {
    let fx = fixture();
    let kv = MemoryKeyValueStore::new();
    let mut tasks = fx.controller(&kv);

    fx.sign_in("a@x.com");
    tasks.add(NewTask::titled("alice task")).unwrap();

    fx.backend.sign_out().unwrap();
    fx.sign_in("b@x.com");
    tasks.pump_session_events().unwrap();
    assert_eq!(tasks.owner(), Some("b@x.com"));
    assert!(tasks.is_empty());
    tasks.add(NewTask::titled("bob task")).unwrap();

    fx.backend.sign_out().unwrap();
    fx.sign_in("a@x.com");
    tasks.pump_session_events().unwrap();
    assert_eq!(
        tasks.tasks().iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
        vec!["alice task"]
    );
}

#[test]
fn failed_save_leaves_memory_unchanged() {
    let fx = fixture();
    let kv = FlakyStore::new();
    let mut tasks = fx.controller(&kv);
    fx.sign_in("a@x.com");
    let id = tasks.add(NewTask::titled("kept")).unwrap().unwrap();

    kv.fail_writes.store(true, Ordering::SeqCst);
    let err = tasks.add(NewTask::titled("lost")).unwrap_err();
    assert!(matches!(err, TaskError::Storage(_)));
    assert_eq!(
        err.alert(TaskOp::Add).message,
        "Failed to save todos. Please try again."
    );
    assert!(tasks.toggle_completed(&id).is_err());
    assert!(tasks.delete(&id).is_err());

    assert_eq!(tasks.len(), 1);
    assert!(!tasks.get(&id).unwrap().completed);
    assert_eq!(LocalTaskStore::new(&kv.inner).load("a@x.com").unwrap(), tasks.tasks());
}

#[test]
fn failed_load_is_retried_before_any_write() {
    let fx = fixture();
    let kv = FlakyStore::new();
    let existing = vec![Task::new("1", "stored earlier", "a@x.com", t0())];
    LocalTaskStore::new(&kv.inner).save("a@x.com", &existing).unwrap();
    let mut tasks = fx.controller(&kv);

    kv.fail_reads.store(true, Ordering::SeqCst);
    fx.sign_in("a@x.com");
    let err = tasks.pump_session_events().unwrap_err();
    assert_eq!(
        err.alert(TaskOp::Load).message,
        "Failed to load todos. Please try again."
    );
    assert!(!tasks.is_loading());
    assert!(tasks.add(NewTask::titled("new")).is_err());

    kv.fail_reads.store(false, Ordering::SeqCst);
    tasks.add(NewTask::titled("new")).unwrap();
    let titles = LocalTaskStore::new(&kv.inner)
        .load("a@x.com")
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["stored earlier", "new"]);
}

#[test]
fn deadline_picked_in_the_past_is_stored_as_now() {
    let fx = fixture();
    let kv = MemoryKeyValueStore::new();
    let mut tasks = fx.controller(&kv);
    fx.sign_in("a@x.com");

    let mut draft = tasks.new_draft();
    draft.title = "Pay rent".to_string();
    tasks.pick_deadline(&mut draft, t0() - Duration::days(2));
    let id = tasks.save_draft(&draft).unwrap().unwrap();

    assert_eq!(tasks.get(&id).unwrap().deadline, t0());
    assert_eq!(
        LocalTaskStore::new(&kv).load("a@x.com").unwrap()[0].deadline,
        t0()
    );
}

#[test]
fn save_draft_updates_when_editing() {
    let fx = fixture();
    let mut tasks = fx.controller(MemoryKeyValueStore::new());
    fx.sign_in("a@x.com");
    let id = tasks.add(NewTask::titled("Read")).unwrap().unwrap();

    let mut draft = taskmaster_core::TaskDraft::from_task(tasks.get(&id).unwrap());
    draft.title = "Read a book".to_string();
    draft.priority = Priority::High;
    assert_eq!(tasks.save_draft(&draft).unwrap(), Some(id.clone()));

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks.get(&id).unwrap().title, "Read a book");
    assert_eq!(tasks.get(&id).unwrap().priority, Priority::High);
}

#[test]
fn sorted_tasks_orders_by_deadline_and_creation() {
    let fx = fixture();
    let mut tasks = fx.controller(MemoryKeyValueStore::new());
    fx.sign_in("a@x.com");

    tasks
        .add(
            NewTask::titled("later")
                .created_at(t0() - Duration::days(1))
                .deadline(t0() + Duration::days(5)),
        )
        .unwrap();
    tasks
        .add(
            NewTask::titled("sooner")
                .created_at(t0())
                .deadline(t0() + Duration::days(1)),
        )
        .unwrap();

    let by_deadline = tasks
        .sorted_tasks(TaskOrder::Deadline)
        .into_iter()
        .map(|t| t.title.as_str())
        .collect::<Vec<_>>();
    assert_eq!(by_deadline, vec!["sooner", "later"]);

    let by_created = tasks
        .sorted_tasks(TaskOrder::CreatedAt)
        .into_iter()
        .map(|t| t.title.as_str())
        .collect::<Vec<_>>();
    assert_eq!(by_created, vec!["later", "sooner"]);
}

#[test]
fn controller_reports_loading_until_first_session_settles() {
    let fx = fixture();
    let mut tasks = fx.controller(MemoryKeyValueStore::new());
    assert!(tasks.is_loading());

    tasks.pump_session_events().unwrap();
    assert!(!tasks.is_loading());

    tasks.apply_session(&SessionSnapshot::loading()).unwrap();
    assert!(tasks.is_loading());

    fx.sign_in("a@x.com");
    tasks.pump_session_events().unwrap();
    assert!(!tasks.is_loading());
    assert_eq!(tasks.owner(), Some("a@x.com"));
}
