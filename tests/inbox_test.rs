use burner_inbox::inbox::{DEFAULT_PREFIX, sort_newest_first};
use burner_inbox::{
    BlobStore, DirStore, MemoryStore, PollSettings, Poller, RefreshOutcome, StoreError, Trigger,
    Parser, scan_inbox,
};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const ADDRESS: &str = "250915123@x.com";

fn message(to: &str, subject: &str, date: &str) -> String {
    format!(
        "From: sender@example.com\r\nTo: {to}\r\nSubject: {subject}\r\nDate: {date}\r\n\r\n\
         body of {subject}\r\n"
    )
}

fn populated_store() -> MemoryStore {
    MemoryStore::new()
        .with(
            "email/a",
            message(ADDRESS, "older", "Mon, 15 Sep 2025 10:00:00 +0000"),
        )
        .with(
            "email/b",
            message(ADDRESS, "newest", "Tue, 16 Sep 2025 10:00:00 +0000"),
        )
        .with(
            "email/c",
            message("someone@else.com", "not ours", "Tue, 16 Sep 2025 11:00:00 +0000"),
        )
        .with(
            "email/d",
            message(
                &format!("\"Me\" <{ADDRESS}>"),
                "middle",
                "Mon, 15 Sep 2025 12:00:00 +0000",
            ),
        )
        .with(
            "other/e",
            message(ADDRESS, "wrong prefix", "Wed, 17 Sep 2025 10:00:00 +0000"),
        )
}

fn subjects(messages: &[burner_inbox::ParsedMessage]) -> Vec<&str> {
    messages.iter().map(|m| m.subject_or_empty()).collect()
}

// --- Scanning ---

#[test]
fn test_scan_filters_and_sorts() {
    let store = populated_store();
    let messages = scan_inbox(&store, &Parser::default(), DEFAULT_PREFIX, ADDRESS);

    assert_eq!(subjects(&messages), vec!["newest", "middle", "older"]);
    assert_eq!(messages[0].source_key, "email/b");
    assert_eq!(messages[0].body.trim(), "body of newest");
}

#[test]
fn test_scan_no_matches() {
    let store = populated_store();
    let messages = scan_inbox(&store, &Parser::default(), DEFAULT_PREFIX, "nobody@x.com");
    assert!(messages.is_empty());
}

struct FlakyStore {
    inner: MemoryStore,
    broken_key: &'static str,
}

impl BlobStore for FlakyStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(prefix)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if key == self.broken_key {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.fetch(key)
    }
}

#[test]
fn test_scan_skips_failed_fetch() {
    let store = FlakyStore {
        inner: populated_store(),
        broken_key: "email/b",
    };
    let messages = scan_inbox(&store, &Parser::default(), DEFAULT_PREFIX, ADDRESS);

    assert_eq!(subjects(&messages), vec!["middle", "older"]);
}

struct UnlistableStore;

impl BlobStore for UnlistableStore {
    fn list(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Backend("access denied".into()))
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::NotFound(key.to_string()))
    }
}

#[test]
fn test_scan_listing_failure_is_empty() {
    let messages = scan_inbox(&UnlistableStore, &Parser::default(), DEFAULT_PREFIX, ADDRESS);
    assert!(messages.is_empty());
}

#[test]
fn test_scan_survives_garbage_objects() {
    let store = populated_store()
        .with("email/bin", vec![0xff, 0xfe, b'<', 0x00, 0x80])
        .with("email/junk", format!("<{ADDRESS}>"));
    let messages = scan_inbox(&store, &Parser::default(), DEFAULT_PREFIX, ADDRESS);

    assert_eq!(messages.len(), 4);
    assert!(messages.iter().any(|m| m.source_key == "email/junk"));
}

#[test]
fn test_sort_newest_first() {
    let store = populated_store();
    let mut messages = scan_inbox(&store, &Parser::manual(), DEFAULT_PREFIX, ADDRESS);
    messages.reverse();
    sort_newest_first(&mut messages);
    assert_eq!(subjects(&messages), vec!["newest", "middle", "older"]);
}

// --- Stores ---

#[test]
fn test_memory_store_missing_key() {
    let store = MemoryStore::new();
    assert!(matches!(store.fetch("email/x"), Err(StoreError::NotFound(_))));
}

#[test]
fn test_dir_store() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("email").join("nested")).unwrap();
    std::fs::create_dir_all(dir.path().join("other")).unwrap();
    std::fs::write(
        dir.path().join("email").join("one"),
        message(ADDRESS, "one", "Mon, 15 Sep 2025 10:00:00 +0000"),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("email").join("nested").join("two"),
        message(ADDRESS, "two", "Tue, 16 Sep 2025 10:00:00 +0000"),
    )
    .unwrap();
    std::fs::write(dir.path().join("other").join("three"), "x").unwrap();

    let store = DirStore::new(dir.path());
    assert_eq!(
        store.list(DEFAULT_PREFIX).unwrap(),
        vec!["email/nested/two".to_string(), "email/one".to_string()]
    );
    assert!(matches!(store.fetch("email/missing"), Err(StoreError::NotFound(_))));
    assert!(store.fetch("../escape").is_err());

    let messages = scan_inbox(&store, &Parser::default(), DEFAULT_PREFIX, ADDRESS);
    assert_eq!(subjects(&messages), vec!["two", "one"]);
}

#[test]
fn test_dir_store_missing_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirStore::new(dir.path().join("absent"));

    assert!(matches!(store.list(""), Err(StoreError::Io { .. })));
    assert!(scan_inbox(&store, &Parser::default(), DEFAULT_PREFIX, ADDRESS).is_empty());
}

// --- Poller ---

fn settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(30),
        cooldown: Duration::from_secs(10),
    }
}

fn populated_poller() -> Poller<MemoryStore> {
    Poller::new(populated_store(), Parser::default(), ADDRESS).with_settings(settings())
}

#[test]
fn test_first_refresh_runs_immediately() {
    let poller = populated_poller();
    let now = Instant::now();

    assert!(poller.can_refresh(now));
    assert_eq!(poller.refresh(Trigger::Scheduled, now), RefreshOutcome::Scanned(3));
    assert_eq!(subjects(&poller.messages()), vec!["newest", "middle", "older"]);
}

#[test]
fn test_manual_refresh_cooldown() {
    let poller = populated_poller();
    let start = Instant::now();

    assert_eq!(poller.refresh(Trigger::Manual, start), RefreshOutcome::Scanned(3));

    let soon = start + Duration::from_secs(4);
    assert!(!poller.can_refresh(soon));
    assert_eq!(poller.remaining_cooldown(soon), Duration::from_secs(6));
    assert_eq!(
        poller.refresh(Trigger::Manual, soon),
        RefreshOutcome::CoolingDown(Duration::from_secs(6))
    );

    let later = start + Duration::from_secs(10);
    assert!(poller.can_refresh(later));
    assert_eq!(poller.refresh(Trigger::Manual, later), RefreshOutcome::Scanned(3));
}

#[test]
fn test_scheduled_refresh_interval() {
    let poller = populated_poller();
    let start = Instant::now();

    assert_eq!(poller.refresh(Trigger::Scheduled, start), RefreshOutcome::Scanned(3));
    assert_eq!(
        poller.refresh(Trigger::Scheduled, start + Duration::from_secs(20)),
        RefreshOutcome::NotDue(Duration::from_secs(10))
    );
    assert_eq!(poller.next_due(start + Duration::from_secs(20)), Duration::from_secs(10));
    assert_eq!(
        poller.refresh(Trigger::Scheduled, start + Duration::from_secs(30)),
        RefreshOutcome::Scanned(3)
    );
}

#[test]
fn test_manual_refresh_allowed_between_scheduled_scans() {
    let poller = populated_poller();
    let start = Instant::now();

    poller.refresh(Trigger::Scheduled, start);
    assert_eq!(
        poller.refresh(Trigger::Manual, start + Duration::from_secs(15)),
        RefreshOutcome::Scanned(3)
    );
}

/// Store whose listing blocks until released, to hold a scan in flight
struct GatedStore {
    inner: MemoryStore,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl BlobStore for GatedStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        self.inner.list(prefix)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.fetch(key)
    }
}

#[test]
fn test_one_scan_in_flight() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let store = GatedStore {
        inner: populated_store(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };
    let poller = Poller::new(store, Parser::default(), ADDRESS).with_settings(settings());
    let now = Instant::now();

    std::thread::scope(|s| {
        let first = s.spawn(|| poller.refresh(Trigger::Manual, now));

        entered_rx.recv().unwrap();
        assert!(poller.is_scanning());
        assert!(!poller.can_refresh(now));
        assert_eq!(poller.refresh(Trigger::Manual, now), RefreshOutcome::Busy);
        assert_eq!(poller.refresh(Trigger::Scheduled, now), RefreshOutcome::Busy);

        release_tx.send(()).unwrap();
        assert_eq!(first.join().unwrap(), RefreshOutcome::Scanned(3));
    });

    assert!(!poller.is_scanning());
}

struct SharedStore(Arc<Mutex<MemoryStore>>);

impl BlobStore for SharedStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.0.lock().unwrap().list(prefix)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.0.lock().unwrap().fetch(key)
    }
}

#[test]
fn test_results_replace_previous_list() {
    let shared = Arc::new(Mutex::new(populated_store()));
    let poller = Poller::new(SharedStore(Arc::clone(&shared)), Parser::default(), ADDRESS)
        .with_settings(settings());
    let start = Instant::now();

    assert_eq!(poller.refresh(Trigger::Manual, start), RefreshOutcome::Scanned(3));

    *shared.lock().unwrap() = MemoryStore::new().with(
        "email/z",
        message(ADDRESS, "only", "Wed, 17 Sep 2025 10:00:00 +0000"),
    );

    let later = start + Duration::from_secs(10);
    assert_eq!(poller.refresh(Trigger::Manual, later), RefreshOutcome::Scanned(1));
    assert_eq!(subjects(&poller.messages()), vec!["only"]);
}

#[test]
fn test_custom_prefix() {
    let poller = Poller::new(populated_store(), Parser::default(), ADDRESS)
        .with_prefix("other/")
        .with_settings(settings());

    assert_eq!(
        poller.refresh(Trigger::Manual, Instant::now()),
        RefreshOutcome::Scanned(1)
    );
    assert_eq!(subjects(&poller.messages()), vec!["wrong prefix"]);
}
