//! End-to-end tests of a record store over a directory-backed blob store.

use csvstore_core::{
    Attribute, ChangeKind, CoreError, CriticalSection, Processor, StoreConfig, SyncCollector,
};
use csvstore_storage::{
    BlobReader, BlobStore, FileBlobStore, InMemoryBlobStore, Locator, StorageError, StorageResult,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const FILE: &str = "users.csv";

fn config(snapshots: &Path) -> StoreConfig {
    StoreConfig::new("accounts", FILE)
        .unique_attribute("id")
        .multivalue(",", ["groups"])
        .snapshot_dir(snapshots)
}

struct Fixture {
    root: TempDir,
    snapshots: TempDir,
}

impl Fixture {
    fn new(initial: Option<&str>) -> Self {
        let root = tempfile::tempdir().unwrap();
        if let Some(text) = initial {
            fs::create_dir_all(root.path().join("accounts")).unwrap();
            fs::write(root.path().join("accounts").join(FILE), text).unwrap();
        }
        Self {
            root,
            snapshots: tempfile::tempdir().unwrap(),
        }
    }

    fn open(&self, config: StoreConfig) -> Result<Processor, CoreError> {
        let store = Arc::new(FileBlobStore::new(self.root.path()));
        Processor::open(config, store, Arc::new(CriticalSection::new()))
    }

    fn config(&self) -> StoreConfig {
        config(self.snapshots.path())
    }

    fn contents(&self) -> String {
        fs::read_to_string(self.root.path().join("accounts").join(FILE)).unwrap()
    }

    fn replace(&self, text: &str) {
        fs::write(self.root.path().join("accounts").join(FILE), text).unwrap();
    }
}

#[test]
fn duplicate_titles_are_uniquified() {
    let fixture = Fixture::new(Some("id;name;id\r\n1;alice;x\r\n"));
    let processor = fixture.open(fixture.config()).unwrap();

    let layout = processor.layout();
    let keys: Vec<(&str, usize)> = layout
        .columns()
        .iter()
        .map(|(key, column)| (key, column.ordinal))
        .collect();
    assert_eq!(keys, vec![("id", 0), ("name", 1), ("id1", 2)]);

    let object = processor.get("1").unwrap().unwrap();
    assert_eq!(object.get("id1").unwrap(), ["x"]);
}

#[test]
fn create_then_delete_restores_file() {
    let initial = "id;mail;groups\r\nu1;a@x;g1,g2\r\nu2;b@x;\r\n";
    let fixture = Fixture::new(Some(initial));
    let processor = fixture.open(fixture.config()).unwrap();

    let uid = processor
        .create(vec![
            Attribute::plain("id", "u3"),
            Attribute::plain("mail", "c@x"),
            Attribute::multi("groups", ["g3"]),
        ])
        .unwrap();
    assert_eq!(fixture.contents().lines().count(), 4);

    processor.delete(&uid).unwrap();
    assert_eq!(fixture.contents(), initial);
}

#[test]
fn read_only_store_leaves_file_untouched() {
    let initial = "id;mail\r\nu1;a@x\r\n";
    let fixture = Fixture::new(Some(initial));
    let processor = fixture.open(fixture.config().read_only(true)).unwrap();

    let err = processor
        .create(vec![Attribute::plain("id", "u2"), Attribute::plain("phone", "555")])
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownAttribute { name } if name == "phone"));

    let err = processor
        .update("u1", vec![Attribute::plain("nickname", "al")])
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownAttribute { .. }));

    assert_eq!(fixture.contents(), initial);
    assert_eq!(processor.layout().width(), 2);
}

#[test]
fn add_then_remove_value_is_idempotent() {
    let initial = "id;groups\r\nu1;g1,g2\r\n";
    let fixture = Fixture::new(Some(initial));
    let processor = fixture.open(fixture.config()).unwrap();

    processor
        .add_attribute_values("u1", vec![Attribute::plain("groups", "g3")])
        .unwrap();
    assert_eq!(processor.get("u1").unwrap().unwrap().get("groups").unwrap(), ["g1", "g2", "g3"]);

    processor
        .remove_attribute_values("u1", vec![Attribute::plain("groups", "g3")])
        .unwrap();
    assert_eq!(processor.get("u1").unwrap().unwrap().get("groups").unwrap(), ["g1", "g2"]);
    assert_eq!(fixture.contents(), initial);
}

#[test]
fn sync_against_itself_reports_no_changes() {
    let fixture = Fixture::new(Some("id;mail\r\nu1;a\r\nu2;b\r\n"));
    let processor = fixture.open(fixture.config()).unwrap();
    let token = processor.latest_sync_token().unwrap();

    let mut collector = SyncCollector::new();
    let next = processor.sync(&token.to_string(), &mut collector).unwrap();

    assert!(collector.events.is_empty());
    assert_eq!(collector.tokens, vec![next]);
    assert!(next > token);
}

#[test]
fn sync_reports_delete_after_create() {
    let fixture = Fixture::new(Some("id;col\r\nu1;a,b\r\nu2;c,d\r\n"));
    let processor = fixture.open(fixture.config()).unwrap();
    let token = processor.latest_sync_token().unwrap();

    fixture.replace("id;col\r\nu1;a,b\r\nu3;e,f\r\n");
    let mut collector = SyncCollector::new();
    processor.sync(&token.to_string(), &mut collector).unwrap();

    let events: Vec<(ChangeKind, &str)> = collector
        .events
        .iter()
        .map(|event| (event.kind, event.object.uid.as_str()))
        .collect();
    assert_eq!(events, vec![(ChangeKind::Create, "u3"), (ChangeKind::Delete, "u2")]);
}

#[test]
fn sync_follows_writes_made_through_the_store() {
    let fixture = Fixture::new(None);
    let processor = fixture.open(fixture.config()).unwrap();
    processor.create(vec![Attribute::plain("id", "u1")]).unwrap();
    let token = processor.latest_sync_token().unwrap();

    processor.create(vec![Attribute::plain("id", "u2")]).unwrap();
    processor.update("u1", vec![Attribute::uid("u1b")]).unwrap();

    let mut collector = SyncCollector::new();
    let next = processor.sync(&token.to_string(), &mut collector).unwrap();
    let kinds: Vec<(ChangeKind, String)> = collector
        .events
        .into_iter()
        .map(|event| (event.kind, event.object.uid))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ChangeKind::Create, "u1b".to_string()),
            (ChangeKind::Create, "u2".to_string()),
            (ChangeKind::Delete, "u1".to_string()),
        ]
    );

    // The next round starts from the snapshot just taken.
    let mut collector = SyncCollector::new();
    processor.sync(&next.to_string(), &mut collector).unwrap();
    assert!(collector.events.is_empty());
}

#[test]
fn headerless_files_use_synthesized_columns() {
    let fixture = Fixture::new(Some("u1;alice\r\nu2;bob\r\n"));
    let config = StoreConfig::new("accounts", FILE)
        .unique_attribute("col0")
        .header_exists(false)
        .snapshot_dir(fixture.snapshots.path());
    let processor = fixture.open(config).unwrap();

    let objects = processor.list().unwrap();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[1].get("col1").unwrap(), ["bob"]);

    processor
        .create(vec![Attribute::plain("col0", "u3"), Attribute::plain("col1", "carol")])
        .unwrap();
    assert_eq!(fixture.contents(), "u1;alice\r\nu2;bob\r\nu3;carol\r\n");
}

/// Blob store whose uploads always fail.
struct FailingStore {
    inner: InMemoryBlobStore,
}

impl BlobStore for FailingStore {
    fn exists(&self, locator: &Locator) -> StorageResult<bool> {
        self.inner.exists(locator)
    }

    fn open_reader(&self, locator: &Locator) -> StorageResult<Option<BlobReader>> {
        self.inner.open_reader(locator)
    }

    fn write_all(&self, _locator: &Locator, _data: &[u8]) -> StorageResult<()> {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "upload rejected",
        )))
    }

    fn ensure_container(&self, container: &str) -> StorageResult<()> {
        self.inner.ensure_container(container)
    }
}

#[test]
fn failed_upload_keeps_previous_state() {
    let locator = Locator::new("accounts", FILE);
    let initial = b"id;mail\r\nu1;a@x\r\n".to_vec();
    let store = Arc::new(FailingStore {
        inner: InMemoryBlobStore::with_object(&locator, initial.clone()),
    });
    let processor = Processor::open(
        config(Path::new("unused")),
        store.clone(),
        Arc::new(CriticalSection::new()),
    )
    .unwrap();

    let err = processor
        .create(vec![Attribute::plain("id", "u2"), Attribute::plain("phone", "555")])
        .unwrap_err();
    assert!(matches!(err, CoreError::Storage(_)));
    assert_eq!(processor.layout().width(), 2);
    assert_eq!(store.inner.object(&locator).unwrap(), initial);
}
