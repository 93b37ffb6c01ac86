//! Facade serving several object classes, one [`Processor`] each.

use crate::config::ConnectorConfig;
use crate::error::{CoreError, CoreResult};
use crate::lock::CriticalSection;
use crate::processor::Processor;
use crate::record::StoreObject;
use crate::schema::ObjectClassInfo;
use crate::sync::{SyncHandler, SyncToken};
use crate::value::{Attribute, Secret};
use csvstore_storage::BlobStore;
use std::sync::Arc;

/// Dispatches operations to the processor of the requested object class.
///
/// All processors share one critical section, so writes to different files
/// are serialized as well.
#[derive(Debug)]
pub struct Connector {
    processors: Vec<Processor>,
    section: Arc<CriticalSection>,
}

impl Connector {
    /// Opens a processor for every configured object class.
    ///
    /// # Errors
    ///
    /// Fails when no object class is configured, when a class is configured
    /// twice, or when any processor fails to open.
    pub fn open(config: ConnectorConfig, store: Arc<dyn BlobStore>) -> CoreResult<Self> {
        if config.object_classes.is_empty() {
            return Err(CoreError::configuration("no object class configured"));
        }

        let section = Arc::new(CriticalSection::new());
        let mut processors: Vec<Processor> = Vec::with_capacity(config.object_classes.len());
        for class in config.object_classes {
            if processors
                .iter()
                .any(|p| p.object_class() == class.object_class)
            {
                return Err(CoreError::configuration(format!(
                    "object class '{}' is configured more than once",
                    class.object_class
                )));
            }
            processors.push(Processor::open(class, Arc::clone(&store), Arc::clone(&section))?);
        }

        tracing::info!(object_classes = processors.len(), "connector initialized");
        Ok(Self { processors, section })
    }

    /// Names of the served object classes, in configuration order.
    pub fn object_classes(&self) -> impl Iterator<Item = &str> {
        self.processors.iter().map(Processor::object_class)
    }

    /// The critical section shared by every processor.
    pub fn critical_section(&self) -> &Arc<CriticalSection> {
        &self.section
    }

    /// Returns the processor serving `object_class`.
    ///
    /// # Errors
    ///
    /// Fails with `Configuration` for an unknown object class.
    pub fn processor(&self, object_class: &str) -> CoreResult<&Processor> {
        self.processors
            .iter()
            .find(|p| p.object_class() == object_class)
            .ok_or_else(|| {
                CoreError::configuration(format!("unsupported object class '{object_class}'"))
            })
    }

    fn run<T>(
        &self,
        operation: &str,
        object_class: &str,
        f: impl FnOnce(&Processor) -> CoreResult<T>,
    ) -> CoreResult<T> {
        tracing::info!(object_class, ">>> {operation} started");
        let result = self.processor(object_class).and_then(f);
        match &result {
            Ok(_) => tracing::info!(object_class, ">>> {operation} finished"),
            Err(e) => tracing::warn!(object_class, error = %e, ">>> {operation} failed"),
        }
        result
    }

    /// Describes every object class.
    pub fn schema(&self) -> Vec<ObjectClassInfo> {
        tracing::info!(">>> schema started");
        let schema = self.processors.iter().map(Processor::schema).collect();
        tracing::info!(">>> schema finished");
        schema
    }

    /// Tests every processor.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub fn test(&self) -> CoreResult<()> {
        tracing::info!(">>> test started");
        for processor in &self.processors {
            processor.test()?;
        }
        tracing::info!(">>> test finished");
        Ok(())
    }

    /// See [`Processor::search`].
    ///
    /// # Errors
    ///
    /// Fails for an unknown object class or when the search fails.
    pub fn search<F>(&self, object_class: &str, uid: Option<&str>, handler: F) -> CoreResult<()>
    where
        F: FnMut(StoreObject) -> bool,
    {
        self.run("search", object_class, |p| p.search(uid, handler))
    }

    /// See [`Processor::create`].
    ///
    /// # Errors
    ///
    /// Fails for an unknown object class or when the create fails.
    pub fn create(&self, object_class: &str, attributes: Vec<Attribute>) -> CoreResult<String> {
        self.run("create", object_class, |p| p.create(attributes))
    }

    /// See [`Processor::update`].
    ///
    /// # Errors
    ///
    /// Fails for an unknown object class or when the update fails.
    pub fn update(&self, object_class: &str, uid: &str, attributes: Vec<Attribute>) -> CoreResult<String> {
        self.run("update", object_class, |p| p.update(uid, attributes))
    }

    /// See [`Processor::add_attribute_values`].
    ///
    /// # Errors
    ///
    /// Fails for an unknown object class or when the update fails.
    pub fn add_attribute_values(
        &self,
        object_class: &str,
        uid: &str,
        attributes: Vec<Attribute>,
    ) -> CoreResult<String> {
        self.run("add_attribute_values", object_class, |p| {
            p.add_attribute_values(uid, attributes)
        })
    }

    /// See [`Processor::remove_attribute_values`].
    ///
    /// # Errors
    ///
    /// Fails for an unknown object class or when the update fails.
    pub fn remove_attribute_values(
        &self,
        object_class: &str,
        uid: &str,
        attributes: Vec<Attribute>,
    ) -> CoreResult<String> {
        self.run("remove_attribute_values", object_class, |p| {
            p.remove_attribute_values(uid, attributes)
        })
    }

    /// See [`Processor::delete`].
    ///
    /// # Errors
    ///
    /// Fails for an unknown object class or when the delete fails.
    pub fn delete(&self, object_class: &str, uid: &str) -> CoreResult<()> {
        self.run("delete", object_class, |p| p.delete(uid))
    }

    /// See [`Processor::resolve_username`].
    ///
    /// # Errors
    ///
    /// Fails for an unknown object class or an unknown user.
    pub fn resolve_username(&self, object_class: &str, username: &str) -> CoreResult<String> {
        self.run("resolve_username", object_class, |p| p.resolve_username(username))
    }

    /// See [`Processor::authenticate`].
    ///
    /// # Errors
    ///
    /// Fails for an unknown object class or invalid credentials.
    pub fn authenticate(&self, object_class: &str, username: &str, password: &Secret) -> CoreResult<String> {
        self.run("authenticate", object_class, |p| p.authenticate(username, password))
    }

    /// See [`Processor::sync`].
    ///
    /// # Errors
    ///
    /// Fails for an unknown object class or when the diff fails.
    pub fn sync<H>(&self, object_class: &str, token: &str, handler: &mut H) -> CoreResult<SyncToken>
    where
        H: SyncHandler + ?Sized,
    {
        self.run("sync", object_class, |p| p.sync(token, handler))
    }

    /// See [`Processor::latest_sync_token`].
    ///
    /// # Errors
    ///
    /// Fails for an unknown object class or when the capture fails.
    pub fn latest_sync_token(&self, object_class: &str) -> CoreResult<SyncToken> {
        self.run("latest_sync_token", object_class, Processor::latest_sync_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use csvstore_storage::InMemoryBlobStore;
    use parking_lot::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Records the level and message of every event.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<(Level, String)>>>);

    struct Message(String);

    impl Visit for Message {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = Message(String::new());
            event.record(&mut message);
            self.0.lock().push((*event.metadata().level(), message.0));
        }
    }

    fn connector(store: Arc<InMemoryBlobStore>) -> Connector {
        let config = ConnectorConfig::new(vec![
            StoreConfig::new("directory", "users.csv").unique_attribute("id"),
            StoreConfig::new("directory", "groups.csv")
                .object_class("group")
                .unique_attribute("name"),
        ]);
        Connector::open(config, store).unwrap()
    }

    #[test]
    fn dispatches_by_object_class() {
        let store = Arc::new(InMemoryBlobStore::new());
        let connector = connector(store.clone());
        assert_eq!(connector.object_classes().collect::<Vec<_>>(), vec!["__ACCOUNT__", "group"]);

        connector
            .create("__ACCOUNT__", vec![Attribute::plain("id", "u1")])
            .unwrap();
        connector
            .create("group", vec![Attribute::plain("name", "admins")])
            .unwrap();

        let mut groups = Vec::new();
        connector
            .search("group", None, |object| {
                groups.push(object.uid);
                true
            })
            .unwrap();
        assert_eq!(groups, vec!["admins"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unknown_object_class_is_a_configuration_error() {
        let connector = connector(Arc::new(InMemoryBlobStore::new()));
        let err = connector.delete("printer", "p1").unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn rejects_empty_and_duplicate_configuration() {
        let store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        assert!(Connector::open(ConnectorConfig::default(), Arc::clone(&store)).is_err());

        let twice = ConnectorConfig::new(vec![
            StoreConfig::new("directory", "a.csv").unique_attribute("id"),
            StoreConfig::new("directory", "b.csv").unique_attribute("id"),
        ]);
        assert!(Connector::open(twice, store).is_err());
    }

    #[test]
    fn schema_lists_every_class() {
        let connector = connector(Arc::new(InMemoryBlobStore::new()));
        let names: Vec<String> = connector.schema().into_iter().map(|info| info.name).collect();
        assert_eq!(names, vec!["__ACCOUNT__", "group"]);
        connector.test().unwrap();
    }

    #[test]
    fn failed_operations_are_logged_as_warnings() {
        let connector = connector(Arc::new(InMemoryBlobStore::new()));
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());
        let result = tracing::subscriber::with_default(subscriber, || connector.delete("__ACCOUNT__", "u9"));
        assert!(matches!(result, Err(CoreError::NotFound { .. })));

        let events = captured.0.lock();
        assert!(events
            .iter()
            .any(|(level, message)| *level == Level::WARN && message == ">>> delete failed"));
        assert!(events
            .iter()
            .any(|(level, message)| *level == Level::INFO && message == ">>> delete started"));
    }
}
