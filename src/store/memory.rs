use crate::store::{DocPath, Document, DocumentStore, StoreError, Subscription, SubscriptionId};
use crate::utils::random_id;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Что именно было записано
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    CreateDocument,
    Field(String),
    Subcollection(String),
}

/// Запись в журнале операций: кто и куда писал
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub client: String,
    pub path: DocPath,
    pub target: WriteTarget,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<DocPath, Document>,
    subcollections: HashMap<(DocPath, String), Vec<Value>>,
    doc_subs: HashMap<SubscriptionId, (DocPath, mpsc::UnboundedSender<Document>)>,
    coll_subs: HashMap<SubscriptionId, (DocPath, String, mpsc::UnboundedSender<Value>)>,
    next_sub: SubscriptionId,
    writes: Vec<WriteRecord>,
    unsubscribes: usize,
    fail_field_writes: bool,
    fail_appends: bool,
}

impl Inner {
    fn allocate_sub(&mut self) -> SubscriptionId {
        self.next_sub += 1;
        self.next_sub
    }

    fn notify_document(&mut self, path: &DocPath) {
        let snapshot = self.docs.get(path).cloned().unwrap_or_default();
        self.doc_subs
            .retain(|_, (p, tx)| *p != *path || tx.send(snapshot.clone()).is_ok());
    }

    fn notify_item(&mut self, path: &DocPath, sub: &str, item: &Value) {
        self.coll_subs
            .retain(|_, (p, s, tx)| *p != *path || s.as_str() != sub || tx.send(item.clone()).is_ok());
    }
}

/// Документное хранилище в памяти.
///
/// Клоны через [`MemoryStore::connect`] разделяют одно состояние и отличаются
/// только именем клиента в журнале записей, как два браузера над одной базой.
#[derive(Clone)]
pub struct MemoryStore {
    client: String,
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            client: "default".into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Ещё один клиент того же хранилища
    pub fn connect(&self, client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            inner: self.inner.clone(),
        }
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    /// Журнал всех записей всех клиентов
    pub async fn writes(&self) -> Vec<WriteRecord> {
        self.inner.lock().await.writes.clone()
    }

    /// Записи одного клиента
    pub async fn writes_by(&self, client: &str) -> Vec<WriteRecord> {
        self.inner
            .lock()
            .await
            .writes
            .iter()
            .filter(|w| w.client == client)
            .cloned()
            .collect()
    }

    pub async fn subcollection(&self, doc: &DocPath, sub: &str) -> Vec<Value> {
        self.inner
            .lock()
            .await
            .subcollections
            .get(&(doc.clone(), sub.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn active_subscriptions(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.doc_subs.len() + inner.coll_subs.len()
    }

    pub async fn unsubscribe_count(&self) -> usize {
        self.inner.lock().await.unsubscribes
    }

    pub async fn set_fail_field_writes(&self, fail: bool) {
        self.inner.lock().await.fail_field_writes = fail;
    }

    pub async fn set_fail_appends(&self, fail: bool) {
        self.inner.lock().await.fail_appends = fail;
    }

    /// Повторно доставляет текущее состояние всем подписчикам (как после переподключения)
    pub async fn redeliver(&self) {
        let mut inner = self.inner.lock().await;
        let doc_paths: Vec<DocPath> = inner.doc_subs.values().map(|(p, _)| p.clone()).collect();
        for path in doc_paths {
            inner.notify_document(&path);
        }
        let colls: Vec<(DocPath, String)> = inner
            .coll_subs
            .values()
            .map(|(p, s, _)| (p.clone(), s.clone()))
            .collect();
        for (path, sub) in colls {
            let items = inner
                .subcollections
                .get(&(path.clone(), sub.clone()))
                .cloned()
                .unwrap_or_default();
            for item in &items {
                inner.notify_item(&path, &sub, item);
            }
        }
    }

    fn record(&self, inner: &mut Inner, path: DocPath, target: WriteTarget) {
        inner.writes.push(WriteRecord {
            client: self.client.clone(),
            path,
            target,
        });
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(&self, collection: &str) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = loop {
            let id = random_id();
            if !inner.docs.contains_key(&DocPath::new(collection, id.as_str())) {
                break id;
            }
        };
        let path = DocPath::new(collection, id.as_str());
        inner.docs.insert(path.clone(), Document::new());
        self.record(&mut inner, path, WriteTarget::CreateDocument);
        debug!(client = %self.client, collection, id = %id, "document created");
        Ok(id)
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.docs.get(&DocPath::new(collection, id)).cloned())
    }

    async fn set_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let path = DocPath::new(collection, id);
        if inner.fail_field_writes {
            return Err(StoreError::Write(path.to_string(), "injected failure".into()));
        }
        inner
            .docs
            .entry(path.clone())
            .or_default()
            .insert(field.to_string(), value);
        self.record(&mut inner, path.clone(), WriteTarget::Field(field.to_string()));
        inner.notify_document(&path);
        Ok(())
    }

    async fn append_to_subcollection(
        &self,
        doc: &DocPath,
        sub: &str,
        item: Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_appends {
            return Err(StoreError::Write(format!("{doc}/{sub}"), "injected failure".into()));
        }
        inner
            .subcollections
            .entry((doc.clone(), sub.to_string()))
            .or_default()
            .push(item.clone());
        self.record(&mut inner, doc.clone(), WriteTarget::Subcollection(sub.to_string()));
        inner.notify_item(doc, sub, &item);
        Ok(())
    }

    async fn subscribe_document(&self, doc: &DocPath) -> Result<Subscription<Document>, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.allocate_sub();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(inner.docs.get(doc).cloned().unwrap_or_default());
        inner.doc_subs.insert(id, (doc.clone(), tx));
        Ok(Subscription::new(id, rx))
    }

    async fn subscribe_collection(
        &self,
        doc: &DocPath,
        sub: &str,
    ) -> Result<Subscription<Value>, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.allocate_sub();
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(items) = inner.subcollections.get(&(doc.clone(), sub.to_string())) {
            for item in items {
                let _ = tx.send(item.clone());
            }
        }
        inner.coll_subs.insert(id, (doc.clone(), sub.to_string(), tx));
        Ok(Subscription::new(id, rx))
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().await;
        inner.unsubscribes += 1;
        inner.doc_subs.remove(&id);
        inner.coll_subs.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_field_does_not_clobber_other_fields() {
        let store = MemoryStore::new();
        store.set_field("calls", "a", "offer", json!(1)).await.unwrap();
        store.set_field("calls", "a", "answer", json!(2)).await.unwrap();
        let doc = store.get_document("calls", "a").await.unwrap().unwrap();
        assert_eq!(doc.get("offer"), Some(&json!(1)));
        assert_eq!(doc.get("answer"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn document_subscription_fires_with_current_state_then_changes() {
        let store = MemoryStore::new();
        let id = store.create_document("calls").await.unwrap();
        let path = DocPath::new("calls", id.as_str());
        store.set_field("calls", &id, "offer", json!("o")).await.unwrap();

        let mut sub = store.subscribe_document(&path).await.unwrap();
        let first = sub.try_recv().unwrap();
        assert_eq!(first.get("offer"), Some(&json!("o")));
        assert!(sub.try_recv().is_none());

        store.set_field("calls", &id, "answer", json!("a")).await.unwrap();
        let second = sub.try_recv().unwrap();
        assert_eq!(second.get("answer"), Some(&json!("a")));
    }

    #[tokio::test]
    async fn collection_subscription_replays_existing_items_in_order() {
        let store = MemoryStore::new();
        let path = DocPath::new("calls", "x");
        store.append_to_subcollection(&path, "c", json!(1)).await.unwrap();
        store.append_to_subcollection(&path, "c", json!(2)).await.unwrap();
        store.append_to_subcollection(&path, "other", json!(9)).await.unwrap();

        let mut sub = store.subscribe_collection(&path, "c").await.unwrap();
        store.append_to_subcollection(&path, "c", json!(3)).await.unwrap();

        let got: Vec<Value> = std::iter::from_fn(|| sub.try_recv()).collect();
        assert_eq!(got, vec![json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let store = MemoryStore::new();
        let path = DocPath::new("calls", "x");
        let mut sub = store.subscribe_collection(&path, "c").await.unwrap();
        store.unsubscribe(sub.id()).await;
        store.append_to_subcollection(&path, "c", json!(1)).await.unwrap();
        assert!(sub.try_recv().is_none());
        assert_eq!(store.unsubscribe_count().await, 1);
        assert_eq!(store.active_subscriptions().await, 0);
    }

    #[tokio::test]
    async fn connected_clients_share_state_and_are_logged_separately() {
        let backend = MemoryStore::new();
        let alice = backend.connect("alice");
        let bob = backend.connect("bob");
        let id = alice.create_document("calls").await.unwrap();
        bob.set_field("calls", &id, "answer", json!("a")).await.unwrap();

        assert!(alice.get_document("calls", &id).await.unwrap().is_some());
        assert_eq!(backend.writes_by("alice").await.len(), 1);
        assert_eq!(
            backend.writes_by("bob").await[0].target,
            WriteTarget::Field("answer".into())
        );
    }

    #[tokio::test]
    async fn injected_failures_surface_as_store_errors() {
        let store = MemoryStore::new();
        store.set_fail_field_writes(true).await;
        let err = store.set_field("calls", "a", "offer", json!(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Write(_, _)));
        assert!(store.get_document("calls", "a").await.unwrap().is_none());
    }
}
