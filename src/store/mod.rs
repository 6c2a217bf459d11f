pub mod memory;

pub use memory::{MemoryStore, WriteRecord, WriteTarget};

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Документ хранилища: набор полей верхнего уровня
pub type Document = serde_json::Map<String, Value>;

pub type SubscriptionId = u64;

/// Ошибки канала-посредника (хранилища)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("write to {0} failed: {1}")]
    Write(String, String),
    #[error("read of {0} failed: {1}")]
    Read(String, String),
    #[error("failed to encode value: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Encode(e.to_string())
    }
}

/// Путь к документу: `collection/id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Push-подписка на документ или подколлекцию
pub struct Subscription<T> {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub fn new(id: SubscriptionId, rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Следующее уже доставленное уведомление, без ожидания
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// Минимальный контракт документного хранилища, через которое идёт сигналинг.
///
/// Подписки срабатывают сразу с текущим состоянием (документ целиком или все
/// уже существующие элементы подколлекции), затем на каждое изменение.
/// Порядок доставки совпадает с порядком записи одного писателя; между
/// разными клиентами порядок не гарантируется.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Создаёт пустой документ с уникальным id
    async fn create_document(&self, collection: &str) -> Result<String, StoreError>;

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Создаёт документ при отсутствии и задаёт поле, не трогая остальные
    async fn set_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError>;

    async fn append_to_subcollection(
        &self,
        doc: &DocPath,
        sub: &str,
        item: Value,
    ) -> Result<(), StoreError>;

    async fn subscribe_document(&self, doc: &DocPath) -> Result<Subscription<Document>, StoreError>;

    async fn subscribe_collection(
        &self,
        doc: &DocPath,
        sub: &str,
    ) -> Result<Subscription<Value>, StoreError>;

    async fn unsubscribe(&self, id: SubscriptionId);
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn create_document(&self, collection: &str) -> Result<String, StoreError> {
        (**self).create_document(collection).await
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        (**self).get_document(collection, id).await
    }

    async fn set_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        (**self).set_field(collection, id, field, value).await
    }

    async fn append_to_subcollection(
        &self,
        doc: &DocPath,
        sub: &str,
        item: Value,
    ) -> Result<(), StoreError> {
        (**self).append_to_subcollection(doc, sub, item).await
    }

    async fn subscribe_document(&self, doc: &DocPath) -> Result<Subscription<Document>, StoreError> {
        (**self).subscribe_document(doc).await
    }

    async fn subscribe_collection(
        &self,
        doc: &DocPath,
        sub: &str,
    ) -> Result<Subscription<Value>, StoreError> {
        (**self).subscribe_collection(doc, sub).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        (**self).unsubscribe(id).await
    }
}
