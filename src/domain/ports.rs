use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// The nested request payload shape the remote API expects. Built fresh per
/// compile and discarded after submission.
pub type NestedPayload = Map<String, Value>;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Remote provider API, at its interface boundary.
///
/// Every call returns either a full entity snapshot or a classified
/// [`ProviderError`]; the application layer decides what is retried and what
/// is fatal. HTTP transport, auth keys and wire formats live behind this
/// trait and are out of scope here.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn retrieve_account(&self, id: &str) -> ProviderResult<Value>;
    async fn update_account(&self, id: &str, payload: &NestedPayload) -> ProviderResult<Value>;

    async fn create_person(&self, account_id: &str, payload: &NestedPayload)
    -> ProviderResult<Value>;
    async fn retrieve_person(&self, account_id: &str, person_id: &str) -> ProviderResult<Value>;
    async fn update_person(
        &self,
        account_id: &str,
        person_id: &str,
        payload: &NestedPayload,
    ) -> ProviderResult<Value>;
    async fn delete_person(&self, account_id: &str, person_id: &str) -> ProviderResult<()>;

    async fn retrieve_payout(&self, account_id: &str, payout_id: &str) -> ProviderResult<Value>;

    /// Resolves an in-memory file buffer to a remote file identifier.
    async fn upload_file(&self, bytes: &[u8], purpose: &str) -> ProviderResult<String>;
}

pub type ProviderGatewayRef = Arc<dyn ProviderGateway>;

/// Local persistent key-value store backing the snapshot cache and the
/// person ownership index. Values are whole JSON strings; a write replaces
/// the previous value, so readers never observe a torn entry.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>>;
    async fn write(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub type SnapshotStoreRef = Arc<dyn SnapshotStore>;
