use crate::application::retry::RetryExecutor;
use crate::domain::ports::SnapshotStoreRef;
use crate::domain::snapshot::{Namespace, Snapshot};
use crate::error::{OnboardingError, ProviderError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Remote fetch-on-miss source for one entity family.
#[async_trait]
pub trait RemoteFetch: Send + Sync {
    async fn fetch(&self, id: &str) -> std::result::Result<Value, ProviderError>;
}

pub type RemoteFetchRef = Arc<dyn RemoteFetch>;

/// Teardown kill switch shared by every cache instance of a session.
///
/// Once ended, cache writes become silent no-ops and reads fail with
/// `SessionEnded`, so a shutdown can never race a late cache write.
#[derive(Clone, Default)]
pub struct SessionFlag(Arc<AtomicBool>);

impl SessionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn end(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_ended(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Read-through cache over remote entity snapshots.
///
/// A hit serves the last locally written snapshot; a miss issues exactly one
/// full remote fetch (through the retry executor) and writes the result back
/// before returning. Writes are whole-object replacements, so concurrent
/// flows may observe old or new state but never a torn snapshot. There is no
/// cross-request mutual exclusion; the provider's own conflict signaling is
/// the only defense against concurrent edits.
pub struct ReadThroughCache {
    namespace: Namespace,
    store: SnapshotStoreRef,
    remote: RemoteFetchRef,
    retry: RetryExecutor,
    session: SessionFlag,
}

impl ReadThroughCache {
    pub fn new(
        namespace: Namespace,
        store: SnapshotStoreRef,
        remote: RemoteFetchRef,
        retry: RetryExecutor,
        session: SessionFlag,
    ) -> Self {
        Self {
            namespace,
            store,
            remote,
            retry,
            session,
        }
    }

    /// Returns the cached snapshot, fetching from the remote on a miss.
    /// An id the remote consistently reports missing maps to `NotFound`.
    pub async fn retrieve(&self, id: &str) -> Result<Snapshot> {
        if self.session.is_ended() {
            return Err(OnboardingError::SessionEnded);
        }

        let key = self.namespace.key(id);
        if let Some(raw) = self.store.read(&key).await? {
            debug!(namespace = self.namespace.prefix(), id, "cache hit");
            return Ok(Snapshot::new(id, serde_json::from_str(&raw)?));
        }

        debug!(namespace = self.namespace.prefix(), id, "cache miss");
        let remote = self.remote.clone();
        let wanted = id.to_owned();
        let fetched = self
            .retry
            .execute(move || {
                let remote = remote.clone();
                let wanted = wanted.clone();
                async move { remote.fetch(&wanted).await }
            })
            .await;

        let data = match fetched {
            Ok(data) => data,
            Err(OnboardingError::RetriesExhausted { last, .. })
                if last.code == "resource_missing" =>
            {
                return Err(OnboardingError::NotFound { id: id.to_owned() });
            }
            Err(error) => return Err(error),
        };

        let snapshot = Snapshot::from_remote(data)?;
        self.store
            .write(&key, &serde_json::to_string(&snapshot.data)?)
            .await?;
        Ok(snapshot)
    }

    /// Unconditionally overwrites the local entry with an authoritative
    /// snapshot, typically the full state a mutation returned.
    pub async fn update(&self, snapshot: &Snapshot) -> Result<()> {
        if self.session.is_ended() {
            return Ok(());
        }
        let key = self.namespace.key(&snapshot.id);
        self.store
            .write(&key, &serde_json::to_string(&snapshot.data)?)
            .await
    }

    /// Removes the local entry. Deleting an absent id is a no-op.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.session.is_ended() {
            return Ok(());
        }
        self.store.delete(&self.namespace.key(id)).await
    }
}

/// Person id → owning account id index, used to authorize access to remote
/// person records. Created when a sub-entity is created, removed when it is
/// deleted.
pub struct IdentityMap {
    store: SnapshotStoreRef,
    session: SessionFlag,
}

impl IdentityMap {
    pub fn new(store: SnapshotStoreRef, session: SessionFlag) -> Self {
        Self { store, session }
    }

    pub async fn record(&self, person_id: &str, account_id: &str) -> Result<()> {
        if self.session.is_ended() {
            return Ok(());
        }
        self.store
            .write(&Namespace::PersonOwner.key(person_id), account_id)
            .await
    }

    /// The owning account for a person id. A missing mapping is an
    /// invalid-id style `NotFound`, not a provider round-trip.
    pub async fn owner_of(&self, person_id: &str) -> Result<String> {
        if self.session.is_ended() {
            return Err(OnboardingError::SessionEnded);
        }
        self.store
            .read(&Namespace::PersonOwner.key(person_id))
            .await?
            .ok_or_else(|| OnboardingError::NotFound {
                id: person_id.to_owned(),
            })
    }

    pub async fn forget(&self, person_id: &str) -> Result<()> {
        if self.session.is_ended() {
            return Ok(());
        }
        self.store.delete(&Namespace::PersonOwner.key(person_id)).await
    }
}
