use crate::application::cache::{
    IdentityMap, ReadThroughCache, RemoteFetch, RemoteFetchRef, SessionFlag,
};
use crate::application::compiler::{CompilePolicy, RequirementsCompiler};
use crate::application::retry::{RetryExecutor, RetryPolicy};
use crate::domain::collection::{CollectionRecord, PersonCollection};
use crate::domain::entity::EntityKind;
use crate::domain::ports::{NestedPayload, ProviderGatewayRef, SnapshotStoreRef};
use crate::domain::requirement::{FieldRequirement, FlatSubmission, FlatValue};
use crate::domain::snapshot::{Namespace, Snapshot};
use crate::error::{OnboardingError, ProviderError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Process-wide configuration for the onboarding flows.
#[derive(Debug, Clone, Default)]
pub struct OnboardingConfig {
    /// Compile-time lookups and exemptions, shared by every flow. The
    /// entity's country is filled in per run from its snapshot.
    pub compile: CompilePolicy,
    pub retry: RetryPolicy,
}

struct AccountFetcher {
    gateway: ProviderGatewayRef,
}

#[async_trait]
impl RemoteFetch for AccountFetcher {
    async fn fetch(&self, id: &str) -> std::result::Result<Value, ProviderError> {
        self.gateway.retrieve_account(id).await
    }
}

struct PersonFetcher {
    gateway: ProviderGatewayRef,
    store: SnapshotStoreRef,
}

#[async_trait]
impl RemoteFetch for PersonFetcher {
    async fn fetch(&self, id: &str) -> std::result::Result<Value, ProviderError> {
        // The service authorizes through the identity map before reaching
        // this point; a missing mapping here means a concurrent delete won.
        // A store failure is not the same thing and must fail fast instead
        // of burning retries as if the person were still propagating.
        let owner = match self.store.read(&Namespace::PersonOwner.key(id)).await {
            Ok(Some(owner)) => owner,
            Ok(None) => return Err(ProviderError::new("resource_missing", "no owning account")),
            Err(error) => {
                return Err(ProviderError::new(
                    "internal_storage_error",
                    error.to_string(),
                ));
            }
        };
        self.gateway.retrieve_person(&owner, id).await
    }
}

struct PayoutFetcher {
    gateway: ProviderGatewayRef,
}

#[async_trait]
impl RemoteFetch for PayoutFetcher {
    async fn fetch(&self, id: &str) -> std::result::Result<Value, ProviderError> {
        // Payout cache ids are "account:payout" since a payout is only
        // addressable through its account.
        let (account, payout) = id
            .split_once(':')
            .ok_or_else(|| ProviderError::new("resource_missing", "malformed payout key"))?;
        self.gateway.retrieve_payout(account, payout).await
    }
}

/// End-to-end onboarding flows: form submission → compiled payload → remote
/// mutation (through retry) → cache refresh.
///
/// Cache and identity state are explicit instance members with a shared
/// session flag; ending the session makes every cached operation a no-op so
/// teardown never races a late write.
pub struct OnboardingService {
    gateway: ProviderGatewayRef,
    accounts: ReadThroughCache,
    persons: ReadThroughCache,
    payouts: ReadThroughCache,
    identity: IdentityMap,
    retry: RetryExecutor,
    session: SessionFlag,
    config: OnboardingConfig,
}

impl OnboardingService {
    pub fn new(
        gateway: ProviderGatewayRef,
        store: SnapshotStoreRef,
        config: OnboardingConfig,
    ) -> Self {
        let session = SessionFlag::new();
        let retry = RetryExecutor::new(config.retry);

        let account_fetch: RemoteFetchRef = Arc::new(AccountFetcher {
            gateway: gateway.clone(),
        });
        let person_fetch: RemoteFetchRef = Arc::new(PersonFetcher {
            gateway: gateway.clone(),
            store: store.clone(),
        });
        let payout_fetch: RemoteFetchRef = Arc::new(PayoutFetcher {
            gateway: gateway.clone(),
        });

        Self {
            accounts: ReadThroughCache::new(
                Namespace::Accounts,
                store.clone(),
                account_fetch,
                retry.clone(),
                session.clone(),
            ),
            persons: ReadThroughCache::new(
                Namespace::Persons,
                store.clone(),
                person_fetch,
                retry.clone(),
                session.clone(),
            ),
            payouts: ReadThroughCache::new(
                Namespace::Payouts,
                store.clone(),
                payout_fetch,
                retry.clone(),
                session.clone(),
            ),
            identity: IdentityMap::new(store, session.clone()),
            gateway,
            retry,
            session,
            config,
        }
    }

    /// The teardown flag. Ending it short-circuits all cache operations.
    pub fn session(&self) -> SessionFlag {
        self.session.clone()
    }

    /// Cancels pending retries; in-flight remote calls are not interrupted
    /// but no further attempt is made.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.retry.cancellation_token()
    }

    pub async fn account(&self, account_id: &str) -> Result<Snapshot> {
        self.accounts.retrieve(account_id).await
    }

    /// Authorizes through the identity map, then serves the person snapshot.
    pub async fn person(&self, person_id: &str) -> Result<Snapshot> {
        self.identity.owner_of(person_id).await?;
        self.persons.retrieve(person_id).await
    }

    pub async fn payout(&self, account_id: &str, payout_id: &str) -> Result<Snapshot> {
        self.payouts
            .retrieve(&format!("{account_id}:{payout_id}"))
            .await
    }

    /// Compiles the account's currently-due requirements against a form
    /// submission and pushes the result to the provider. The authoritative
    /// snapshot the provider returns replaces the cached one.
    pub async fn submit_account(
        &self,
        account_id: &str,
        kind: EntityKind,
        mut submission: FlatSubmission,
    ) -> Result<Snapshot> {
        let current = self.accounts.retrieve(account_id).await?;
        let requirements = current.requirements().to_field_requirements();

        self.resolve_documents(&mut submission).await?;
        let payload = self
            .compiler_for(kind, current.str_field("country"))
            .compile(&requirements, &submission)?;

        let updated = self
            .retry
            .execute({
                let gateway = self.gateway.clone();
                let account_id = account_id.to_owned();
                move || {
                    let gateway = gateway.clone();
                    let account_id = account_id.clone();
                    let payload = payload.clone();
                    async move { gateway.update_account(&account_id, &payload).await }
                }
            })
            .await?;
        let updated = Snapshot::from_remote(updated)?;
        self.accounts.update(&updated).await?;
        info!(account = account_id, "account submission applied");
        Ok(updated)
    }

    /// Creates a person record under an account. Requirements are supplied by
    /// the caller since a not-yet-existing person has no declared list.
    pub async fn create_person(
        &self,
        account_id: &str,
        kind: EntityKind,
        requirements: &[FieldRequirement],
        mut submission: FlatSubmission,
    ) -> Result<Snapshot> {
        if !kind.is_person() {
            return Err(OnboardingError::validation(
                "kind",
                "expected a person entity kind",
            ));
        }

        self.resolve_documents(&mut submission).await?;
        let account = self.accounts.retrieve(account_id).await?;
        let payload = self
            .compiler_for(kind, account.str_field("country"))
            .compile(requirements, &submission)?;

        let created = self
            .retry
            .execute({
                let gateway = self.gateway.clone();
                let account_id = account_id.to_owned();
                move || {
                    let gateway = gateway.clone();
                    let account_id = account_id.clone();
                    let payload = payload.clone();
                    async move { gateway.create_person(&account_id, &payload).await }
                }
            })
            .await?;
        let created = Snapshot::from_remote(created)?;

        self.identity.record(&created.id, account_id).await?;
        self.persons.update(&created).await?;
        info!(account = account_id, person = %created.id, "person created");
        Ok(created)
    }

    /// Re-submits a person against its own declared requirements.
    pub async fn update_person(
        &self,
        person_id: &str,
        kind: EntityKind,
        mut submission: FlatSubmission,
    ) -> Result<Snapshot> {
        let account_id = self.identity.owner_of(person_id).await?;
        let current = self.persons.retrieve(person_id).await?;
        let requirements = current.requirements().to_field_requirements();
        if requirements.is_empty() && !submission.is_empty() {
            warn!(
                person = person_id,
                "no declared requirements; submitted values are not sent"
            );
        }

        self.resolve_documents(&mut submission).await?;
        let account = self.accounts.retrieve(&account_id).await?;
        let payload = self
            .compiler_for(kind, account.str_field("country"))
            .compile(&requirements, &submission)?;

        let updated = self
            .retry
            .execute({
                let gateway = self.gateway.clone();
                let account_id = account_id.clone();
                let person_id = person_id.to_owned();
                move || {
                    let gateway = gateway.clone();
                    let account_id = account_id.clone();
                    let person_id = person_id.clone();
                    let payload = payload.clone();
                    async move {
                        gateway
                            .update_person(&account_id, &person_id, &payload)
                            .await
                    }
                }
            })
            .await?;
        let updated = Snapshot::from_remote(updated)?;
        self.persons.update(&updated).await?;
        Ok(updated)
    }

    /// Deletes a person remotely, then drops its cache entry and identity
    /// mapping.
    pub async fn delete_person(&self, person_id: &str) -> Result<()> {
        let account_id = self.identity.owner_of(person_id).await?;

        self.retry
            .execute({
                let gateway = self.gateway.clone();
                let account_id = account_id.clone();
                let person_id = person_id.to_owned();
                move || {
                    let gateway = gateway.clone();
                    let account_id = account_id.clone();
                    let person_id = person_id.clone();
                    async move { gateway.delete_person(&account_id, &person_id).await }
                }
            })
            .await?;

        self.persons.delete(person_id).await?;
        self.identity.forget(person_id).await?;
        info!(person = person_id, "person deleted");
        Ok(())
    }

    /// The packed sub-entity collection stored on an account's metadata,
    /// e.g. `owners` or `directors`.
    pub async fn collection(&self, account_id: &str, field: &str) -> Result<PersonCollection> {
        let snapshot = self.accounts.retrieve(account_id).await?;
        PersonCollection::unpack(snapshot.metadata_field(field))
    }

    /// Prepends a record to a packed collection and persists it. Fails with
    /// `CapacityExceeded` before any remote call once the cap is reached.
    pub async fn add_collection_member(
        &self,
        account_id: &str,
        field: &str,
        record: CollectionRecord,
    ) -> Result<Snapshot> {
        let mut collection = self.collection(account_id, field).await?;
        collection.insert(record)?;
        self.store_collection(account_id, field, &collection).await
    }

    /// Removes a record by id. An unknown id is a local no-op that returns
    /// the current snapshot without touching the provider.
    pub async fn remove_collection_member(
        &self,
        account_id: &str,
        field: &str,
        record_id: &str,
    ) -> Result<Snapshot> {
        let snapshot = self.accounts.retrieve(account_id).await?;
        let mut collection = PersonCollection::unpack(snapshot.metadata_field(field))?;
        if !collection.remove(record_id) {
            return Ok(snapshot);
        }
        self.store_collection(account_id, field, &collection).await
    }

    async fn store_collection(
        &self,
        account_id: &str,
        field: &str,
        collection: &PersonCollection,
    ) -> Result<Snapshot> {
        let mut metadata = Map::new();
        metadata.insert(field.to_owned(), Value::String(collection.pack()?));
        let mut payload = NestedPayload::new();
        payload.insert("metadata".to_owned(), Value::Object(metadata));

        let updated = self
            .retry
            .execute({
                let gateway = self.gateway.clone();
                let account_id = account_id.to_owned();
                move || {
                    let gateway = gateway.clone();
                    let account_id = account_id.clone();
                    let payload = payload.clone();
                    async move { gateway.update_account(&account_id, &payload).await }
                }
            })
            .await?;
        let updated = Snapshot::from_remote(updated)?;
        self.accounts.update(&updated).await?;
        Ok(updated)
    }

    fn compiler_for(&self, kind: EntityKind, country: Option<&str>) -> RequirementsCompiler {
        let mut policy = self.config.compile.clone();
        if policy.country.is_none() {
            policy.country = country.map(str::to_owned);
        }
        RequirementsCompiler::new(kind, policy)
    }

    /// Uploads any raw file values ahead of compilation, substituting the
    /// provider file identifiers. Upload failures surface as field-specific
    /// invalid-upload errors.
    async fn resolve_documents(&self, submission: &mut FlatSubmission) -> Result<()> {
        for key in submission.file_keys() {
            let Some(FlatValue::File(bytes)) = submission.get(&key) else {
                continue;
            };
            let bytes = bytes.clone();
            let uploaded = self
                .retry
                .execute({
                    let gateway = self.gateway.clone();
                    move || {
                        let gateway = gateway.clone();
                        let bytes = bytes.clone();
                        async move { gateway.upload_file(&bytes, "identity_document").await }
                    }
                })
                .await;
            let file_id = match uploaded {
                Ok(file_id) => file_id,
                Err(error @ (OnboardingError::Cancelled | OnboardingError::SessionEnded)) => {
                    return Err(error);
                }
                Err(_) => {
                    return Err(OnboardingError::validation(key, "file upload failed"));
                }
            };
            submission.set_text(key, file_id);
        }
        Ok(())
    }
}
