use async_trait::async_trait;
use merchant_onboarding::domain::ports::{NestedPayload, ProviderGateway, ProviderResult};
use merchant_onboarding::error::ProviderError;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Scripted in-process stand-in for the remote provider.
///
/// Holds account/person/payout state as raw JSON, answers CRUD calls by
/// whole-object merge, and can be loaded with an error script: each queued
/// error is consumed by exactly one call before it succeeds.
#[derive(Default)]
pub struct MockGateway {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Value>,
    persons: HashMap<String, Value>,
    payouts: HashMap<String, Value>,
    error_script: VecDeque<ProviderError>,
    calls: Vec<String>,
    sequence: u32,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_account(&self, id: &str, snapshot: Value) {
        let mut inner = self.inner.lock().unwrap();
        inner.accounts.insert(id.to_owned(), snapshot);
    }

    pub fn seed_payout(&self, account_id: &str, payout_id: &str, snapshot: Value) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .payouts
            .insert(format!("{account_id}:{payout_id}"), snapshot);
    }

    /// Queues an error to be returned by the next remote call.
    pub fn push_error(&self, error: ProviderError) {
        self.inner.lock().unwrap().error_script.push_back(error);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|name| name.as_str() == method)
            .count()
    }

    pub fn account_state(&self, id: &str) -> Option<Value> {
        self.inner.lock().unwrap().accounts.get(id).cloned()
    }

    pub fn person_state(&self, id: &str) -> Option<Value> {
        self.inner.lock().unwrap().persons.get(id).cloned()
    }

    /// Attaches a currently-due list to an already-created person, the way
    /// the provider raises new requirements after a review.
    pub fn declare_person_requirements(&self, person_id: &str, currently_due: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(person) = inner.persons.get_mut(person_id) {
            merge(
                person,
                json!({
                    "requirements": {
                        "currently_due": currently_due,
                        "eventually_due": []
                    }
                })
                .as_object()
                .unwrap(),
            );
        }
    }

    fn enter(&self, method: &str) -> Result<(), ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(method.to_owned());
        match inner.error_script.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Recursively merges `patch` into `base`, replacing non-object leaves. This
/// mirrors how the real provider folds partial updates into full state.
fn merge(base: &mut Value, patch: &Map<String, Value>) {
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    let Value::Object(target) = base else {
        return;
    };
    for (key, value) in patch {
        match value {
            Value::Object(nested) => {
                let slot = target.entry(key.clone()).or_insert(json!({}));
                merge(slot, nested);
            }
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

#[async_trait]
impl ProviderGateway for MockGateway {
    async fn retrieve_account(&self, id: &str) -> ProviderResult<Value> {
        self.enter("retrieve_account")?;
        let inner = self.inner.lock().unwrap();
        inner
            .accounts
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::new("resource_missing", "no such account"))
    }

    async fn update_account(&self, id: &str, payload: &NestedPayload) -> ProviderResult<Value> {
        self.enter("update_account")?;
        let mut inner = self.inner.lock().unwrap();
        let account = inner
            .accounts
            .get_mut(id)
            .ok_or_else(|| ProviderError::new("resource_missing", "no such account"))?;
        merge(account, payload);
        Ok(account.clone())
    }

    async fn create_person(
        &self,
        account_id: &str,
        payload: &NestedPayload,
    ) -> ProviderResult<Value> {
        self.enter("create_person")?;
        let mut inner = self.inner.lock().unwrap();
        if !inner.accounts.contains_key(account_id) {
            return Err(ProviderError::new("resource_missing", "no such account"));
        }
        inner.sequence += 1;
        let id = format!("per_{}", inner.sequence);
        let mut person = json!({"id": id, "account": account_id});
        merge(&mut person, payload);
        inner.persons.insert(id.clone(), person.clone());
        Ok(person)
    }

    async fn retrieve_person(&self, _account_id: &str, person_id: &str) -> ProviderResult<Value> {
        self.enter("retrieve_person")?;
        let inner = self.inner.lock().unwrap();
        inner
            .persons
            .get(person_id)
            .cloned()
            .ok_or_else(|| ProviderError::new("resource_missing", "no such person"))
    }

    async fn update_person(
        &self,
        _account_id: &str,
        person_id: &str,
        payload: &NestedPayload,
    ) -> ProviderResult<Value> {
        self.enter("update_person")?;
        let mut inner = self.inner.lock().unwrap();
        let person = inner
            .persons
            .get_mut(person_id)
            .ok_or_else(|| ProviderError::new("resource_missing", "no such person"))?;
        merge(person, payload);
        Ok(person.clone())
    }

    async fn delete_person(&self, _account_id: &str, person_id: &str) -> ProviderResult<()> {
        self.enter("delete_person")?;
        let mut inner = self.inner.lock().unwrap();
        inner
            .persons
            .remove(person_id)
            .map(|_| ())
            .ok_or_else(|| ProviderError::new("resource_missing", "no such person"))
    }

    async fn retrieve_payout(&self, account_id: &str, payout_id: &str) -> ProviderResult<Value> {
        self.enter("retrieve_payout")?;
        let inner = self.inner.lock().unwrap();
        inner
            .payouts
            .get(&format!("{account_id}:{payout_id}"))
            .cloned()
            .ok_or_else(|| ProviderError::new("resource_missing", "no such payout"))
    }

    async fn upload_file(&self, _bytes: &[u8], _purpose: &str) -> ProviderResult<String> {
        self.enter("upload_file")?;
        let mut inner = self.inner.lock().unwrap();
        inner.sequence += 1;
        Ok(format!("file_{}", inner.sequence))
    }
}

/// A minimal individual account snapshot with the given currently-due paths.
pub fn account_with_requirements(id: &str, currently_due: &[&str]) -> Value {
    json!({
        "id": id,
        "country": "US",
        "business_type": "individual",
        "metadata": {},
        "requirements": {
            "currently_due": currently_due,
            "eventually_due": []
        }
    })
}
