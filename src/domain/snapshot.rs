use crate::domain::requirement::Requirements;
use crate::error::{OnboardingError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key namespaces inside the local snapshot store. One flat KV store backs
/// the caches for every entity family plus the person ownership index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Accounts,
    Persons,
    Payouts,
    PersonOwner,
}

impl Namespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Accounts => "accounts",
            Namespace::Persons => "persons",
            Namespace::Payouts => "payouts",
            Namespace::PersonOwner => "person_owner",
        }
    }

    pub fn key(self, id: &str) -> String {
        format!("{}/{}", self.prefix(), id)
    }
}

/// The full remote-returned representation of an entity at a point in time.
///
/// Snapshots are the unit of local caching: written whole on every update,
/// never partially merged. Correctness of partial remote updates is entirely
/// the provider's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub data: Value,
}

impl Snapshot {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Builds a snapshot from a raw provider response, which always carries
    /// its own `id` field.
    pub fn from_remote(data: Value) -> Result<Self> {
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| OnboardingError::validation("id", "remote object has no id"))?
            .to_owned();
        Ok(Self { id, data })
    }

    /// The provider-declared requirements block, empty if absent.
    pub fn requirements(&self) -> Requirements {
        Requirements::from_snapshot(&self.data)
    }

    /// A string field read straight off the raw object, e.g. `country`.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    /// A string field from the metadata sub-object, where packed collections
    /// live.
    pub fn metadata_field(&self, name: &str) -> Option<&str> {
        self.data
            .get("metadata")
            .and_then(|meta| meta.get(name))
            .and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespace_keys() {
        assert_eq!(Namespace::Accounts.key("acct_1"), "accounts/acct_1");
        assert_eq!(Namespace::PersonOwner.key("p_9"), "person_owner/p_9");
    }

    #[test]
    fn test_snapshot_from_remote() {
        let snap = Snapshot::from_remote(json!({"id": "acct_1", "country": "US"})).unwrap();
        assert_eq!(snap.id, "acct_1");
        assert_eq!(snap.str_field("country"), Some("US"));
    }

    #[test]
    fn test_snapshot_without_id_is_rejected() {
        let result = Snapshot::from_remote(json!({"country": "US"}));
        assert!(matches!(result, Err(crate::error::OnboardingError::Validation { .. })));
    }

    #[test]
    fn test_metadata_field() {
        let snap = Snapshot::new("acct_1", json!({"metadata": {"owners": "[]"}}));
        assert_eq!(snap.metadata_field("owners"), Some("[]"));
        assert_eq!(snap.metadata_field("directors"), None);
    }
}
