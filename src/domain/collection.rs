use crate::error::{OnboardingError, Result};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Hard cap on members per packed collection. The collection is serialized
/// into a single provider metadata value, which has a practical size ceiling,
/// so membership is bounded rather than paginated.
pub const COLLECTION_CAP: usize = 4;

/// One sub-entity record (owner or director) held in a packed collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl CollectionRecord {
    /// Creates a record with a freshly generated id.
    pub fn new(fields: Map<String, Value>) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        Self {
            id: format!("rec_{suffix}"),
            fields,
        }
    }

    pub fn with_id(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// A bounded, ordered collection of sub-entity records, most recent first.
///
/// Persisted as a JSON string inside a parent-entity metadata field and
/// required to round-trip losslessly through pack → store → fetch → unpack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonCollection {
    records: Vec<CollectionRecord>,
}

impl PersonCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends a record. Fails with `CapacityExceeded` once the cap is
    /// reached; the record is not partially inserted.
    pub fn insert(&mut self, record: CollectionRecord) -> Result<()> {
        if self.records.len() >= COLLECTION_CAP {
            return Err(OnboardingError::CapacityExceeded {
                cap: COLLECTION_CAP,
            });
        }
        self.records.insert(0, record);
        Ok(())
    }

    /// Removes the first record matching `id`. Removing an unknown id is a
    /// no-op; the return value reports whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.records.iter().position(|record| record.id == id) {
            Some(index) => {
                self.records.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&CollectionRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionRecord> {
        self.records.iter()
    }

    /// Serializes the collection for storage in a metadata field.
    pub fn pack(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.records)?)
    }

    /// Restores a collection from its packed metadata form. An absent field
    /// unpacks as an empty collection.
    pub fn unpack(packed: Option<&str>) -> Result<Self> {
        match packed {
            Some(raw) if !raw.is_empty() => Ok(Self {
                records: serde_json::from_str(raw)?,
            }),
            _ => Ok(Self::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str) -> CollectionRecord {
        let mut fields = Map::new();
        fields.insert("first_name".into(), json!(name));
        CollectionRecord::new(fields)
    }

    #[test]
    fn test_insert_prepends() {
        let mut owners = PersonCollection::new();
        owners.insert(record("alice")).unwrap();
        owners.insert(record("bob")).unwrap();

        let names: Vec<&Value> = owners
            .iter()
            .map(|r| r.fields.get("first_name").unwrap())
            .collect();
        assert_eq!(names, [&json!("bob"), &json!("alice")]);
    }

    #[test]
    fn test_insert_respects_cap() {
        let mut owners = PersonCollection::new();
        for i in 0..COLLECTION_CAP {
            owners.insert(record(&format!("p{i}"))).unwrap();
        }

        let result = owners.insert(record("overflow"));
        assert!(matches!(
            result,
            Err(OnboardingError::CapacityExceeded { cap: COLLECTION_CAP })
        ));
        assert_eq!(owners.len(), COLLECTION_CAP);
    }

    #[test]
    fn test_remove_first_match_only() {
        let mut owners = PersonCollection::new();
        let kept = record("alice");
        let removed = record("bob");
        let removed_id = removed.id.clone();
        owners.insert(kept.clone()).unwrap();
        owners.insert(removed).unwrap();

        assert!(owners.remove(&removed_id));
        assert_eq!(owners.len(), 1);
        assert_eq!(owners.get(&kept.id), Some(&kept));
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut owners = PersonCollection::new();
        owners.insert(record("alice")).unwrap();
        assert!(!owners.remove("rec_missing"));
        assert_eq!(owners.len(), 1);
    }

    #[test]
    fn test_pack_round_trip() {
        let mut owners = PersonCollection::new();
        owners.insert(record("alice")).unwrap();
        owners.insert(record("bob")).unwrap();

        let packed = owners.pack().unwrap();
        let restored = PersonCollection::unpack(Some(&packed)).unwrap();
        assert_eq!(restored, owners);
    }

    #[test]
    fn test_unpack_absent_is_empty() {
        assert!(PersonCollection::unpack(None).unwrap().is_empty());
        assert!(PersonCollection::unpack(Some("")).unwrap().is_empty());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = record("a");
        let b = record("b");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("rec_"));
    }
}
