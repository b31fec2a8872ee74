use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A provider-declared field path, parsed once into ordered segments.
///
/// The provider names required fields with dotted paths such as
/// `individual.address.line1`. Parsing happens at construction so routing and
/// flat-key resolution never re-scan the raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: raw.split('.').map(str::to_owned).collect(),
        }
    }

    /// The leading segment, which selects the nesting strategy.
    pub fn head(&self) -> &str {
        &self.segments[0]
    }

    pub fn last(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments after the head.
    pub fn tail(&self) -> &[String] {
        &self.segments[1..]
    }

    /// Resolves the path against the flat submitted-value naming convention:
    /// the leading entity segment is stripped and the rest joined with `_`,
    /// so `individual.dob.day` is looked up as `dob_day`.
    pub fn flat_key(&self) -> String {
        if self.segments.len() > 1 {
            self.tail().join("_")
        } else {
            self.head().to_owned()
        }
    }

    /// Flat key without stripping the head, for paths that are not prefixed
    /// by an entity segment (person-level paths like `dob.day`).
    pub fn full_flat_key(&self) -> String {
        self.segments.join("_")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Err(D::Error::custom("empty field path"));
        }
        Ok(Self::parse(&raw))
    }
}

/// Provider urgency class for a required field.
///
/// Currently-due fields block account activation; eventually-due fields become
/// required at a later verification stage and are compiled only when supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    CurrentlyDue,
    EventuallyDue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRequirement {
    pub path: FieldPath,
    pub urgency: Urgency,
}

impl FieldRequirement {
    pub fn currently_due(path: &str) -> Self {
        Self {
            path: FieldPath::parse(path),
            urgency: Urgency::CurrentlyDue,
        }
    }

    pub fn eventually_due(path: &str) -> Self {
        Self {
            path: FieldPath::parse(path),
            urgency: Urgency::EventuallyDue,
        }
    }
}

/// The requirements block of an entity snapshot, as declared by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub currently_due: Vec<FieldPath>,
    #[serde(default)]
    pub eventually_due: Vec<FieldPath>,
}

impl Requirements {
    /// Extracts the `requirements` block from a raw entity snapshot. A
    /// snapshot without one yields an empty requirement set.
    pub fn from_snapshot(snapshot: &serde_json::Value) -> Self {
        snapshot
            .get("requirements")
            .and_then(|block| serde_json::from_value(block.clone()).ok())
            .unwrap_or_default()
    }

    /// Flattens both urgency classes into an ordered requirement list,
    /// currently-due first.
    pub fn to_field_requirements(&self) -> Vec<FieldRequirement> {
        let currently = self.currently_due.iter().cloned().map(|path| FieldRequirement {
            path,
            urgency: Urgency::CurrentlyDue,
        });
        let eventually = self.eventually_due.iter().cloned().map(|path| FieldRequirement {
            path,
            urgency: Urgency::EventuallyDue,
        });
        currently.chain(eventually).collect()
    }
}

/// A submitted form value: either text or raw file bytes awaiting upload.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    Text(String),
    File(Vec<u8>),
}

/// The flat submitted-value set for one request, keyed by flat field name.
///
/// File values are resolved to provider file identifiers ahead of compilation;
/// the compiler itself only ever sees text.
#[derive(Debug, Clone, Default)]
pub struct FlatSubmission {
    values: HashMap<String, FlatValue>,
}

impl FlatSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), FlatValue::Text(value.into()));
        self
    }

    pub fn set_file(&mut self, key: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.values.insert(key.into(), FlatValue::File(bytes));
        self
    }

    pub fn get(&self, key: &str) -> Option<&FlatValue> {
        self.values.get(key)
    }

    /// The text value for `key`. Empty strings count as absent, matching how
    /// blank form fields arrive.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(FlatValue::Text(value)) if !value.is_empty() => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.text(key).is_some() || matches!(self.values.get(key), Some(FlatValue::File(_)))
    }

    /// Keys holding unresolved file bytes.
    pub fn file_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .iter()
            .filter(|(_, value)| matches!(value, FlatValue::File(_)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}
