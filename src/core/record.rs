use crate::core::types::{FieldValue, RecordId};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of the identity field every record carries
pub const ID_FIELD: &str = "id";

/// One row of a dataset.
///
/// Fields keep the order they were seeded or added in; schema inference
/// relies on that order. The `id` field is always present and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    /// Build a record from ordered fields. Returns `None` when `id` is missing
    /// or blank. A numeric id is normalized to text.
    pub fn from_fields<I>(fields: I) -> Option<Self>
    where
        I: IntoIterator<Item = (String, FieldValue)>,
    {
        let mut fields: Vec<(String, FieldValue)> = fields.into_iter().collect();
        let id = fields.iter_mut().find(|(k, _)| k == ID_FIELD)?;
        let text = id.1.to_string();
        if text.trim().is_empty() {
            return None;
        }
        id.1 = FieldValue::Text(text);
        Some(Self { fields })
    }

    /// A blank record with a fresh id
    pub fn with_id(id: &RecordId) -> Self {
        Self {
            fields: vec![(ID_FIELD.to_string(), FieldValue::Text(id.to_string()))],
        }
    }

    pub fn id(&self) -> &str {
        self.fields
            .iter()
            .find(|(k, _)| k == ID_FIELD)
            .and_then(|(_, v)| match v {
                FieldValue::Text(s) => Some(s.as_str()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Field names in record order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Return a copy with `key` set to `value`, appending the field if new.
    /// Returns `None` for the `id` field.
    pub fn with_field(&self, key: &str, value: FieldValue) -> Option<Self> {
        if key == ID_FIELD {
            return None;
        }
        let mut updated = self.clone();
        match updated.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => updated.fields.push((key.to_string(), value)),
        }
        Some(updated)
    }

    /// Add `key` with `value` only if the field is absent. Returns whether the
    /// record changed.
    pub fn insert_if_absent(&mut self, key: &str, value: FieldValue) -> bool {
        if self.contains(key) {
            return false;
        }
        self.fields.push((key.to_string(), value));
        true
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json's preserve_order keeps the seed's key order here
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Self::from_fields(map.into_iter().map(|(k, v)| (k, FieldValue::from(v))))
            .ok_or_else(|| D::Error::custom("record is missing a non-empty `id` field"))
    }
}
