use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Identifier of a logical view (`main` or a secondary view)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(String);

impl ViewId {
    pub const MAIN: &'static str = "main";

    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// The id of the main view
    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    pub fn is_main(&self) -> bool {
        self.0 == Self::MAIN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ViewId {
    fn default() -> Self {
        Self::main()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ViewId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of a record, unique within its dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh random id. Random v4 UUIDs keep rapid programmatic
    /// inserts from colliding the way millisecond timestamps can.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which physical dataset a record lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatasetKey {
    Main,
    Secondary(ViewId),
    Shared,
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Secondary(view) => write!(f, "secondary:{}", view),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// Semantic type of a column
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ColumnType {
    Text,
    Number,
    Select,
    Image,
}

impl ColumnType {
    /// Value written into every record when a column of this type is added
    pub fn default_value(&self) -> FieldValue {
        match self {
            Self::Number => FieldValue::Text("0".to_string()),
            _ => FieldValue::Text(String::new()),
        }
    }

    /// Apply the lenient input policy for this type.
    ///
    /// Number columns keep only digits, `.` and `-`; nothing is rejected and no
    /// range or format check is made. Other types store the raw input as-is.
    pub fn coerce(&self, raw: &str) -> String {
        match self {
            Self::Number => raw
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect(),
            _ => raw.to_string(),
        }
    }
}

/// Column metadata shown by the grid and sent to the AI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDefinition {
    pub fn new<K: Into<String>>(key: K, column_type: ColumnType) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            column_type,
        }
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(serde_json::Number),
    Unset,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Unset => Ok(()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Unset,
            Value::String(s) => Self::Text(s),
            Value::Number(n) => Self::Number(n),
            Value::Bool(b) => Self::Text(b.to_string()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

impl FromStr for ViewId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("view id must not be empty".to_string());
        }
        Ok(Self::new(trimmed))
    }
}
