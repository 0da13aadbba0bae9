use crate::core::record::{ID_FIELD, Record};
use crate::core::types::{ColumnDefinition, ColumnType, DatasetKey};
use crate::error::WorkspaceError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One field-name rule: a column whose name equals any `equals` term or
/// contains any `contains` term (case-insensitive) gets `column_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRule {
    #[serde(default)]
    pub equals: Vec<String>,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl InferenceRule {
    pub fn new(equals: &[&str], contains: &[&str], column_type: ColumnType) -> Self {
        Self {
            equals: equals.iter().map(|s| s.to_string()).collect(),
            contains: contains.iter().map(|s| s.to_string()).collect(),
            column_type,
        }
    }

    pub fn matches(&self, field: &str) -> bool {
        let name = field.to_lowercase();
        self.equals.iter().any(|t| name == t.to_lowercase())
            || self.contains.iter().any(|t| name.contains(&t.to_lowercase()))
    }
}

/// Priority-ordered rule list used to type columns by name. First match wins;
/// a name no rule matches is `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRules {
    rules: Vec<InferenceRule>,
}

impl Default for SchemaRules {
    fn default() -> Self {
        Self {
            rules: vec![
                InferenceRule::new(&[ID_FIELD], &[], ColumnType::Text),
                InferenceRule::new(
                    &["编号", "no"],
                    &["budget", "score", "预算", "评分"],
                    ColumnType::Number,
                ),
                InferenceRule::new(
                    &[],
                    &[
                        "risk",
                        "status",
                        "department",
                        "category",
                        "风险",
                        "状态",
                        "部门",
                        "情况",
                        "类别",
                    ],
                    ColumnType::Select,
                ),
                InferenceRule::new(
                    &[],
                    &["image", "photo", "图片", "照片", "抓拍", "附件"],
                    ColumnType::Image,
                ),
            ],
        }
    }
}

impl SchemaRules {
    /// Default rules with `extra` inserted right after the `id` rule, so extra
    /// rules win over the built-in ones but never retype `id`.
    pub fn with_extra(extra: Vec<InferenceRule>) -> Self {
        let mut rules = Self::default().rules;
        rules.splice(1..1, extra);
        Self { rules }
    }

    pub fn rules(&self) -> &[InferenceRule] {
        &self.rules
    }

    pub fn infer_type(&self, field: &str) -> ColumnType {
        self.rules
            .iter()
            .find(|rule| rule.matches(field))
            .map(|rule| rule.column_type)
            .unwrap_or(ColumnType::Text)
    }

    /// Derive one column per field of the first record, in field order.
    pub fn infer_columns(
        &self,
        dataset: &DatasetKey,
        records: &[Record],
    ) -> Result<Vec<ColumnDefinition>, WorkspaceError> {
        let sample = records
            .first()
            .ok_or_else(|| WorkspaceError::EmptyDataset(dataset.clone()))?;
        let columns = sample
            .keys()
            .map(|key| ColumnDefinition::new(key, self.infer_type(key)))
            .collect::<Vec<_>>();
        debug!(%dataset, columns = columns.len(), "inferred schema");
        Ok(columns)
    }
}
