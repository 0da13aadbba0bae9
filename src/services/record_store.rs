use crate::core::{DatasetKey, FieldValue, Record, ViewId};
use crate::error::WorkspaceError;
use color_eyre::Result;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Maximum number of secondary views a workspace holds
pub const MAX_SECONDARY_VIEWS: usize = 3;

/// Seed data in the shape of a seed file:
/// `{ "main": [..], "secondary": { "<view>": [..] }, "shared": [..] }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    pub main: Vec<Record>,
    #[serde(default)]
    pub secondary: BTreeMap<ViewId, Vec<Record>>,
    #[serde(default)]
    pub shared: Option<Vec<Record>>,
}

impl SeedData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// RecordStore exclusively owns every dataset of a workspace
///
/// Holds the `main` dataset, up to three secondary view datasets and an
/// optional shared secondary dataset. Nothing outside the store keeps a
/// mutable copy of any record.
#[derive(Debug, Clone)]
pub struct RecordStore {
    main: Vec<Record>,
    secondary: BTreeMap<ViewId, Vec<Record>>,
    shared: Option<Vec<Record>>,
}

impl RecordStore {
    /// Validate and take ownership of seed data.
    ///
    /// `main` must be non-empty and ids must be unique per dataset. Empty
    /// secondary or shared arrays are treated as "no dedicated data".
    pub fn new(seed: SeedData) -> Result<Self, WorkspaceError> {
        let SeedData {
            main,
            secondary,
            shared,
        } = seed;

        if main.is_empty() {
            return Err(WorkspaceError::EmptyDataset(DatasetKey::Main));
        }
        Self::check_unique_ids(&DatasetKey::Main, &main)?;

        let secondary: BTreeMap<ViewId, Vec<Record>> = secondary
            .into_iter()
            .filter(|(view, records)| {
                if records.is_empty() {
                    debug!(%view, "ignoring empty secondary dataset");
                }
                !records.is_empty()
            })
            .collect();
        if secondary.len() > MAX_SECONDARY_VIEWS {
            return Err(WorkspaceError::TooManySecondaryViews {
                max: MAX_SECONDARY_VIEWS,
                got: secondary.len(),
            });
        }
        for (view, records) in &secondary {
            Self::check_unique_ids(&DatasetKey::Secondary(view.clone()), records)?;
        }

        let shared = shared.filter(|records| !records.is_empty());
        if let Some(records) = &shared {
            Self::check_unique_ids(&DatasetKey::Shared, records)?;
        }

        debug!(
            main = main.len(),
            secondary = secondary.len(),
            shared = shared.as_ref().map(Vec::len).unwrap_or(0),
            "record store seeded"
        );
        Ok(Self {
            main,
            secondary,
            shared,
        })
    }

    fn check_unique_ids(dataset: &DatasetKey, records: &[Record]) -> Result<(), WorkspaceError> {
        let mut seen = HashSet::new();
        for record in records {
            if !seen.insert(record.id()) {
                return Err(WorkspaceError::DuplicateRecordId {
                    dataset: dataset.clone(),
                    id: record.id().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn main(&self) -> &[Record] {
        &self.main
    }

    /// Dedicated records of a secondary view, if it has any
    pub fn secondary(&self, view: &ViewId) -> Option<&[Record]> {
        self.secondary
            .get(view)
            .map(Vec::as_slice)
            .filter(|records| !records.is_empty())
    }

    /// The shared secondary dataset, if one was seeded and still has records
    pub fn shared(&self) -> Option<&[Record]> {
        self.shared
            .as_deref()
            .filter(|records| !records.is_empty())
    }

    /// Views that have a dedicated dataset
    pub fn secondary_views(&self) -> impl Iterator<Item = &ViewId> {
        self.secondary.keys()
    }

    pub fn dataset(&self, key: &DatasetKey) -> Option<&[Record]> {
        match key {
            DatasetKey::Main => Some(&self.main),
            DatasetKey::Secondary(view) => self.secondary.get(view).map(Vec::as_slice),
            DatasetKey::Shared => self.shared.as_deref(),
        }
    }

    fn dataset_mut(&mut self, key: &DatasetKey) -> Option<&mut Vec<Record>> {
        match key {
            DatasetKey::Main => Some(&mut self.main),
            DatasetKey::Secondary(view) => self.secondary.get_mut(view),
            DatasetKey::Shared => self.shared.as_mut(),
        }
    }

    /// Every dataset with its key
    pub fn datasets(&self) -> impl Iterator<Item = (DatasetKey, &[Record])> {
        std::iter::once((DatasetKey::Main, self.main.as_slice()))
            .chain(
                self.secondary
                    .iter()
                    .map(|(view, records)| {
                        (DatasetKey::Secondary(view.clone()), records.as_slice())
                    }),
            )
            .chain(
                self.shared
                    .iter()
                    .map(|records| (DatasetKey::Shared, records.as_slice())),
            )
    }

    pub fn find(&self, key: &DatasetKey, row_id: &str) -> Option<&Record> {
        self.dataset(key)?.iter().find(|r| r.id() == row_id)
    }

    /// Replace one record with a copy that carries the new field value.
    /// No other record or dataset is touched.
    pub fn update_field(
        &mut self,
        key: &DatasetKey,
        row_id: &str,
        field: &str,
        value: FieldValue,
    ) -> Result<(), WorkspaceError> {
        let slot = self
            .dataset_mut(key)
            .and_then(|records| records.iter_mut().find(|r| r.id() == row_id))
            .ok_or_else(|| WorkspaceError::UnknownRow {
                dataset: key.clone(),
                row: row_id.to_string(),
            })?;
        *slot = slot
            .with_field(field, value)
            .ok_or(WorkspaceError::ImmutableId)?;
        Ok(())
    }

    /// Add `field` with `default` to every record of every dataset that does
    /// not have it yet. Returns how many records changed.
    pub fn backfill(&mut self, field: &str, default: &FieldValue) -> usize {
        let mut touched = 0;
        let datasets = std::iter::once(&mut self.main)
            .chain(self.secondary.values_mut())
            .chain(self.shared.iter_mut());
        for records in datasets {
            for record in records.iter_mut() {
                if record.insert_if_absent(field, default.clone()) {
                    touched += 1;
                }
            }
        }
        debug!(field, touched, "back-filled field across datasets");
        touched
    }

    /// Append a record, rejecting an id already used in that dataset
    pub fn insert(&mut self, key: &DatasetKey, record: Record) -> Result<(), WorkspaceError> {
        let records = match key {
            DatasetKey::Secondary(view) => self.secondary.entry(view.clone()).or_default(),
            DatasetKey::Shared => self.shared.get_or_insert_with(Vec::new),
            DatasetKey::Main => &mut self.main,
        };
        if records.iter().any(|r| r.id() == record.id()) {
            return Err(WorkspaceError::DuplicateRecordId {
                dataset: key.clone(),
                id: record.id().to_string(),
            });
        }
        records.push(record);
        Ok(())
    }

    /// Remove a record. The last record of a dataset is kept, since every
    /// dataset must stay usable as a schema source.
    pub fn remove(&mut self, key: &DatasetKey, row_id: &str) -> Result<Record, WorkspaceError> {
        let unknown = || WorkspaceError::UnknownRow {
            dataset: key.clone(),
            row: row_id.to_string(),
        };
        let records = self.dataset_mut(key).ok_or_else(unknown)?;
        let index = records
            .iter()
            .position(|r| r.id() == row_id)
            .ok_or_else(unknown)?;
        if records.len() == 1 {
            return Err(WorkspaceError::LastRecord(key.clone()));
        }
        Ok(records.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordId;
    use pretty_assertions::assert_eq;

    fn seed() -> SeedData {
        SeedData::from_json_str(
            r#"{
                "main": [{"id":"1","编号":1,"情况":"在岗玩手机"},{"id":"2","编号":2,"情况":"无"}],
                "secondary": {"gtm": [{"id":"g1","客户":"ACME"}], "empty": []},
                "shared": [{"id":"s1","任务":"巡检"}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_seed_drops_empty_secondary_datasets() {
        let store = RecordStore::new(seed()).unwrap();
        let views: Vec<&ViewId> = store.secondary_views().collect();
        assert_eq!(views, vec![&ViewId::new("gtm")]);
        assert!(store.secondary(&ViewId::new("empty")).is_none());
        assert_eq!(store.datasets().count(), 3);
    }

    #[test]
    fn test_empty_main_is_rejected() {
        let err = RecordStore::new(SeedData::default()).unwrap_err();
        assert_eq!(err, WorkspaceError::EmptyDataset(DatasetKey::Main));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let seed = SeedData::from_json_str(r#"{"main":[{"id":"1"},{"id":1}]}"#).unwrap();
        let err = RecordStore::new(seed).unwrap_err();
        assert_eq!(
            err,
            WorkspaceError::DuplicateRecordId {
                dataset: DatasetKey::Main,
                id: "1".into()
            }
        );
    }

    #[test]
    fn test_too_many_secondary_views() {
        let seed = SeedData::from_json_str(
            r#"{"main":[{"id":"1"}],"secondary":{"a":[{"id":"1"}],"b":[{"id":"1"}],"c":[{"id":"1"}],"d":[{"id":"1"}]}}"#,
        )
        .unwrap();
        assert!(matches!(
            RecordStore::new(seed),
            Err(WorkspaceError::TooManySecondaryViews { max: 3, got: 4 })
        ));
    }

    #[test]
    fn test_update_field_touches_only_target() {
        let mut store = RecordStore::new(seed()).unwrap();
        store
            .update_field(&DatasetKey::Main, "1", "情况", "离岗".into())
            .unwrap();

        assert_eq!(
            store.find(&DatasetKey::Main, "1").unwrap().get("情况"),
            Some(&FieldValue::from("离岗"))
        );
        assert_eq!(
            store.find(&DatasetKey::Main, "2").unwrap().get("情况"),
            Some(&FieldValue::from("无"))
        );
        assert!(matches!(
            store.update_field(&DatasetKey::Main, "9", "情况", "x".into()),
            Err(WorkspaceError::UnknownRow { .. })
        ));
    }

    #[test]
    fn test_backfill_reaches_every_dataset() {
        let mut store = RecordStore::new(seed()).unwrap();
        let touched = store.backfill("负责人", &FieldValue::from(""));

        assert_eq!(touched, 4);
        for (_, records) in store.datasets() {
            assert!(records.iter().all(|r| r.get("负责人") == Some(&FieldValue::from(""))));
        }
        assert_eq!(store.backfill("负责人", &FieldValue::from("x")), 0);
    }

    #[test]
    fn test_insert_and_remove_keep_ids_unique() {
        let mut store = RecordStore::new(seed()).unwrap();
        let id = RecordId::generate();
        store.insert(&DatasetKey::Main, Record::with_id(&id)).unwrap();
        assert!(store.insert(&DatasetKey::Main, Record::with_id(&id)).is_err());

        let removed = store.remove(&DatasetKey::Main, id.as_str()).unwrap();
        assert_eq!(removed.id(), id.as_str());
        assert_eq!(store.main().len(), 2);
        assert!(store.remove(&DatasetKey::Main, id.as_str()).is_err());
    }

    #[test]
    fn test_last_record_of_a_dataset_is_kept() {
        let mut store = RecordStore::new(seed()).unwrap();
        let gtm = DatasetKey::Secondary(ViewId::new("gtm"));

        assert_eq!(store.remove(&gtm, "g1"), Err(WorkspaceError::LastRecord(gtm.clone())));
        assert_eq!(store.secondary(&ViewId::new("gtm")).map(<[Record]>::len), Some(1));

        store.remove(&DatasetKey::Main, "1").unwrap();
        assert_eq!(
            store.remove(&DatasetKey::Main, "2"),
            Err(WorkspaceError::LastRecord(DatasetKey::Main))
        );
        assert_eq!(store.main().len(), 1);
    }
}
