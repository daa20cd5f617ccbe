//! In-memory representation of a store's contents.
//!
//! Both store implementations apply operations to a [`Database`]; the file
//! store additionally loads and saves it around every operation.

use crate::backend::{Collection, InsertOutcome, PurgeReport, SiblingRecord, UpdateOutcome};
use metasync_core::{AggregateFields, MetaRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whole store file: one [`Database`] per configured database name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub databases: BTreeMap<String, Database>,
}

/// The collections of one logical database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub meta: BTreeMap<String, MetaRecord>,
    #[serde(default)]
    pub observations: Vec<SiblingRecord>,
    #[serde(default)]
    pub windows: Vec<SiblingRecord>,
}

impl Database {
    pub fn read(&self, id: &str) -> Option<MetaRecord> {
        self.meta.get(id).cloned()
    }

    pub fn insert(&mut self, record: &MetaRecord) -> InsertOutcome {
        if self.meta.contains_key(&record.id) {
            return InsertOutcome::AlreadyExists;
        }
        self.meta.insert(record.id.clone(), record.clone());
        InsertOutcome::Inserted
    }

    pub fn conditional_update(
        &mut self,
        id: &str,
        expected_version: u64,
        fields: &AggregateFields,
    ) -> UpdateOutcome {
        match self.meta.get_mut(id) {
            Some(stored) if stored.version == expected_version => {
                stored.apply_update(fields);
                UpdateOutcome {
                    updated_existing: true,
                }
            }
            _ => UpdateOutcome {
                updated_existing: false,
            },
        }
    }

    pub fn scan(&self) -> Vec<MetaRecord> {
        self.meta.values().cloned().collect()
    }

    pub fn insert_sibling(&mut self, collection: Collection, record: SiblingRecord) {
        self.collection_mut(collection).push(record);
    }

    pub fn count_siblings(&self, metric: &str) -> usize {
        self.observations
            .iter()
            .chain(self.windows.iter())
            .filter(|record| record.metric == metric)
            .count()
    }

    pub fn purge_metric(&mut self, metric: &str) -> PurgeReport {
        let observations_before = self.observations.len();
        self.observations.retain(|record| record.metric != metric);
        let windows_before = self.windows.len();
        self.windows.retain(|record| record.metric != metric);

        PurgeReport {
            meta_removed: self.meta.remove(metric).is_some(),
            observations_removed: observations_before - self.observations.len(),
            windows_removed: windows_before - self.windows.len(),
        }
    }

    fn collection_mut(&mut self, collection: Collection) -> &mut Vec<SiblingRecord> {
        match collection {
            Collection::Observations => &mut self.observations,
            Collection::Windows => &mut self.windows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, version: u64) -> MetaRecord {
        MetaRecord {
            id: id.to_string(),
            version,
            min: 1.0,
            max: 2.0,
            count: 3,
        }
    }

    #[test]
    fn test_conditional_update_requires_matching_version() {
        let mut db = Database::default();
        db.insert(&record("cpu.load", 0));

        let fields = AggregateFields {
            min: 0.0,
            max: 9.0,
            count: 4,
        };
        assert!(!db.conditional_update("cpu.load", 3, &fields).updated_existing);
        assert!(db.conditional_update("cpu.load", 0, &fields).updated_existing);
        // The version moved on, so the same expectation now misses
        assert!(!db.conditional_update("cpu.load", 0, &fields).updated_existing);

        let stored = db.read("cpu.load").unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.fields(), fields);
    }

    #[test]
    fn test_conditional_update_on_missing_record() {
        let mut db = Database::default();
        let fields = record("x", 0).fields();
        assert!(!db.conditional_update("x", 0, &fields).updated_existing);
    }

    #[test]
    fn test_purge_only_touches_named_metric() {
        let mut db = Database::default();
        db.insert(&record("cpu.load", 0));
        db.insert(&record("mem.free", 0));
        db.insert_sibling(
            Collection::Observations,
            SiblingRecord::new("cpu.load", json!({ "value": 1.0 })),
        );
        db.insert_sibling(
            Collection::Windows,
            SiblingRecord::new("cpu.load", json!({ "start": 0 })),
        );
        db.insert_sibling(
            Collection::Observations,
            SiblingRecord::new("mem.free", json!({ "value": 2.0 })),
        );

        let report = db.purge_metric("cpu.load");
        assert_eq!(
            report,
            PurgeReport {
                meta_removed: true,
                observations_removed: 1,
                windows_removed: 1,
            }
        );
        assert!(db.read("cpu.load").is_none());
        assert_eq!(db.count_siblings("cpu.load"), 0);
        assert_eq!(db.count_siblings("mem.free"), 1);
        assert!(db.read("mem.free").is_some());
    }
}
