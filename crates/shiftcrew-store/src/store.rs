use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shiftcrew_core::{ShiftCrewError, ShiftCrewResult};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// A domain record: a JSON object.
pub type Record = serde_json::Value;

/// Query over one table: every filter must match by equality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Criteria {
    /// Table to read from.
    pub table: String,
    /// Field/value pairs that must all be equal.
    #[serde(default)]
    pub filters: Vec<(String, serde_json::Value)>,
    /// Maximum number of records returned.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Criteria {
    /// Select every record of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Require `field == value`.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Cap the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` satisfies every filter.
    pub fn matches(&self, record: &Record) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| record.get(field) == Some(value))
    }

    fn apply<'a>(&self, records: impl Iterator<Item = &'a Record>) -> Vec<Record> {
        let matching = records.filter(|r| self.matches(r)).cloned();
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}

/// Persistent store of domain records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records matching `criteria`, in insertion order.
    async fn query(&self, criteria: &Criteria) -> ShiftCrewResult<Vec<Record>>;
    /// Append `records` to `table`; returns the number inserted.
    async fn insert_bulk(&self, table: &str, records: Vec<Record>) -> ShiftCrewResult<usize>;
    /// Names of all tables holding at least one record.
    async fn tables(&self) -> ShiftCrewResult<Vec<String>>;
}

fn ensure_objects(table: &str, records: &[Record]) -> ShiftCrewResult<()> {
    if let Some(pos) = records.iter().position(|r| !r.is_object()) {
        return Err(ShiftCrewError::Store(format!(
            "record {pos} for table '{table}' is not a JSON object"
        )));
    }
    Ok(())
}

/// In-memory record store.
#[derive(Default)]
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn query(&self, criteria: &Criteria) -> ShiftCrewResult<Vec<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&criteria.table)
            .map(|records| criteria.apply(records.iter()))
            .unwrap_or_default())
    }

    async fn insert_bulk(&self, table: &str, records: Vec<Record>) -> ShiftCrewResult<usize> {
        ensure_objects(table, &records)?;
        let count = records.len();
        if count == 0 {
            return Ok(0);
        }
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .extend(records);
        debug!(table = %table, count, "Records inserted");
        Ok(count)
    }

    async fn tables(&self) -> ShiftCrewResult<Vec<String>> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// File-based record store: one JSON array file per table.
pub struct FileRecordStore {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileRecordStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn new(dir: PathBuf) -> ShiftCrewResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn table_path(&self, table: &str) -> ShiftCrewResult<PathBuf> {
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ShiftCrewError::Store(format!("invalid table name '{table}'")));
        }
        Ok(self.dir.join(format!("{table}.json")))
    }

    async fn load(&self, table: &str) -> ShiftCrewResult<Vec<Record>> {
        let path = self.table_path(table)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&data)
            .map_err(|e| ShiftCrewError::Store(format!("Failed to parse table '{table}': {e}")))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn query(&self, criteria: &Criteria) -> ShiftCrewResult<Vec<Record>> {
        let records = self.load(&criteria.table).await?;
        Ok(criteria.apply(records.iter()))
    }

    async fn insert_bulk(&self, table: &str, records: Vec<Record>) -> ShiftCrewResult<usize> {
        ensure_objects(table, &records)?;
        let count = records.len();
        if count == 0 {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;
        let mut existing = self.load(table).await?;
        existing.extend(records);
        let json = serde_json::to_string_pretty(&existing)?;
        tokio::fs::write(self.table_path(table)?, json).await?;
        debug!(table = %table, count, "Records written");
        Ok(count)
    }

    async fn tables(&self) -> ShiftCrewResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_criteria_matches() {
        let record = json!({"department": "Electronics", "max_hours": 40});
        assert!(Criteria::table("employees").matches(&record));
        assert!(Criteria::table("employees")
            .filter("department", "Electronics")
            .matches(&record));
        assert!(!Criteria::table("employees")
            .filter("department", "Grocery")
            .matches(&record));
        assert!(!Criteria::table("employees")
            .filter("missing", 1)
            .matches(&record));
    }

    #[tokio::test]
    async fn test_memory_insert_and_query() {
        let store = MemoryRecordStore::new();
        let inserted = store
            .insert_bulk(
                "employees",
                vec![
                    json!({"id": "emp_000", "department": "Sales Floor"}),
                    json!({"id": "emp_001", "department": "Electronics"}),
                    json!({"id": "emp_002", "department": "Sales Floor"}),
                ],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let sales = store
            .query(&Criteria::table("employees").filter("department", "Sales Floor"))
            .await
            .unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0]["id"], "emp_000");

        let limited = store
            .query(&Criteria::table("employees").limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        assert!(store
            .query(&Criteria::table("schedules"))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.tables().await.unwrap(), vec!["employees".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_rejects_non_objects() {
        let store = MemoryRecordStore::new();
        let err = store
            .insert_bulk("employees", vec![json!({"id": 1}), json!(42)])
            .await
            .unwrap_err();
        assert!(matches!(err, ShiftCrewError::Store(_)));
        assert!(store.tables().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_insert_is_noop() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.insert_bulk("schedules", vec![]).await.unwrap(), 0);
        assert!(store.tables().await.unwrap().is_empty());
    }
}
