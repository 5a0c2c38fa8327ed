use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{Appointment, StoredRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed appointment data in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Whole-collection persistence. Every operation reads or replaces
/// the complete list, in file order.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn load(&self) -> Result<Vec<StoredRecord>, StoreError>;

    async fn save(&self, records: &[StoredRecord]) -> Result<(), StoreError>;
}

/* ============================================================
   JSON file
   ============================================================ */

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "appointments.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl AppointmentStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            // first run: no file yet
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        // Only a file that is not a JSON array counts as corrupt; single
        // entries that fail to decode are kept as they are.
        let entries: Vec<Value> = serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(index, value)| match serde_json::from_value::<Appointment>(value.clone()) {
                Ok(appt) => StoredRecord::Appointment(appt),
                Err(e) => {
                    warn!(path = %self.path.display(), index, "keeping unreadable appointment entry as-is: {e}");
                    StoredRecord::Unreadable(value)
                }
            })
            .collect())
    }

    async fn save(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(records).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        // Write beside the target, then rename over it, so a crash never
        // leaves a half-written data file.
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| self.io_err(e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.io_err(e));
        }

        debug!(path = %self.path.display(), count = records.len(), "appointments saved");
        Ok(())
    }
}

/* ============================================================
   In-memory (tests)
   ============================================================ */

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: tokio::sync::RwLock<Vec<StoredRecord>>,
    saves: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    pub fn with_records(records: Vec<Appointment>) -> Self {
        Self::with_stored(records.into_iter().map(StoredRecord::from).collect())
    }

    pub fn with_stored(records: Vec<StoredRecord>) -> Self {
        Self {
            records: tokio::sync::RwLock::new(records),
            saves: Default::default(),
        }
    }

    /// Number of `save` calls observed so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Readable appointments currently held.
    pub async fn snapshot(&self) -> Vec<Appointment> {
        self.records
            .read()
            .await
            .iter()
            .filter_map(StoredRecord::as_appointment)
            .cloned()
            .collect()
    }

    pub async fn stored(&self) -> Vec<StoredRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn load(&self) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self.records.read().await.clone())
    }

    async fn save(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        *self.records.write().await = records.to_vec();
        self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::NaiveDate;
    use serde_json::json;

    fn sample(id: &str) -> Appointment {
        Appointment {
            id: id.to_string(),
            doctor_name: "Dr. Smith".into(),
            name: "John Doe".into(),
            date: NaiveDate::from_ymd_opt(2025, 2, 20).unwrap(),
            time: "10:00 AM".into(),
            duration: "30 min".into(),
            status: AppointmentStatus::Confirmed,
            mode: "In-Person".into(),
        }
    }

    fn readable(records: &[StoredRecord]) -> Vec<&Appointment> {
        records.iter().filter_map(StoredRecord::as_appointment).collect()
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("appointments.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_keeps_records_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("appointments.json"));

        store.save(&[sample("1").into(), sample("2").into()]).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(readable(&loaded)[1].id, "2");
        assert!(!store.temp_path().exists());

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"doctorName\": \"Dr. Smith\""), "pretty camelCase output: {raw}");
    }

    #[tokio::test]
    async fn reads_legacy_keys_and_numeric_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appointments.json");
        std::fs::write(
            &path,
            r#"[{"id": 7, "patientName": "Jane Roe", "doctorName": "Dr. Jones",
                 "date": "2025-02-21", "time": "11:00 AM", "duration": "30 min",
                 "type": "Follow-up", "status": "pending"}]"#,
        )
        .unwrap();

        let loaded = JsonFileStore::new(&path).load().await.unwrap();
        let appt = readable(&loaded)[0];
        assert_eq!(appt.id, "7");
        assert_eq!(appt.name, "Jane Roe");
        assert_eq!(appt.mode, "Follow-up");
        assert_eq!(appt.status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn file_that_is_not_an_array_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appointments.json");

        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));

        std::fs::write(&path, r#"{"id": "1"}"#).unwrap();
        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[tokio::test]
    async fn undecodable_entry_is_kept_beside_good_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appointments.json");
        let broken = json!({ "id": "2", "doctorName": "Dr. Smith", "date": "", "status": "Scheduled" });
        std::fs::write(
            &path,
            serde_json::to_vec(&json!([serde_json::to_value(sample("1")).unwrap(), broken])).unwrap(),
        )
        .unwrap();
        let store = JsonFileStore::new(&path);

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], StoredRecord::Appointment(sample("1")));
        assert_eq!(loaded[1], StoredRecord::Unreadable(broken.clone()));
        assert_eq!(loaded[1].numeric_id(), Some(2));

        // written back untouched, in the same position
        store.save(&loaded).await.unwrap();
        let on_disk: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk[1], broken);
        assert_eq!(on_disk[0]["doctorName"], "Dr. Smith");
    }
}
