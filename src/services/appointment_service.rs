// src/services/appointment_service.rs

use std::{collections::BTreeSet, sync::Arc};

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    clock::Clock,
    models::{
        Appointment, AppointmentQuery, AppointmentStatus, CreateAppointmentRequest, StoredRecord,
        UnknownStatus,
    },
    services::{
        availability::{self, Availability, AvailabilityError},
        lifecycle,
    },
    store::AppointmentStore,
};

pub const DEFAULT_DURATION: &str = "30 min";

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error(transparent)]
    InvalidFormat(#[from] AvailabilityError),
    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatus),
    #[error("doctor is busy at this time, next suggested time {suggested_time}")]
    DoctorBusy { suggested_time: String },
}

/// Query and mutation entry point. Each call reloads the collection from the
/// store, applies the lifecycle sweep, and holds `lock` until any write is done.
/// Stored entries that do not decode are never served or modified, but are
/// written back with every save.
pub struct AppointmentService {
    store: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn AppointmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            lock: Mutex::new(()),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn is_simulation(&self) -> bool {
        self.clock.is_simulated()
    }

    /* ---------------- reads ---------------- */

    pub async fn list(&self, query: &AppointmentQuery) -> Vec<Appointment> {
        let _guard = self.lock.lock().await;
        let filter = ListFilter::from_query(query);
        let records = self.load_current().await;
        readable(&records).filter(|a| filter.matches(a)).cloned().collect()
    }

    pub async fn doctors(&self) -> Vec<String> {
        let _guard = self.lock.lock().await;
        let records = self.load_current().await;
        readable(&records)
            .map(|a| a.doctor_name.as_str())
            .filter(|d| !d.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Runs the sweep once without serving a request; used at startup.
    pub async fn sweep(&self) -> usize {
        let _guard = self.lock.lock().await;
        let mut records = self.load_or_empty().await;
        let changed = lifecycle::sweep_past_appointments(readable_mut(&mut records), self.clock.today());
        if changed > 0 {
            self.persist(&records).await;
        }
        changed
    }

    /* ---------------- writes ---------------- */

    pub async fn create(&self, req: CreateAppointmentRequest) -> Result<Appointment, BookingError> {
        let draft = Draft::validate(req)?;

        let _guard = self.lock.lock().await;
        let mut records = self.load_current().await;

        let availability = availability::check_availability(
            readable(&records),
            &draft.doctor_name,
            draft.date,
            &draft.time,
            &draft.duration,
        )?;
        if let Availability::Busy { suggested_time } = availability {
            return Err(BookingError::DoctorBusy { suggested_time });
        }

        let appt = Appointment {
            id: next_id(&records),
            doctor_name: draft.doctor_name,
            name: draft.name,
            date: draft.date,
            time: draft.time,
            duration: draft.duration,
            status: draft.status,
            mode: draft.mode,
        };
        records.push(appt.clone().into());
        self.persist(&records).await;

        info!(id = %appt.id, doctor = %appt.doctor_name, date = %appt.date, time = %appt.time, "appointment booked");
        Ok(appt)
    }

    /// Sets `status` unconditionally. `None` when no record has that id.
    pub async fn update_status(&self, id: &str, status: AppointmentStatus) -> Option<Appointment> {
        let _guard = self.lock.lock().await;
        let mut records = self.load_current().await;

        let updated = {
            let appt = readable_mut(&mut records).find(|a| a.id == id.trim())?;
            appt.status = status;
            appt.clone()
        };
        self.persist(&records).await;

        info!(id = %updated.id, status = %updated.status, "appointment status updated");
        Some(updated)
    }

    /* ---------------- store plumbing ---------------- */

    async fn load_or_empty(&self) -> Vec<StoredRecord> {
        match self.store.load().await {
            Ok(v) => v,
            Err(e) => {
                warn!("could not read appointments, starting empty: {e}");
                Vec::new()
            }
        }
    }

    /// Loads the collection and applies the lifecycle sweep, writing back
    /// only when a record changed.
    async fn load_current(&self) -> Vec<StoredRecord> {
        let mut records = self.load_or_empty().await;
        let changed = lifecycle::sweep_past_appointments(readable_mut(&mut records), self.clock.today());
        if changed > 0 {
            info!(count = changed, "auto-cancelled past appointments");
            self.persist(&records).await;
        }
        records
    }

    async fn persist(&self, records: &[StoredRecord]) {
        if let Err(e) = self.store.save(records).await {
            error!("failed to save appointments: {e}");
        }
    }
}

/* ============================================================
   Helpers
   ============================================================ */

fn readable(records: &[StoredRecord]) -> impl Iterator<Item = &Appointment> {
    records.iter().filter_map(StoredRecord::as_appointment)
}

fn readable_mut(records: &mut [StoredRecord]) -> impl Iterator<Item = &mut Appointment> {
    records.iter_mut().filter_map(StoredRecord::as_appointment_mut)
}

/// Max numeric id plus one; undecodable entries still count.
fn next_id(records: &[StoredRecord]) -> String {
    records
        .iter()
        .filter_map(StoredRecord::numeric_id)
        .max()
        .map(|max| (max + 1).to_string())
        .unwrap_or_else(|| "1".to_string())
}

struct ListFilter {
    date: Option<String>,
    status: Option<String>,
    search: Option<String>,
}

impl ListFilter {
    fn from_query(q: &AppointmentQuery) -> Self {
        fn non_blank(v: &Option<String>) -> Option<String> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
        }

        Self {
            date: non_blank(&q.date),
            status: non_blank(&q.status).filter(|s| !s.eq_ignore_ascii_case("all")),
            search: non_blank(&q.search).map(|s| s.to_lowercase()),
        }
    }

    fn matches(&self, a: &Appointment) -> bool {
        if let Some(date) = &self.date {
            if a.date.format("%Y-%m-%d").to_string() != *date {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if !a.status.as_str().eq_ignore_ascii_case(status) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !a.name.to_lowercase().contains(search.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A create request with required fields present and formats checked.
struct Draft {
    name: String,
    doctor_name: String,
    date: NaiveDate,
    time: String,
    duration: String,
    status: AppointmentStatus,
    mode: String,
}

impl Draft {
    fn validate(req: CreateAppointmentRequest) -> Result<Self, BookingError> {
        fn present(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }

        let name = present(req.name);
        let date = present(req.date);
        let time = present(req.time);
        let doctor_name = present(req.doctor_name);
        let mode = present(req.mode);

        let (Some(name), Some(date), Some(time), Some(doctor_name), Some(mode)) =
            (name.clone(), date.clone(), time.clone(), doctor_name.clone(), mode.clone())
        else {
            let missing = [
                ("name", name.is_none()),
                ("date", date.is_none()),
                ("time", time.is_none()),
                ("doctorName", doctor_name.is_none()),
                ("mode", mode.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, absent)| absent.then_some(field))
            .collect();
            return Err(BookingError::MissingFields(missing));
        };

        let date = availability::parse_date(&date)?;
        let time = availability::format_time(availability::parse_time(&time)?);
        let minutes = availability::parse_duration_minutes(
            present(req.duration).as_deref().unwrap_or(DEFAULT_DURATION),
        )?;
        let status = match present(req.status) {
            Some(s) => s.parse()?,
            None => AppointmentStatus::Scheduled,
        };

        Ok(Self {
            name,
            doctor_name,
            date,
            time,
            duration: format!("{minutes} min"),
            status,
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::SimulatedClock,
        store::{MemoryStore, StoreError},
    };
    use async_trait::async_trait;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 20).unwrap()
    }

    fn record(id: &str, doctor: &str, name: &str, date: NaiveDate, time: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: id.into(),
            doctor_name: doctor.into(),
            name: name.into(),
            date,
            time: time.into(),
            duration: "30 min".into(),
            status,
            mode: "In-Person".into(),
        }
    }

    fn request(doctor: &str, date: &str, time: &str) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            name: Some("Alice Walker".into()),
            doctor_name: Some(doctor.into()),
            date: Some(date.into()),
            time: Some(time.into()),
            duration: None,
            status: None,
            mode: Some("Video Call".into()),
        }
    }

    fn service(store: Arc<MemoryStore>) -> AppointmentService {
        AppointmentService::new(store, Arc::new(SimulatedClock::new(today())))
    }

    #[tokio::test]
    async fn first_appointment_gets_id_one_and_defaults() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone());

        let created = svc.create(request("Dr. Smith", "2025-02-21", "09:00")).await.unwrap();

        assert_eq!(created.id, "1");
        assert_eq!(created.time, "09:00 AM");
        assert_eq!(created.duration, DEFAULT_DURATION);
        assert_eq!(created.status, AppointmentStatus::Scheduled);
        assert_eq!(store.snapshot().await, vec![created]);
    }

    #[tokio::test]
    async fn new_id_is_max_numeric_plus_one() {
        let d = today();
        let store = Arc::new(MemoryStore::with_records(vec![
            record("3", "Dr. Smith", "A", d, "09:00 AM", AppointmentStatus::Confirmed),
            record("legacy-x", "Dr. Smith", "B", d, "11:00 AM", AppointmentStatus::Confirmed),
            record("10", "Dr. Jones", "C", d, "09:00 AM", AppointmentStatus::Confirmed),
        ]));
        let svc = service(store);

        let created = svc.create(request("Dr. Smith", "2025-02-20", "01:00 PM")).await.unwrap();
        assert_eq!(created.id, "11");
    }

    #[tokio::test]
    async fn conflict_leaves_store_untouched() {
        let d = today();
        let store = Arc::new(MemoryStore::with_records(vec![record(
            "1", "Dr. Smith", "A", d, "10:00 AM", AppointmentStatus::Confirmed,
        )]));
        let svc = service(store.clone());

        let err = svc.create(request("Dr. Smith", "2025-02-20", "10:15 AM")).await.unwrap_err();

        match err {
            BookingError::DoctorBusy { suggested_time } => assert_eq!(suggested_time, "10:30 AM"),
            other => panic!("expected DoctorBusy, got {other:?}"),
        }
        assert_eq!(store.save_count(), 0);
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_fields_are_reported_by_name() {
        let svc = service(Arc::new(MemoryStore::default()));
        let req = CreateAppointmentRequest {
            name: Some("  ".into()),
            time: Some("10:00 AM".into()),
            ..Default::default()
        };

        match svc.create(req).await.unwrap_err() {
            BookingError::MissingFields(fields) => {
                assert_eq!(fields, vec!["name", "date", "doctorName", "mode"])
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_inputs_are_invalid_format_or_unknown_status() {
        let svc = service(Arc::new(MemoryStore::default()));

        let bad_date = svc.create(request("Dr. Smith", "20-02-2025", "10:00 AM")).await;
        assert!(matches!(bad_date, Err(BookingError::InvalidFormat(AvailabilityError::Date(_)))));

        let mut bad_duration = request("Dr. Smith", "2025-02-21", "10:00 AM");
        bad_duration.duration = Some("a while".into());
        assert!(matches!(
            svc.create(bad_duration).await,
            Err(BookingError::InvalidFormat(AvailabilityError::Duration(_)))
        ));

        let mut bad_status = request("Dr. Smith", "2025-02-21", "10:00 AM");
        bad_status.status = Some("Maybe".into());
        assert!(matches!(svc.create(bad_status).await, Err(BookingError::UnknownStatus(_))));
    }

    #[tokio::test]
    async fn load_sweeps_past_records_and_saves_once() {
        let yesterday = today().pred_opt().unwrap();
        let store = Arc::new(MemoryStore::with_records(vec![
            record("1", "Dr. Smith", "A", yesterday, "10:00 AM", AppointmentStatus::Scheduled),
            record("2", "Dr. Smith", "B", today(), "10:00 AM", AppointmentStatus::Scheduled),
        ]));
        let svc = service(store.clone());

        let all = svc.list(&AppointmentQuery::default()).await;
        assert_eq!(all[0].status, AppointmentStatus::Cancelled);
        assert_eq!(all[1].status, AppointmentStatus::Scheduled);
        assert_eq!(store.save_count(), 1);

        svc.list(&AppointmentQuery::default()).await;
        assert_eq!(store.save_count(), 1, "nothing left to sweep");
    }

    #[tokio::test]
    async fn startup_sweep_reports_count() {
        let past = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let store = Arc::new(MemoryStore::with_records(vec![
            record("1", "Dr. Smith", "A", past, "10:00 AM", AppointmentStatus::Pending),
            record("2", "Dr. Smith", "B", past, "11:00 AM", AppointmentStatus::Completed),
        ]));
        let svc = service(store.clone());

        assert_eq!(svc.sweep().await, 1);
        assert_eq!(svc.sweep().await, 0);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn filters_compose() {
        let d = today();
        let tomorrow = d.succ_opt().unwrap();
        let store = Arc::new(MemoryStore::with_records(vec![
            record("1", "Dr. Smith", "John Doe", d, "09:00 AM", AppointmentStatus::Confirmed),
            record("2", "Dr. Smith", "Johnny Cash", d, "10:00 AM", AppointmentStatus::Cancelled),
            record("3", "Dr. Jones", "Jane Roe", tomorrow, "09:00 AM", AppointmentStatus::Confirmed),
        ]));
        let svc = service(store);

        let q = AppointmentQuery {
            date: Some("2025-02-20".into()),
            status: Some("CONFIRMED".into()),
            search: Some("john".into()),
        };
        let ids: Vec<_> = svc.list(&q).await.into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["1"]);

        let q = AppointmentQuery {
            status: Some("All".into()),
            ..Default::default()
        };
        assert_eq!(svc.list(&q).await.len(), 3);

        let q = AppointmentQuery {
            status: Some("cancelled".into()),
            ..Default::default()
        };
        let ids: Vec<_> = svc.list(&q).await.into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[tokio::test]
    async fn update_status_is_unconditional() {
        let d = today();
        let store = Arc::new(MemoryStore::with_records(vec![record(
            "4", "Dr. Smith", "A", d, "09:00 AM", AppointmentStatus::Completed,
        )]));
        let svc = service(store.clone());

        let updated = svc.update_status("4", AppointmentStatus::Pending).await.unwrap();
        assert_eq!(updated.status, AppointmentStatus::Pending);
        assert_eq!(store.snapshot().await[0].status, AppointmentStatus::Pending);

        assert!(svc.update_status("99", AppointmentStatus::Denied).await.is_none());
    }

    #[tokio::test]
    async fn doctors_are_sorted_and_distinct() {
        let d = today();
        let store = Arc::new(MemoryStore::with_records(vec![
            record("1", "Dr. Smith", "A", d, "09:00 AM", AppointmentStatus::Confirmed),
            record("2", "Dr. Adams", "B", d, "09:00 AM", AppointmentStatus::Confirmed),
            record("3", "Dr. Smith", "C", d, "10:00 AM", AppointmentStatus::Confirmed),
        ]));
        let svc = service(store);

        assert_eq!(svc.doctors().await, vec!["Dr. Adams", "Dr. Smith"]);
    }

    #[tokio::test]
    async fn undecodable_entry_survives_a_booking_next_to_it() {
        let tomorrow = today().succ_opt().unwrap();
        let good = record("1", "Dr. Smith", "John Doe", tomorrow, "10:00 AM", AppointmentStatus::Confirmed);
        let broken = serde_json::json!({
            "id": "2",
            "doctorName": "Dr. Smith",
            "name": "Jane Roe",
            "date": "",
            "time": "10:00 AM",
            "status": "Scheduled",
        });
        let store = Arc::new(MemoryStore::with_stored(vec![
            good.clone().into(),
            StoredRecord::Unreadable(broken.clone()),
        ]));
        let svc = service(store.clone());

        // the readable booking still blocks its slot
        let err = svc.create(request("Dr. Smith", "2025-02-21", "10:00 AM")).await.unwrap_err();
        assert!(matches!(err, BookingError::DoctorBusy { .. }), "got {err:?}");
        assert_eq!(store.save_count(), 0);

        let created = svc.create(request("Dr. Smith", "2025-02-21", "11:00 AM")).await.unwrap();
        assert_eq!(created.id, "3", "id 2 stays reserved by the unreadable entry");

        assert_eq!(
            store.stored().await,
            vec![good.clone().into(), StoredRecord::Unreadable(broken), created.clone().into()]
        );
        assert_eq!(svc.list(&AppointmentQuery::default()).await, vec![good, created]);
        assert_eq!(svc.doctors().await, vec!["Dr. Smith"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bookings_for_one_slot_admit_exactly_one() {
        let svc = Arc::new(service(Arc::new(MemoryStore::default())));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.create(request("Dr. Smith", "2025-02-21", "10:00 AM")).await })
            })
            .collect();

        let mut booked = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                booked += 1;
            }
        }
        assert_eq!(booked, 1);
    }

    struct BrokenStore;

    #[async_trait]
    impl AppointmentStore for BrokenStore {
        async fn load(&self) -> Result<Vec<StoredRecord>, StoreError> {
            Err(StoreError::Io {
                path: "appointments.json".into(),
                source: std::io::Error::other("unreadable"),
            })
        }

        async fn save(&self, _records: &[StoredRecord]) -> Result<(), StoreError> {
            Err(StoreError::Io {
                path: "appointments.json".into(),
                source: std::io::Error::other("read-only"),
            })
        }
    }

    #[tokio::test]
    async fn io_failures_degrade_to_empty_and_still_succeed() {
        let svc = AppointmentService::new(Arc::new(BrokenStore), Arc::new(SimulatedClock::new(today())));

        assert!(svc.list(&AppointmentQuery::default()).await.is_empty());
        let created = svc.create(request("Dr. Smith", "2025-02-21", "10:00 AM")).await.unwrap();
        assert_eq!(created.id, "1");
    }
}
