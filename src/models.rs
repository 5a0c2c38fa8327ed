use std::{fmt, str::FromStr, sync::Arc};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::services::appointment_service::AppointmentService;

#[derive(Clone)]
pub struct AppState {
    pub appointments: Arc<AppointmentService>,
}

/* -------------------------
   Stored records
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Pending,
    Completed,
    Cancelled,
    Denied,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Pending,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Denied,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::Denied => "Denied",
        }
    }

    /// Completed, Cancelled and Denied are never moved by the sweeper.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Denied
        )
    }

    /// Whether the slot still occupies the doctor's calendar.
    pub fn blocks_calendar(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Denied)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown appointment status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AppointmentStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl Serialize for AppointmentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AppointmentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub doctor_name: String,
    #[serde(alias = "patientName")]
    pub name: String,
    pub date: NaiveDate,
    pub time: String,
    pub duration: String,
    pub status: AppointmentStatus,
    #[serde(alias = "type")]
    pub mode: String,
}

impl Appointment {
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.trim().parse().ok()
    }
}

/// One entry of the data file. Entries that do not decode as an
/// [`Appointment`] are carried verbatim so a save never drops them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredRecord {
    Appointment(Appointment),
    Unreadable(serde_json::Value),
}

impl StoredRecord {
    pub fn as_appointment(&self) -> Option<&Appointment> {
        match self {
            StoredRecord::Appointment(a) => Some(a),
            StoredRecord::Unreadable(_) => None,
        }
    }

    pub fn as_appointment_mut(&mut self) -> Option<&mut Appointment> {
        match self {
            StoredRecord::Appointment(a) => Some(a),
            StoredRecord::Unreadable(_) => None,
        }
    }

    /// Unreadable entries still reserve their id.
    pub fn numeric_id(&self) -> Option<u64> {
        match self {
            StoredRecord::Appointment(a) => a.numeric_id(),
            StoredRecord::Unreadable(v) => match v.get("id")? {
                serde_json::Value::String(s) => s.trim().parse().ok(),
                serde_json::Value::Number(n) => n.as_u64(),
                _ => None,
            },
        }
    }
}

impl From<Appointment> for StoredRecord {
    fn from(a: Appointment) -> Self {
        StoredRecord::Appointment(a)
    }
}

// Older data files carry numeric ids; we always write strings back.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentQuery {
    pub date: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

/// Every field is optional so that missing ones surface as a 400
/// instead of a JSON extractor rejection.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    #[serde(alias = "patientName")]
    pub name: Option<String>,
    pub doctor_name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "type")]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub current_date: NaiveDate,
    pub is_simulation: bool,
    pub theme: &'static str,
}
