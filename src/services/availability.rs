// src/services/availability.rs

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::models::Appointment;

pub const SLOT_TIME_FORMAT: &str = "%I:%M %p";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AvailabilityError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    Date(String),
    #[error("invalid time '{0}', expected hh:mm AM/PM")]
    Time(String),
    #[error("invalid duration '{0}', expected e.g. \"30 min\"")]
    Duration(String),
    #[error("slot starting {0} runs past midnight")]
    PastMidnight(String),
}

/// Half-open `[start, end)` window on a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Slot {
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && self.end > other.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Free,
    /// `suggested_time` is the latest end among the conflicting slots.
    /// It is not guaranteed to be free itself.
    Busy { suggested_time: String },
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, AvailabilityError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| AvailabilityError::Date(raw.to_string()))
}

/// Accepts `hh:mm AM/PM`, and 24-hour `HH:MM` as sent by browser time pickers.
pub fn parse_time(raw: &str) -> Result<NaiveTime, AvailabilityError> {
    let t = raw.trim();
    NaiveTime::parse_from_str(&t.to_ascii_uppercase(), SLOT_TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
        .map_err(|_| AvailabilityError::Time(raw.to_string()))
}

/// "30 min", "45 mins", "60 minutes" or a bare "30". Zero is rejected.
pub fn parse_duration_minutes(raw: &str) -> Result<u32, AvailabilityError> {
    let lower = raw.trim().to_ascii_lowercase();
    let digits = ["minutes", "mins", "min"]
        .iter()
        .find_map(|suffix| lower.strip_suffix(suffix))
        .unwrap_or(&lower)
        .trim();

    match digits.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AvailabilityError::Duration(raw.to_string())),
    }
}

pub fn format_time(t: NaiveTime) -> String {
    t.format(SLOT_TIME_FORMAT).to_string()
}

pub fn slot_for(date: NaiveDate, time: &str, duration: &str) -> Result<Slot, AvailabilityError> {
    let start = date.and_time(parse_time(time)?);
    let minutes = parse_duration_minutes(duration)?;
    Ok(Slot {
        start,
        end: start + Duration::minutes(i64::from(minutes)),
    })
}

/// Like [`slot_for`], but the slot must end by midnight of its own day,
/// since bookings are only compared against the same date.
pub fn candidate_slot(date: NaiveDate, time: &str, duration: &str) -> Result<Slot, AvailabilityError> {
    let slot = slot_for(date, time, duration)?;
    let midnight = date
        .succ_opt()
        .map(|next| next.and_time(NaiveTime::MIN))
        .ok_or_else(|| AvailabilityError::Date(date.to_string()))?;
    if slot.end > midnight {
        return Err(AvailabilityError::PastMidnight(format_time(slot.start.time())));
    }
    Ok(slot)
}

/// Checks a candidate booking against the doctor's calendar for that day.
///
/// Cancelled and denied appointments do not block. Existing records whose
/// time or duration cannot be parsed are skipped.
pub fn check_availability<'a>(
    existing: impl IntoIterator<Item = &'a Appointment>,
    doctor_name: &str,
    date: NaiveDate,
    time: &str,
    duration: &str,
) -> Result<Availability, AvailabilityError> {
    let candidate = candidate_slot(date, time, duration)?;

    let mut conflict_ends: Vec<NaiveDateTime> = existing
        .into_iter()
        .filter(|a| a.doctor_name == doctor_name && a.date == date && a.status.blocks_calendar())
        .filter_map(|a| slot_for(a.date, &a.time, &a.duration).ok())
        .filter(|slot| candidate.overlaps(slot))
        .map(|slot| slot.end)
        .collect();

    if conflict_ends.is_empty() {
        return Ok(Availability::Free);
    }

    conflict_ends.sort();
    let latest = conflict_ends[conflict_ends.len() - 1];
    debug!(
        doctor = doctor_name,
        %date,
        conflicts = conflict_ends.len(),
        "requested slot overlaps existing bookings"
    );

    // clock time only, even if an existing slot ran past midnight
    Ok(Availability::Busy {
        suggested_time: format_time(latest.time()),
    })
}
