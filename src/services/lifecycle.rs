// src/services/lifecycle.rs

use chrono::NaiveDate;

use crate::models::{Appointment, AppointmentStatus};

/// Status given to appointments whose day has passed without reaching a
/// terminal state.
pub const EXPIRED_STATUS: AppointmentStatus = AppointmentStatus::Cancelled;

/// Moves every non-terminal appointment dated strictly before `today` to
/// [`EXPIRED_STATUS`]. Returns how many records changed.
pub fn sweep_past_appointments<'a>(
    appointments: impl IntoIterator<Item = &'a mut Appointment>,
    today: NaiveDate,
) -> usize {
    let mut changed = 0;
    for appt in appointments {
        if appt.date < today && !appt.status.is_terminal() {
            appt.status = EXPIRED_STATUS;
            changed += 1;
        }
    }
    changed
}
