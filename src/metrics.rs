use chrono::NaiveDate;

use crate::models::{AppointmentRecord, AppointmentStatus, PatientMetrics};

/// Reported as `days_since_last` when there is no appointment to measure from.
pub const NO_HISTORY_DAYS: i64 = 999;

const DAYS_PER_MONTH: f64 = 30.0;

/// Reduce one patient's appointment history to the fixed feature set used for scoring.
///
/// Records may arrive in any order. Windows are measured in calendar days back
/// from `today`, so records dated in the future fall inside every window.
pub fn extract_metrics(appointments: &[AppointmentRecord], today: NaiveDate) -> PatientMetrics {
    let total_appointments = appointments.len();
    let completed = count_status(appointments, AppointmentStatus::Completed);
    let canceled = count_status(appointments, AppointmentStatus::Canceled);
    let has_future_appointments = appointments
        .iter()
        .any(|apt| apt.status == Some(AppointmentStatus::Scheduled));

    let cancellation_rate = if total_appointments > 0 {
        canceled as f64 / total_appointments as f64
    } else {
        0.0
    };

    let days_since_last = last_appointment_date(appointments)
        .map(|last| days_between(today, last))
        .unwrap_or(NO_HISTORY_DAYS);

    let frequency_per_month = match first_appointment_date(appointments) {
        Some(first) => {
            let months_active = (days_between(today, first) as f64 / DAYS_PER_MONTH).max(1.0);
            completed as f64 / months_active
        }
        None => 0.0,
    };

    let recent_completed = appointments
        .iter()
        .filter(|apt| apt.status == Some(AppointmentStatus::Completed))
        .filter(|apt| days_between(today, apt.date) <= 30)
        .count() as i64;
    let previous_completed = appointments
        .iter()
        .filter(|apt| apt.status == Some(AppointmentStatus::Completed))
        .filter(|apt| {
            let days_ago = days_between(today, apt.date);
            days_ago > 30 && days_ago <= 60
        })
        .count() as i64;

    PatientMetrics {
        total_appointments,
        completed_appointments: completed,
        canceled_appointments: canceled,
        cancellation_rate,
        days_since_last,
        frequency_per_month,
        appointments_last_30: count_within(appointments, today, 30),
        appointments_last_60: count_within(appointments, today, 60),
        appointments_last_90: count_within(appointments, today, 90),
        recent_trend: recent_completed - previous_completed,
        has_future_appointments,
    }
}

pub fn last_appointment_date(appointments: &[AppointmentRecord]) -> Option<NaiveDate> {
    appointments.iter().map(|apt| apt.date).max()
}

fn first_appointment_date(appointments: &[AppointmentRecord]) -> Option<NaiveDate> {
    appointments.iter().map(|apt| apt.date).min()
}

fn count_status(appointments: &[AppointmentRecord], status: AppointmentStatus) -> usize {
    appointments
        .iter()
        .filter(|apt| apt.status == Some(status))
        .count()
}

fn count_within(appointments: &[AppointmentRecord], today: NaiveDate, days: i64) -> usize {
    appointments
        .iter()
        .filter(|apt| days_between(today, apt.date) <= days)
        .count()
}

fn days_between(today: NaiveDate, date: NaiveDate) -> i64 {
    (today - date).num_days()
}
