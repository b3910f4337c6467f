use chrono::{Local, NaiveDate};

use crate::models::{PatientMetrics, RiskLevel};

const RECENCY_WEIGHT: f64 = 30.0;
const RECENCY_SATURATION_DAYS: f64 = 60.0;
const CANCELLATION_WEIGHT: f64 = 25.0;

pub const HIGH_RISK_THRESHOLD: u8 = 70;
pub const MODERATE_RISK_THRESHOLD: u8 = 40;

pub const NO_CRITICAL_REASONS: &str = "No critical reasons identified";

/// Score a patient's disengagement risk on a 0-100 scale.
///
/// Six weighted rules are summed: recency (30), cancellations (25), low
/// frequency (20), recent inactivity (15), negative trend (10) and the
/// absence of any scheduled appointment (5). The sum is truncated and capped.
pub fn score_metrics(metrics: &PatientMetrics) -> u8 {
    let mut score = recency_points(metrics.days_since_last);
    score += metrics.cancellation_rate * CANCELLATION_WEIGHT;
    score += frequency_points(metrics.frequency_per_month);
    score += inactivity_points(metrics.appointments_last_30, metrics.appointments_last_60);
    score += trend_points(metrics.recent_trend);

    if !metrics.has_future_appointments {
        score += 5.0;
    }

    score.floor().clamp(0.0, 100.0) as u8
}

pub fn recency_points(days_since_last: i64) -> f64 {
    // Future-dated history must not reduce the score.
    let days = days_since_last.max(0) as f64;
    (days / RECENCY_SATURATION_DAYS).min(1.0) * RECENCY_WEIGHT
}

pub fn frequency_points(frequency_per_month: f64) -> f64 {
    if frequency_per_month < 1.0 {
        20.0
    } else if frequency_per_month < 2.0 {
        10.0
    } else {
        0.0
    }
}

pub fn inactivity_points(last_30: usize, last_60: usize) -> f64 {
    if last_30 == 0 {
        15.0
    } else if last_60 == 0 {
        10.0
    } else {
        0.0
    }
}

pub fn trend_points(recent_trend: i64) -> f64 {
    match recent_trend {
        t if t < -1 => 10.0,
        t if t < 0 => 5.0,
        _ => 0.0,
    }
}

pub fn classify(score: u8) -> RiskLevel {
    if score >= HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if score >= MODERATE_RISK_THRESHOLD {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Explain a patient's risk by listing every warning sign present in their metrics.
pub fn identify_reasons(metrics: &PatientMetrics) -> String {
    let mut reasons: Vec<&'static str> = Vec::new();

    if metrics.days_since_last > 60 {
        reasons.push("Absent for more than 60 days");
    } else if metrics.days_since_last > 45 {
        reasons.push("Absent for more than 45 days");
    } else if metrics.days_since_last > 30 {
        reasons.push("Absent for more than 30 days");
    }

    if metrics.cancellation_rate > 0.3 {
        reasons.push("High cancellation rate");
    } else if metrics.cancellation_rate > 0.2 {
        reasons.push("Frequent cancellations");
    }

    if metrics.frequency_per_month < 1.0 {
        reasons.push("Low appointment frequency");
    }

    if metrics.appointments_last_30 == 0 {
        reasons.push("No appointments in the last month");
    }

    if metrics.recent_trend < -1 {
        reasons.push("Declining attendance");
    } else if metrics.recent_trend < 0 {
        reasons.push("Slight drop in attendance");
    }

    if !metrics.has_future_appointments {
        reasons.push("No upcoming appointments");
    }

    if reasons.is_empty() {
        NO_CRITICAL_REASONS.to_string()
    } else {
        reasons.join(", ")
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
