use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Canceled,
    Rescheduled,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown appointment status: {0:?}")]
pub struct ParseStatusError(pub String);

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Canceled => "canceled",
            AppointmentStatus::Rescheduled => "rescheduled",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = ParseStatusError;

    // Legacy labels from the scheduling frontend are still present in older rows.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" | "agendado" => Ok(AppointmentStatus::Scheduled),
            "completed" | "concluido" => Ok(AppointmentStatus::Completed),
            "canceled" | "cancelled" | "cancelado" => Ok(AppointmentStatus::Canceled),
            "rescheduled" | "reagendado" => Ok(AppointmentStatus::Rescheduled),
            _ => Err(ParseStatusError(value.to_string())),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One appointment as the engine sees it. A `None` status never matches a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentRecord {
    pub date: NaiveDate,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone)]
pub struct PatientHistory {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub appointments: Vec<AppointmentRecord>,
}

#[derive(Debug, Clone)]
pub struct Psychologist {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientMetrics {
    pub total_appointments: usize,
    pub completed_appointments: usize,
    pub canceled_appointments: usize,
    pub cancellation_rate: f64,
    pub days_since_last: i64,
    pub frequency_per_month: f64,
    pub appointments_last_30: usize,
    pub appointments_last_60: usize,
    pub appointments_last_90: usize,
    pub recent_trend: i64,
    pub has_future_appointments: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
        }
    }

    /// Ordering rank, higher is riskier.
    pub fn rank(&self) -> u8 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Moderate => 1,
            RiskLevel::High => 2,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "moderate" => Ok(RiskLevel::Moderate),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskResult {
    pub id: Uuid,
    pub patient: String,
    pub risk: RiskLevel,
    pub risk_score: u8,
    pub reason: String,
    pub last_appointment: Option<NaiveDate>,
    pub metrics: PatientMetrics,
}

#[derive(Debug, Clone)]
pub struct RiskLevelSummary {
    pub level: RiskLevel,
    pub count: usize,
    pub avg_score: f64,
}
