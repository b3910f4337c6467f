use chrono::NaiveDate;
use tracing::debug;

use crate::metrics::{extract_metrics, last_appointment_date};
use crate::models::{PatientHistory, RiskLevel, RiskResult};
use crate::risk;

/// Run the full assessment for one patient. Patients without appointments are not scored.
pub fn assess_patient(history: &PatientHistory, today: NaiveDate) -> Option<RiskResult> {
    if history.appointments.is_empty() {
        return None;
    }

    let metrics = extract_metrics(&history.appointments, today);
    let risk_score = risk::score_metrics(&metrics);

    Some(RiskResult {
        id: history.patient_id,
        patient: history.patient_name.clone(),
        risk: risk::classify(risk_score),
        risk_score,
        reason: risk::identify_reasons(&metrics),
        last_appointment: last_appointment_date(&history.appointments),
        metrics,
    })
}

/// Assess every patient on a roster and rank them by descending risk score.
///
/// Ties keep the roster's order.
pub fn rank_roster(roster: &[PatientHistory], today: NaiveDate) -> Vec<RiskResult> {
    let mut results: Vec<RiskResult> = roster
        .iter()
        .filter_map(|history| {
            let result = assess_patient(history, today);
            if result.is_none() {
                debug!(patient_id = %history.patient_id, "skipping patient without appointments");
            }
            result
        })
        .collect();

    results.sort_by(|a, b| b.risk_score.cmp(&a.risk_score));
    results
}

/// Keep ranked patients at or above `min_risk`, at most `limit` of them.
pub fn filter_ranked(
    ranked: Vec<RiskResult>,
    min_risk: Option<RiskLevel>,
    limit: usize,
) -> Vec<RiskResult> {
    ranked
        .into_iter()
        .filter(|r| min_risk.map_or(true, |min| r.risk.rank() >= min.rank()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentRecord, AppointmentStatus};
    use chrono::Duration;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn record(days_ago: i64, status: AppointmentStatus) -> AppointmentRecord {
        AppointmentRecord {
            date: today() - Duration::days(days_ago),
            status: Some(status),
        }
    }

    fn patient(name: &str, appointments: Vec<AppointmentRecord>) -> PatientHistory {
        PatientHistory {
            patient_id: Uuid::new_v4(),
            patient_name: name.to_string(),
            appointments,
        }
    }

    fn lapsed_history() -> Vec<AppointmentRecord> {
        (0..10)
            .map(|i| {
                let status = if i % 2 == 0 {
                    AppointmentStatus::Completed
                } else {
                    AppointmentStatus::Canceled
                };
                record(100 + i * 10, status)
            })
            .collect()
    }

    #[test]
    fn single_completed_visit_today_is_low_risk() {
        let history = patient("Avery Lee", vec![record(0, AppointmentStatus::Completed)]);

        let result = assess_patient(&history, today()).unwrap();
        assert_eq!(result.metrics.days_since_last, 0);
        assert_eq!(result.metrics.cancellation_rate, 0.0);
        assert_eq!(result.metrics.appointments_last_30, 1);
        // frequency 1/month (+10) and no upcoming appointment (+5)
        assert_eq!(result.risk_score, 15);
        assert_eq!(result.risk, RiskLevel::Low);
        assert_eq!(result.last_appointment, Some(today()));
    }

    #[test]
    fn lapsed_patient_with_many_cancellations_is_high_risk() {
        let history = patient("Jules Moreno", lapsed_history());

        let result = assess_patient(&history, today()).unwrap();
        assert!((result.metrics.cancellation_rate - 0.5).abs() < 1e-9);
        assert_eq!(result.metrics.appointments_last_30, 0);
        assert_eq!(result.metrics.appointments_last_90, 0);
        assert!(result.metrics.days_since_last >= 90);
        // 30 recency + 12.5 cancellations + 20 frequency + 15 inactivity + 5 no upcoming
        assert_eq!(result.risk_score, 82);
        assert_eq!(result.risk, RiskLevel::High);
        assert!(result.reason.starts_with("Absent for more than 60 days, High cancellation rate"));
    }

    #[test]
    fn empty_history_is_not_assessed() {
        let history = patient("Kiara Patel", Vec::new());
        assert!(assess_patient(&history, today()).is_none());
    }

    #[test]
    fn patients_without_history_are_left_off_the_ranking() {
        let mut roster = vec![
            patient("Avery Lee", vec![record(3, AppointmentStatus::Completed)]),
            patient("Jules Moreno", lapsed_history()),
            patient("Kiara Patel", vec![record(20, AppointmentStatus::Completed)]),
        ];
        let with_history = rank_roster(&roster, today());
        assert_eq!(with_history.len(), 3);

        roster[2].appointments.clear();
        let ranked = rank_roster(&roster, today());
        assert_eq!(ranked.len(), with_history.len() - 1);
        assert!(ranked.iter().all(|r| r.patient != "Kiara Patel"));
    }

    #[test]
    fn ranking_is_descending_by_score() {
        let roster = vec![
            patient("Avery Lee", vec![record(1, AppointmentStatus::Completed)]),
            patient("Jules Moreno", lapsed_history()),
            patient(
                "Kiara Patel",
                vec![
                    record(40, AppointmentStatus::Completed),
                    record(50, AppointmentStatus::Canceled),
                ],
            ),
        ];

        let ranked = rank_roster(&roster, today());
        let names: Vec<&str> = ranked.iter().map(|r| r.patient.as_str()).collect();
        assert_eq!(names, vec!["Jules Moreno", "Kiara Patel", "Avery Lee"]);
        assert!(ranked
            .windows(2)
            .all(|pair| pair[0].risk_score >= pair[1].risk_score));
    }

    #[test]
    fn ties_keep_roster_order_across_runs() {
        let roster: Vec<PatientHistory> = ["Bea", "Ari", "Cy", "Dov"]
            .iter()
            .map(|name| patient(name, vec![record(5, AppointmentStatus::Completed)]))
            .collect();

        let first = rank_roster(&roster, today());
        let second = rank_roster(&roster, today());
        let order =
            |results: &[RiskResult]| -> Vec<Uuid> { results.iter().map(|r| r.id).collect() };

        let expected: Vec<Uuid> = roster.iter().map(|p| p.patient_id).collect();
        assert_eq!(order(&first), expected);
        assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn filter_keeps_ranked_order_and_applies_tier_and_limit() {
        let roster = vec![
            patient("Avery Lee", vec![record(1, AppointmentStatus::Completed)]),
            patient("Jules Moreno", lapsed_history()),
            patient(
                "Kiara Patel",
                vec![
                    record(40, AppointmentStatus::Completed),
                    record(50, AppointmentStatus::Canceled),
                ],
            ),
        ];
        let ranked = rank_roster(&roster, today());

        let high = filter_ranked(ranked.clone(), Some(RiskLevel::High), 10);
        let names: Vec<&str> = high.iter().map(|r| r.patient.as_str()).collect();
        assert_eq!(names, vec!["Jules Moreno", "Kiara Patel"]);

        let top = filter_ranked(ranked.clone(), None, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].patient, "Jules Moreno");

        assert!(filter_ranked(ranked.clone(), None, 0).is_empty());
        assert_eq!(filter_ranked(ranked, Some(RiskLevel::Low), 10).len(), 3);
    }
}
