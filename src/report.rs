use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{RiskLevel, RiskLevelSummary, RiskResult};

/// Count patients per tier, riskiest tier first. Tiers without patients are kept.
pub fn summarize_by_level(results: &[RiskResult]) -> Vec<RiskLevelSummary> {
    [RiskLevel::High, RiskLevel::Moderate, RiskLevel::Low]
        .into_iter()
        .map(|level| {
            let scores: Vec<u32> = results
                .iter()
                .filter(|r| r.risk == level)
                .map(|r| u32::from(r.risk_score))
                .collect();
            let count = scores.len();
            RiskLevelSummary {
                level,
                count,
                avg_score: if count == 0 {
                    0.0
                } else {
                    scores.iter().sum::<u32>() as f64 / count as f64
                },
            }
        })
        .collect()
}

fn format_last(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string())
        .unwrap_or_else(|| "never".to_string())
}

pub fn build_report(
    psychologist: &str,
    today: NaiveDate,
    results: &[RiskResult],
    limit: usize,
) -> String {
    let summaries = summarize_by_level(results);
    let mut output = String::new();

    let _ = writeln!(output, "# Patient Risk Report");
    let _ = writeln!(output, "Generated for {} on {}", psychologist, today);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Tiers");

    if results.is_empty() {
        let _ = writeln!(output, "No patients with appointment history.");
        return output;
    }

    for summary in summaries.iter() {
        let _ = writeln!(
            output,
            "- {}: {} patients (avg score {:.1})",
            summary.level, summary.count, summary.avg_score
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Patients");

    for result in results.iter().take(limit) {
        let _ = writeln!(
            output,
            "- {} [{}] score {}, last appointment {}: {}",
            result.patient,
            result.risk,
            result.risk_score,
            format_last(result.last_appointment),
            result.reason
        );
    }

    let attention: Vec<&RiskResult> = results
        .iter()
        .filter(|r| r.risk == RiskLevel::High && !r.metrics.has_future_appointments)
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");

    if attention.is_empty() {
        let _ = writeln!(output, "No high-risk patients without an upcoming appointment.");
    } else {
        for result in attention {
            let _ = writeln!(
                output,
                "- {} ({} days since last appointment)",
                result.patient, result.metrics.days_since_last
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientMetrics;
    use uuid::Uuid;

    fn result(name: &str, risk: RiskLevel, score: u8, has_future: bool) -> RiskResult {
        RiskResult {
            id: Uuid::new_v4(),
            patient: name.to_string(),
            risk,
            risk_score: score,
            reason: "No upcoming appointments".to_string(),
            last_appointment: NaiveDate::from_ymd_opt(2026, 1, 10),
            metrics: PatientMetrics {
                total_appointments: 3,
                completed_appointments: 2,
                canceled_appointments: 1,
                cancellation_rate: 1.0 / 3.0,
                days_since_last: 64,
                frequency_per_month: 0.8,
                appointments_last_30: 0,
                appointments_last_60: 0,
                appointments_last_90: 3,
                recent_trend: 0,
                has_future_appointments: has_future,
            },
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    #[test]
    fn summary_lists_all_tiers_riskiest_first() {
        let results = vec![
            result("A", RiskLevel::High, 80, false),
            result("B", RiskLevel::High, 71, true),
            result("C", RiskLevel::Low, 10, true),
        ];

        let summaries = summarize_by_level(&results);
        let levels: Vec<RiskLevel> = summaries.iter().map(|s| s.level).collect();
        assert_eq!(levels, vec![RiskLevel::High, RiskLevel::Moderate, RiskLevel::Low]);
        assert_eq!(summaries[0].count, 2);
        assert!((summaries[0].avg_score - 75.5).abs() < 0.001);
        assert_eq!(summaries[1].count, 0);
        assert_eq!(summaries[1].avg_score, 0.0);
    }

    #[test]
    fn report_includes_ranked_patients_and_attention_list() {
        let results = vec![
            result("Jules Moreno", RiskLevel::High, 82, false),
            result("Kiara Patel", RiskLevel::High, 74, true),
            result("Avery Lee", RiskLevel::Low, 15, true),
        ];

        let report = build_report("Dr. Helena Prado", today(), &results, 2);
        assert!(report.contains("Generated for Dr. Helena Prado on 2026-03-15"));
        assert!(report.contains("- HIGH: 2 patients (avg score 78.0)"));
        assert!(report.contains("- Jules Moreno [HIGH] score 82, last appointment 2026-01-10"));
        assert!(report.contains("- Kiara Patel [HIGH] score 74"));
        assert!(!report.contains("- Avery Lee [LOW]"));
        assert!(report.contains("- Jules Moreno (64 days since last appointment)"));
        assert!(!report.contains("- Kiara Patel (64 days"));
    }

    #[test]
    fn empty_roster_report() {
        let report = build_report("Dr. Helena Prado", today(), &[], 10);
        assert!(report.contains("No patients with appointment history."));
        assert!(!report.contains("## Highest Risk Patients"));
    }
}
