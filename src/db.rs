use std::collections::HashMap;

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use sqlx::{PgConnection, PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{AppointmentRecord, AppointmentStatus, PatientHistory, Psychologist};
use crate::risk;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_psychologist(
    conn: &mut PgConnection,
    full_name: &str,
    email: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO risk_radar.psychologists (id, full_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    Ok(id)
}

async fn upsert_patient(
    conn: &mut PgConnection,
    psychologist_id: Uuid,
    full_name: &str,
    email: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO risk_radar.patients (id, psychologist_id, full_name, email)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (psychologist_id, email) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(psychologist_id)
    .bind(full_name)
    .bind(email)
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    Ok(id)
}

async fn insert_appointment(
    conn: &mut PgConnection,
    patient_id: Uuid,
    psychologist_id: Uuid,
    date: NaiveDate,
    status: AppointmentStatus,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO risk_radar.appointments
        (id, patient_id, psychologist_id, appointment_date, status, source_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(patient_id)
    .bind(psychologist_id)
    .bind(date)
    .bind(status.as_str())
    .bind(source_key)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    let psychologist_id =
        upsert_psychologist(&mut tx, "Dr. Helena Prado", "helena.prado@clinic.example").await?;

    let patients = [
        ("Avery Lee", "avery.lee@example.com"),
        ("Jules Moreno", "jules.moreno@example.com"),
        ("Kiara Patel", "kiara.patel@example.com"),
        ("Noor Haddad", "noor.haddad@example.com"),
    ];

    let mut patient_ids = HashMap::new();
    for (name, email) in patients {
        let id = upsert_patient(&mut tx, psychologist_id, name, email).await?;
        patient_ids.insert(email, id);
    }

    use AppointmentStatus::*;
    // (seed key, patient email, days ago, status); Noor has no history yet.
    let appointments = [
        ("seed-001", "avery.lee@example.com", 2, Completed),
        ("seed-002", "avery.lee@example.com", 9, Completed),
        ("seed-003", "avery.lee@example.com", 16, Completed),
        ("seed-004", "avery.lee@example.com", 23, Completed),
        ("seed-005", "avery.lee@example.com", -5, Scheduled),
        ("seed-006", "jules.moreno@example.com", 75, Completed),
        ("seed-007", "jules.moreno@example.com", 82, Canceled),
        ("seed-008", "jules.moreno@example.com", 96, Canceled),
        ("seed-009", "jules.moreno@example.com", 110, Completed),
        ("seed-010", "kiara.patel@example.com", 20, Completed),
        ("seed-011", "kiara.patel@example.com", 34, Completed),
        ("seed-012", "kiara.patel@example.com", 41, Completed),
        ("seed-013", "kiara.patel@example.com", 48, Canceled),
        ("seed-014", "kiara.patel@example.com", 55, Rescheduled),
    ];

    let today = risk::today();
    for (source_key, email, days_ago, status) in appointments {
        let patient_id = *patient_ids
            .get(email)
            .with_context(|| format!("seed patient {email} missing"))?;
        insert_appointment(
            &mut tx,
            patient_id,
            psychologist_id,
            today - Duration::days(days_ago),
            status,
            source_key,
        )
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn find_psychologist(pool: &PgPool, email: &str) -> anyhow::Result<Option<Psychologist>> {
    let row = sqlx::query(
        "SELECT id, full_name, email FROM risk_radar.psychologists WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Psychologist {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
    }))
}

/// Load every patient of a psychologist together with their appointments with that psychologist.
///
/// Patients are ordered by name, then id. Patients without appointments are
/// returned with an empty history.
pub async fn load_roster(
    pool: &PgPool,
    psychologist_id: Uuid,
) -> anyhow::Result<Vec<PatientHistory>> {
    let patient_rows = sqlx::query(
        r#"
        SELECT id, full_name
        FROM risk_radar.patients
        WHERE psychologist_id = $1
        ORDER BY full_name, id
        "#,
    )
    .bind(psychologist_id)
    .fetch_all(pool)
    .await?;

    let appointment_rows = sqlx::query(
        r#"
        SELECT patient_id, appointment_date, status
        FROM risk_radar.appointments
        WHERE psychologist_id = $1
        ORDER BY appointment_date DESC
        "#,
    )
    .bind(psychologist_id)
    .fetch_all(pool)
    .await?;

    let mut by_patient: HashMap<Uuid, Vec<AppointmentRecord>> = HashMap::new();
    for row in appointment_rows {
        let patient_id: Uuid = row.get("patient_id");
        let raw_status: Option<String> = row.get("status");
        by_patient.entry(patient_id).or_default().push(AppointmentRecord {
            date: row.get("appointment_date"),
            status: raw_status.as_deref().and_then(|raw| parse_stored_status(patient_id, raw)),
        });
    }

    let roster: Vec<PatientHistory> = patient_rows
        .into_iter()
        .map(|row| {
            let patient_id: Uuid = row.get("id");
            PatientHistory {
                patient_id,
                patient_name: row.get("full_name"),
                appointments: by_patient.remove(&patient_id).unwrap_or_default(),
            }
        })
        .collect();

    info!(
        %psychologist_id,
        patients = roster.len(),
        "loaded roster history"
    );
    Ok(roster)
}

fn parse_stored_status(patient_id: Uuid, raw: &str) -> Option<AppointmentStatus> {
    match raw.parse() {
        Ok(status) => Some(status),
        Err(err) => {
            warn!(%patient_id, error = %err, "ignoring appointment status");
            None
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ImportRow {
    psychologist_email: String,
    psychologist_name: String,
    patient_email: String,
    patient_name: String,
    date: NaiveDate,
    status: String,
    source_key: Option<String>,
}

/// Key for rows imported without a `source_key`, stable across re-imports of the same file.
fn fallback_source_key(
    psychologist_email: &str,
    patient_email: &str,
    date: NaiveDate,
    status: AppointmentStatus,
) -> String {
    format!(
        "import-{}-{}-{}-{}",
        psychologist_email.trim().to_ascii_lowercase(),
        patient_email.trim().to_ascii_lowercase(),
        date,
        status
    )
}

fn read_import_rows<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
) -> anyhow::Result<Vec<(ImportRow, AppointmentStatus, String)>> {
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<ImportRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("invalid CSV row at line {line}"))?;
        let status: AppointmentStatus = row
            .status
            .parse()
            .with_context(|| format!("line {line}"))?;

        let source_key = match row.source_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => fallback_source_key(&row.psychologist_email, &row.patient_email, row.date, status),
        };
        rows.push((row, status, source_key));
    }

    Ok(rows)
}

/// Import appointment history from CSV. The file is validated in full before
/// anything is written, and all rows are committed in one transaction.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_import_rows(&mut reader)?;

    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for (row, status, source_key) in rows {
        let psychologist_id =
            upsert_psychologist(&mut tx, &row.psychologist_name, &row.psychologist_email).await?;
        let patient_id =
            upsert_patient(&mut tx, psychologist_id, &row.patient_name, &row.patient_email)
                .await?;

        if insert_appointment(&mut tx, patient_id, psychologist_id, row.date, status, &source_key)
            .await?
        {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}
