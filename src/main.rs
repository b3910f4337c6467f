use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod metrics;
mod models;
mod report;
mod risk;
mod roster;

use models::{Psychologist, RiskLevel, RiskResult};

#[derive(Parser)]
#[command(name = "patient-risk-radar")]
#[command(about = "Disengagement risk ranking for a psychologist's patient roster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import appointment history from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Rank a psychologist's patients by risk
    Score {
        /// Psychologist email
        #[arg(long)]
        psychologist: String,
        /// Score as of this date instead of today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Only show patients at or above this tier
        #[arg(long)]
        min_risk: Option<RiskLevel>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        /// Psychologist email
        #[arg(long)]
        psychologist: String,
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long, default_value = "risk-report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

async fn ranked_roster(
    pool: &PgPool,
    email: &str,
    today: NaiveDate,
) -> anyhow::Result<(Psychologist, Vec<RiskResult>)> {
    let psychologist = db::find_psychologist(pool, email)
        .await?
        .with_context(|| format!("no psychologist registered with email {email}"))?;
    let histories = db::load_roster(pool, psychologist.id).await?;
    let results = roster::rank_roster(&histories, today);
    Ok((psychologist, results))
}

fn no_results_message(psychologist: &str, ranked: usize, min_risk: Option<RiskLevel>) -> String {
    if ranked == 0 {
        return format!("No patients with appointment history for {psychologist}.");
    }
    match min_risk {
        Some(level) => {
            format!("{ranked} patients ranked for {psychologist}, none at {level} risk or above.")
        }
        None => format!("{ranked} patients ranked for {psychologist}, none within the limit."),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = config::Settings::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} appointments from {}.", csv.display());
        }
        Commands::Score {
            psychologist,
            today,
            limit,
            min_risk,
            json,
        } => {
            let today = today.unwrap_or_else(risk::today);
            let (psychologist, ranked) = ranked_roster(&pool, &psychologist, today).await?;
            let ranked_count = ranked.len();
            let results = roster::filter_ranked(ranked, min_risk, limit);

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }

            if results.is_empty() {
                println!(
                    "{}",
                    no_results_message(&psychologist.full_name, ranked_count, min_risk)
                );
                return Ok(());
            }

            println!(
                "Patients of {} ({}) by risk as of {today}:",
                psychologist.full_name, psychologist.email
            );
            for result in results.iter() {
                println!(
                    "- {} [{}] score {}: {}",
                    result.patient, result.risk, result.risk_score, result.reason
                );
            }
        }
        Commands::Report {
            psychologist,
            today,
            out,
            limit,
        } => {
            let today = today.unwrap_or_else(risk::today);
            let (psychologist, results) = ranked_roster(&pool, &psychologist, today).await?;
            let report = report::build_report(&psychologist.full_name, today, &results, limit);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roster_message_mentions_missing_history() {
        let message = no_results_message("Dr. Helena Prado", 0, Some(RiskLevel::High));
        assert_eq!(message, "No patients with appointment history for Dr. Helena Prado.");
    }

    #[test]
    fn filtered_out_roster_message_mentions_the_filter() {
        let message = no_results_message("Dr. Helena Prado", 3, Some(RiskLevel::High));
        assert_eq!(message, "3 patients ranked for Dr. Helena Prado, none at HIGH risk or above.");
        assert!(!message.contains("appointment history"));

        let message = no_results_message("Dr. Helena Prado", 3, None);
        assert_eq!(message, "3 patients ranked for Dr. Helena Prado, none within the limit.");
    }
}
