use anyhow::{bail, Context};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub const DEFAULT_LOG_FILTER: &str = "patient_risk_radar=info";

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .context("DATABASE_URL must be set to the clinic Postgres instance")?;

        let max_connections = match lookup("RISK_DB_MAX_CONNECTIONS") {
            Some(raw) => {
                let value: u32 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("RISK_DB_MAX_CONNECTIONS is not a number: {raw}"))?;
                if value == 0 {
                    bail!("RISK_DB_MAX_CONNECTIONS must be at least 1");
                }
                value
            }
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_pool_size() {
        let settings = settings(&[("DATABASE_URL", "postgres://localhost/clinic")]).unwrap();
        assert_eq!(settings.database_url, "postgres://localhost/clinic");
        assert_eq!(settings.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn reads_pool_size_override() {
        let settings = settings(&[
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("RISK_DB_MAX_CONNECTIONS", "12"),
        ])
        .unwrap();
        assert_eq!(settings.max_connections, 12);
    }

    #[test]
    fn requires_database_url() {
        assert!(settings(&[]).is_err());
        assert!(settings(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn rejects_invalid_pool_size() {
        for raw in ["zero", "0", "-3"] {
            let result = settings(&[
                ("DATABASE_URL", "postgres://localhost/clinic"),
                ("RISK_DB_MAX_CONNECTIONS", raw),
            ]);
            assert!(result.is_err(), "{raw}");
        }
    }
}
