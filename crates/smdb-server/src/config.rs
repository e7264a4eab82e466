use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use smdb_api::auth::ApiSettings;
use smdb_types::models::ReviewPolicy;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const RECOMPUTE_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub base_url: String,
    pub review_policy: ReviewPolicy,
    pub require_reviewer_role: bool,
    pub recompute_attempts: u32,
    pub repair_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("SMDB_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SMDB_JWT_SECRET is unset or still a placeholder; it must match the identity provider's secret");
        }

        let port = match var("SMDB_PORT") {
            Some(v) => v.parse().with_context(|| format!("Invalid SMDB_PORT '{}'", v))?,
            None => 3000,
        };
        let review_policy = match var("SMDB_REVIEW_POLICY") {
            Some(v) => v.parse::<ReviewPolicy>().map_err(anyhow::Error::msg)?,
            None => ReviewPolicy::default(),
        };
        let require_reviewer_role = match var("SMDB_REQUIRE_REVIEWER_ROLE") {
            Some(v) => parse_flag(&v).with_context(|| format!("Invalid SMDB_REQUIRE_REVIEWER_ROLE '{}'", v))?,
            None => false,
        };
        let recompute_attempts = var("SMDB_RECOMPUTE_ATTEMPTS")
            .and_then(|v| v.parse().ok())
            .filter(|n: &u32| *n > 0)
            .unwrap_or(3);
        let repair_interval_secs = var("SMDB_REPAIR_INTERVAL_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|n: &u64| *n > 0)
            .unwrap_or(60);

        Ok(Self {
            host: var("SMDB_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("SMDB_DB_PATH").unwrap_or_else(|| "smdb.db".into()).into(),
            jwt_secret,
            base_url: var("SMDB_BASE_URL").unwrap_or_else(|| "http://localhost:3000".into()),
            review_policy,
            require_reviewer_role,
            recompute_attempts,
            repair_interval_secs,
        })
    }

    pub fn api_settings(&self) -> ApiSettings {
        let mut settings = ApiSettings::new(self.jwt_secret.clone(), self.base_url.clone());
        settings.review_policy = self.review_policy;
        settings.require_reviewer_role = self.require_reviewer_role;
        settings.recompute_attempts = self.recompute_attempts;
        settings.recompute_backoff = RECOMPUTE_BACKOFF;
        settings
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected true or false"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_with_only_a_secret() {
        let config = load(&[("SMDB_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("smdb.db"));
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.review_policy, ReviewPolicy::OnePerUser);
        assert!(!config.require_reviewer_role);
        assert_eq!(config.recompute_attempts, 3);
        assert_eq!(config.repair_interval_secs, 60);
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(load(&[]).is_err());
        assert!(load(&[("SMDB_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("SMDB_JWT_SECRET", "a-real-secret"),
            ("SMDB_PORT", "8080"),
            ("SMDB_REVIEW_POLICY", "allow_multiple"),
            ("SMDB_REQUIRE_REVIEWER_ROLE", "true"),
            ("SMDB_RECOMPUTE_ATTEMPTS", "5"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.review_policy, ReviewPolicy::AllowMultiple);
        assert!(config.require_reviewer_role);

        let settings = config.api_settings();
        assert_eq!(settings.recompute_attempts, 5);
        assert!(settings.require_reviewer_role);
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(load(&[("SMDB_JWT_SECRET", "s"), ("SMDB_PORT", "http")]).is_err());
        assert!(load(&[("SMDB_JWT_SECRET", "s"), ("SMDB_REVIEW_POLICY", "many")]).is_err());
        assert!(load(&[("SMDB_JWT_SECRET", "s"), ("SMDB_REQUIRE_REVIEWER_ROLE", "maybe")]).is_err());
    }
}
