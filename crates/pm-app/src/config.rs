use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use pm_core::PollPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub api: ModelApiConfig,
    pub policy: PollPolicy,
}

#[derive(Debug, Clone)]
pub struct ModelApiConfig {
    /// `None` runs every job in demo mode.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub daily_limit: u32,
    pub min_interval: Duration,
}

impl AppConfig {
    /// Read `.env` if present, then the process environment.
    pub fn load() -> anyhow::Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("failed to read .env"),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let defaults = PollPolicy::default();
        let max_attempts: u32 = parse(
            &var,
            "MODEL_POLL_MAX_ATTEMPTS",
            defaults.max_attempts.unwrap_or(0),
        )?;

        let policy = PollPolicy {
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            demo_duration: millis(&var, "MODEL_DEMO_DURATION_MS", defaults.demo_duration)?,
            fallback_duration: millis(
                &var,
                "MODEL_FALLBACK_DURATION_MS",
                defaults.fallback_duration,
            )?,
            fallback_url: var("MODEL_FALLBACK_URL").unwrap_or(defaults.fallback_url.clone()),
            ..defaults
        };

        let api = ModelApiConfig {
            base_url: var("MODEL_API_URL"),
            api_key: var("MODEL_API_KEY"),
            daily_limit: parse(&var, "MODEL_API_DAILY_LIMIT", 500)?,
            min_interval: millis(&var, "MODEL_API_MIN_INTERVAL_MS", Duration::from_millis(1000))?,
        };

        Ok(Self {
            port: parse(&var, "PORT", 5000)?,
            api,
            policy,
        })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

fn millis(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> anyhow::Result<Duration> {
    let ms = parse(var, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}
