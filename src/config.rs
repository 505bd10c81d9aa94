use std::env;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    /// Platform commission charged on loads posted with XBow support.
    pub xbow_commission_percent: f64,
    /// How far in the past a bidding session's start time may lie.
    pub session_start_grace_secs: i64,
    pub admin_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            xbow_commission_percent: 5.0,
            session_start_grace_secs: 60,
            admin_token: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let log_format = match env::var("LOG_FORMAT") {
            Ok(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            Ok(raw) if raw.eq_ignore_ascii_case("compact") => LogFormat::Compact,
            Ok(raw) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {raw} (expected compact or json)"
                )));
            }
            Err(_) => defaults.log_format,
        };

        let xbow_commission_percent =
            parse_or_default("XBOW_COMMISSION_PERCENT", defaults.xbow_commission_percent)?;
        if !(0.0..=100.0).contains(&xbow_commission_percent) {
            return Err(AppError::Internal(format!(
                "invalid XBOW_COMMISSION_PERCENT: {xbow_commission_percent} is outside 0..=100"
            )));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            xbow_commission_percent,
            session_start_grace_secs: parse_or_default(
                "SESSION_START_GRACE_SECS",
                defaults.session_start_grace_secs,
            )?,
            admin_token: env::var("ADMIN_TOKEN").ok().filter(|t| !t.trim().is_empty()),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
