use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub generation_horizon_days: u32,
    pub generation_horizon_max_days: u32,
    pub no_show_grace_minutes: i64,
    pub auto_confirm_age_minutes: i64,
    pub slot_retention_days: i64,
    pub reminder_retention_days: i64,
    pub queue_retention_days: i64,
    pub scheduler_disabled: bool,
    pub notification_url: String,
    pub notification_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            generation_horizon_days: parse_var("GENERATION_HORIZON_DAYS", 7),
            generation_horizon_max_days: parse_var("GENERATION_HORIZON_MAX_DAYS", 90),
            no_show_grace_minutes: parse_var("NO_SHOW_GRACE_MINUTES", 30),
            auto_confirm_age_minutes: parse_var("AUTO_CONFIRM_AGE_MINUTES", 30),
            slot_retention_days: parse_var("SLOT_RETENTION_DAYS", 90),
            reminder_retention_days: parse_var("REMINDER_RETENTION_DAYS", 90),
            queue_retention_days: parse_var("QUEUE_RETENTION_DAYS", 30),
            scheduler_disabled: env::var("DISABLE_APPOINTMENT_SCHEDULER")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            notification_url: env::var("NOTIFICATION_URL")
                .unwrap_or_else(|_| {
                    warn!("NOTIFICATION_URL not set, using empty value");
                    String::new()
                }),
            notification_timeout_secs: parse_var("NOTIFICATION_TIMEOUT_SECS", 10),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.notification_url.is_empty()
    }
}

fn parse_var<T: std::str::FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generation_horizon_days: 7,
            generation_horizon_max_days: 90,
            no_show_grace_minutes: 30,
            auto_confirm_age_minutes: 30,
            slot_retention_days: 90,
            reminder_retention_days: 90,
            queue_retention_days: 30,
            scheduler_disabled: false,
            notification_url: String::new(),
            notification_timeout_secs: 10,
        }
    }
}
