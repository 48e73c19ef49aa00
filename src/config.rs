use std::{env, str::FromStr, time::Duration};

use chrono_tz::Tz;

use crate::{
    errors::{AppError, AppResult},
    lesson::DecoderConfig,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub school: String,
    pub bind_addr: String,
    pub timezone: Tz,
    pub request_timeout: Duration,
    pub decoder: DecoderConfig,
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|_| AppError::InvalidConfig(format!("{} has an invalid value {:?}", name, v))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Reads the configuration from the environment. Call `dotenv` first to
    /// pick up a `.env` file.
    pub fn from_env() -> AppResult<Self> {
        let base_url =
            env::var("UNTIS_BASE_URL").map_err(|_| AppError::MissingConfig("UNTIS_BASE_URL"))?;
        let school =
            env::var("UNTIS_SCHOOL").map_err(|_| AppError::MissingConfig("UNTIS_SCHOOL"))?;

        let defaults = DecoderConfig::default();
        let decoder = DecoderConfig {
            supervision_id: parse_var("UNTIS_SUPERVISION_ID", defaults.supervision_id)?,
            team_teaching_id: parse_var("UNTIS_TEAM_TEACHING_ID", defaults.team_teaching_id)?,
            unknown_name: env::var("UNTIS_UNKNOWN_NAME").unwrap_or(defaults.unknown_name),
        };

        Ok(Self {
            base_url,
            school,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_owned()),
            timezone: parse_var("UNTIS_TIMEZONE", chrono_tz::Europe::Berlin)?,
            request_timeout: Duration::from_secs(parse_var("UNTIS_REQUEST_TIMEOUT_SECS", 30u64)?),
            decoder,
        })
    }
}
