use std::{env, path::PathBuf};

use anyhow::Context;
use chrono::NaiveDate;

use crate::clock::OffsetClock;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub data_file: PathBuf,
    /// When set, "today" is pinned to this date.
    pub simulation_date: Option<NaiveDate>,
    pub utc_offset_minutes: i32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string());
        let data_file = env::var("DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("appointments.json"));

        let simulation_date = match env::var("SIMULATION_DATE").ok().filter(|s| !s.trim().is_empty()) {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .with_context(|| format!("SIMULATION_DATE must be YYYY-MM-DD, got {raw:?}"))?,
            ),
            None => None,
        };

        let utc_offset_minutes = match env::var("UTC_OFFSET_MINUTES").ok() {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .with_context(|| format!("UTC_OFFSET_MINUTES must be an integer, got {raw:?}"))?,
            None => OffsetClock::DEFAULT_OFFSET_MINUTES,
        };
        if OffsetClock::from_minutes(utc_offset_minutes).is_none() {
            anyhow::bail!("UTC_OFFSET_MINUTES out of range: {utc_offset_minutes}");
        }

        Ok(Self {
            bind_addr,
            data_file,
            simulation_date,
            utc_offset_minutes,
        })
    }
}
