//! Startup configuration: command-line flags plus the environment.
//!
//! ## Environment
//!
//! - `SECRET_KEY` (required): signs session cookies
//! - `ADMIN_EMAIL`, `ADMIN_PASSWORD` (required): bootstrap admin account
//! - `SCHOOL_NAME`: report header (default "LICEO PREUNIVERSITARIO SANTINY")
//! - `SCHOOL_YEAR`: cohort year printed on reports and used in file names (default 2026)
//! - `REPORT_LOGO`: JPEG drawn on top of every report
//! - `SESSION_TTL_SECS`: session lifetime (default 12 hours)

use clap::Parser;
use std::path::PathBuf;

use crate::report::{ReportSettings, DEFAULT_SCHOOL_NAME, DEFAULT_SCHOOL_YEAR};

pub const DEFAULT_SESSION_TTL_SECS: u64 = 12 * 60 * 60;

#[derive(Debug, Parser)]
#[command(name = "gradebookd", version, about = "School grade-management server")]
pub struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Holds the database, generated reports and export archives.
    #[arg(long, default_value = "instance")]
    pub data_dir: PathBuf,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub secret_key: String,
    pub admin_email: String,
    pub admin_password: String,
    pub session_ttl_secs: u64,
    pub report: ReportSettings,
}

impl Config {
    pub fn from_env(data_dir: PathBuf) -> Result<Self, ConfigError> {
        Self::from_lookup(data_dir, |k| std::env::var(k).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(data_dir: PathBuf, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let secret_key = required("SECRET_KEY")?;
        let admin_email = required("ADMIN_EMAIL")?;
        let admin_password = required("ADMIN_PASSWORD")?;

        let school_year = match get("SCHOOL_YEAR") {
            Some(v) => v.trim().parse::<i32>().map_err(|_| ConfigError::Invalid {
                name: "SCHOOL_YEAR",
                value: v.clone(),
            })?,
            None => DEFAULT_SCHOOL_YEAR,
        };
        let session_ttl_secs = match get("SESSION_TTL_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    name: "SESSION_TTL_SECS",
                    value: v.clone(),
                })?,
            None => DEFAULT_SESSION_TTL_SECS,
        };

        Ok(Self {
            data_dir,
            secret_key,
            admin_email,
            admin_password,
            session_ttl_secs,
            report: ReportSettings {
                school_name: get("SCHOOL_NAME").unwrap_or_else(|| DEFAULT_SCHOOL_NAME.to_string()),
                school_year,
                logo: get("REPORT_LOGO").map(PathBuf::from),
            },
        })
    }

    pub fn pdf_dir(&self) -> PathBuf {
        self.data_dir.join("pdfs")
    }

    pub fn zip_dir(&self) -> PathBuf {
        self.data_dir.join("zip_temp")
    }
}
