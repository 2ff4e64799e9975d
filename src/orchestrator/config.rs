//! Pipeline configuration, from code or environment.
//!
//! Everything has a sensible default. A builder override wins over the
//! environment; the environment wins over the default. `.env` files are
//! honored via dotenvy, matching how the rest of the deployment reads its
//! settings.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::router::DEFAULT_ROUTE_THRESHOLD;

pub const EXPERT_TIMEOUT_KEY: &str = "SWITCHBOARD_EXPERT_TIMEOUT_SECS";
pub const MAX_HISTORY_TURNS_KEY: &str = "SWITCHBOARD_MAX_HISTORY_TURNS";
pub const ROUTE_THRESHOLD_KEY: &str = "SWITCHBOARD_ROUTE_THRESHOLD";

const DEFAULT_EXPERT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_HISTORY_TURNS: usize = 12;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    #[diagnostic(
        code(switchboard::config::env_parse),
        help("Fix the variable or unset it to fall back to the default.")
    )]
    EnvParse { key: String, message: String },
}

/// Knobs the pipeline honors at runtime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    /// How long one expert may spend on a turn. A timeout counts as a
    /// failure and triggers fallback like any other.
    pub expert_timeout: Duration,
    /// How many prior exchanges (user plus assistant pairs) are carried
    /// into expert prompts.
    pub max_history_turns: usize,
    /// Routing threshold below which the router declines to pick an expert.
    pub route_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            expert_timeout: DEFAULT_EXPERT_TIMEOUT,
            max_history_turns: DEFAULT_MAX_HISTORY_TURNS,
            route_threshold: DEFAULT_ROUTE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Defaults overlaid with whatever the environment (or a `.env` file)
    /// provides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().build()
    }
}

#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    expert_timeout: Option<Duration>,
    max_history_turns: Option<usize>,
    route_threshold: Option<f32>,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn expert_timeout(mut self, timeout: Duration) -> Self {
        self.expert_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn max_history_turns(mut self, turns: usize) -> Self {
        self.max_history_turns = Some(turns);
        self
    }

    #[must_use]
    pub fn route_threshold(mut self, threshold: f32) -> Self {
        self.route_threshold = Some(threshold);
        self
    }

    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        dotenvy::dotenv().ok();

        let expert_timeout = match self.expert_timeout {
            Some(timeout) => timeout,
            None => parse_env::<u64>(EXPERT_TIMEOUT_KEY)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_EXPERT_TIMEOUT),
        };
        let max_history_turns = match self.max_history_turns {
            Some(turns) => turns,
            None => parse_env(MAX_HISTORY_TURNS_KEY)?.unwrap_or(DEFAULT_MAX_HISTORY_TURNS),
        };
        let route_threshold = match self.route_threshold {
            Some(threshold) => threshold,
            None => parse_env(ROUTE_THRESHOLD_KEY)?.unwrap_or(DEFAULT_ROUTE_THRESHOLD),
        };
        if !(0.0..=1.0).contains(&route_threshold) {
            return Err(ConfigError::EnvParse {
                key: ROUTE_THRESHOLD_KEY.to_string(),
                message: format!("must be within [0.0, 1.0], got {route_threshold}"),
            });
        }

        Ok(PipelineConfig {
            expert_timeout,
            max_history_turns,
            route_threshold,
        })
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|err| {
            ConfigError::EnvParse {
                key: key.to_string(),
                message: format!("{err} (value {raw:?})"),
            }
        }),
        Err(_) => Ok(None),
    }
}
