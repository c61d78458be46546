use std::num::ParseIntError;
use std::time::Duration;

use appleid::{APPLE_KEYS_ENDPOINT, VerifyOptions};

const DEFAULT_PORT: u16 = 8080;

/// Error for [`Config::from_env`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("failed to parse {key}: {source}")]
    Invalid {
        key: &'static str,
        #[source]
        source: ParseIntError,
    },
}

/// Settings of the sign in service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Services or bundle id tokens must be issued for.
    pub client_id: String,

    /// Tolerance for token expiry, not-before and issued-at.
    pub token_expiry_leeway: Duration,

    /// How long a verified identity is cached, at most.
    pub token_time_to_live: Option<Duration>,

    /// Upper bound for fetching Apple's keys.
    pub key_fetch_timeout: Option<Duration>,

    pub port: u16,

    /// Where Apple's keys are fetched from. Must be https unless it points
    /// at a loopback host.
    pub keys_endpoint: String,
}

impl Config {
    /// Reads the config from the environment.
    ///
    /// # Errors
    /// - `APPLE_CLIENT_ID` is not set
    /// - a numeric variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let seconds = |key: &'static str| -> Result<Option<Duration>, ConfigError> {
            lookup(key)
                .map(|value| value.trim().parse::<u64>())
                .transpose()
                .map(|secs| secs.map(Duration::from_secs))
                .map_err(|source| ConfigError::Invalid { key, source })
        };

        let client_id = lookup("APPLE_CLIENT_ID")
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing("APPLE_CLIENT_ID"))?;

        let port = lookup("PORT")
            .map(|value| value.trim().parse::<u16>())
            .transpose()
            .map_err(|source| ConfigError::Invalid { key: "PORT", source })?
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            client_id,
            token_expiry_leeway: seconds("TOKEN_EXPIRY_LEEWAY_SECS")?.unwrap_or_default(),
            token_time_to_live: seconds("TOKEN_TIME_TO_LIVE_SECS")?,
            key_fetch_timeout: seconds("KEY_FETCH_TIMEOUT_SECS")?,
            port,
            keys_endpoint: lookup("APPLE_KEYS_ENDPOINT")
                .unwrap_or_else(|| APPLE_KEYS_ENDPOINT.to_string()),
        })
    }

    /// The options tokens are verified with.
    #[must_use]
    pub fn verify_options(&self) -> VerifyOptions {
        let options =
            VerifyOptions::new(self.client_id.clone()).with_leeway(self.token_expiry_leeway);
        match self.key_fetch_timeout {
            Some(timeout) => options.with_timeout(timeout),
            None => options,
        }
    }
}
