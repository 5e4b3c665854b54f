//! Service configuration read from the environment

use std::time::Duration;

use anyhow::{anyhow, Result};
use ballot_registry::{Identity, MutationPolicy, ProgramConfig};

use crate::database::constants::DEFAULT_DB_PATH;
use crate::sync::RetryPolicy;
use crate::utils::{env_millis, env_opt, env_parse};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub db_path: String,
    pub port: u16,
    /// Bearer token required on mutating routes. `None` leaves them open.
    pub operator_token: Option<String>,
    /// Identity the service signs ledger calls with.
    pub operator_identity: Identity,
    pub mutation_policy: MutationPolicy,
    pub retry: RetryPolicy,
    /// How long a whitelist request waits for its root to be confirmed.
    pub sync_wait: Duration,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            port: 3000,
            operator_token: None,
            operator_identity: Identity::default(),
            mutation_policy: MutationPolicy::Open,
            retry: RetryPolicy::default(),
            sync_wait: Duration::from_millis(2000),
            rate_limit_per_second: 10,
            rate_limit_burst: 20,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        // Identities and policies are rejected rather than silently defaulted.
        let operator_identity = match env_opt("OPERATOR_IDENTITY") {
            Some(s) => s
                .parse::<Identity>()
                .map_err(|e| anyhow!("invalid OPERATOR_IDENTITY: {}", e))?,
            None => defaults.operator_identity,
        };
        let mutation_policy = match env_opt("MUTATION_POLICY") {
            Some(s) => s
                .parse::<MutationPolicy>()
                .map_err(|e| anyhow!("invalid MUTATION_POLICY: {}", e))?,
            None => defaults.mutation_policy,
        };

        let retry = RetryPolicy {
            max_attempts: env_parse("PUSH_MAX_ATTEMPTS", defaults.retry.max_attempts).max(1),
            initial_backoff: env_millis(
                "PUSH_INITIAL_BACKOFF_MS",
                defaults.retry.initial_backoff.as_millis() as u64,
            ),
            max_backoff: env_millis(
                "PUSH_MAX_BACKOFF_MS",
                defaults.retry.max_backoff.as_millis() as u64,
            ),
        };

        Ok(Self {
            db_path: env_opt("DB_PATH").unwrap_or(defaults.db_path),
            port: env_parse("PORT", defaults.port),
            operator_token: env_opt("OPERATOR_TOKEN"),
            operator_identity,
            mutation_policy,
            retry,
            sync_wait: env_millis("SYNC_WAIT_MS", defaults.sync_wait.as_millis() as u64),
            rate_limit_per_second: env_parse("RATE_LIMIT_PER_SECOND", defaults.rate_limit_per_second)
                .max(1),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", defaults.rate_limit_burst).max(1),
        })
    }

    pub fn program_config(&self) -> ProgramConfig {
        ProgramConfig::new(self.mutation_policy)
    }
}
