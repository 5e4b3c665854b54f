use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::ErrorCode, require, Ballot, Identity, Result};

/// Who may create ballots and mutate their root or lifecycle.
///
/// The registry takes no position on this by default: `Open` leaves
/// `create_ballot`, `update_merkle_root` and `close_ballot` callable by any
/// signer. Deployments that need a restriction choose one explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "authority")]
pub enum MutationPolicy {
    #[default]
    Open,
    /// A single identity owns every administrative operation.
    Authority(Identity),
    /// Anyone may create; only the ballot's creator may update or close it.
    Creator,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub policy: MutationPolicy,
    /// ID handed to the first ballot. Every later ballot counts up from it.
    #[serde(default)]
    pub first_ballot_id: u64,
}

impl ProgramConfig {
    pub fn new(policy: MutationPolicy) -> Self {
        Self {
            policy,
            first_ballot_id: 0,
        }
    }

    pub fn with_first_ballot_id(mut self, first_ballot_id: u64) -> Self {
        self.first_ballot_id = first_ballot_id;
        self
    }

    pub fn check_create(&self, signer: &Identity) -> Result<()> {
        if let MutationPolicy::Authority(authority) = &self.policy {
            require!(authority == signer, ErrorCode::Unauthorized);
        }
        Ok(())
    }

    pub fn check_mutation(&self, signer: &Identity, ballot: &Ballot) -> Result<()> {
        match &self.policy {
            MutationPolicy::Open => {}
            MutationPolicy::Authority(authority) => {
                require!(authority == signer, ErrorCode::Unauthorized)
            }
            MutationPolicy::Creator => require!(&ballot.creator == signer, ErrorCode::Unauthorized),
        }
        Ok(())
    }
}

impl fmt::Display for MutationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationPolicy::Open => f.write_str("open"),
            MutationPolicy::Authority(authority) => write!(f, "authority:{}", authority),
            MutationPolicy::Creator => f.write_str("creator"),
        }
    }
}

impl FromStr for MutationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => return Ok(MutationPolicy::Open),
            "creator" => return Ok(MutationPolicy::Creator),
            _ => {}
        }
        // Keys are case-sensitive, so split the original string.
        match s.trim().split_once(':') {
            Some((kind, key)) if kind.eq_ignore_ascii_case("authority") => key
                .parse::<Identity>()
                .map(MutationPolicy::Authority)
                .map_err(|e| format!("invalid authority key: {e}")),
            _ => Err(format!("invalid mutation policy: {}", s)),
        }
    }
}
