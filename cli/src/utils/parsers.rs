use ballot_registry::{parse_base58_32, Identity};
use std::str::FromStr;

pub fn parse_identity(s: &str) -> Result<Identity, String> {
    Identity::from_str(s).map_err(|e| format!("invalid identity: {e}"))
}

pub fn parse_base_58_32(s: &str) -> Result<[u8; 32], String> {
    parse_base58_32(s).map_err(|e| format!("Invalid digest: {}", e))
}
