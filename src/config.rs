//! Runtime configuration for a swap node.

use std::time::Duration;

use alloy::primitives::Address;
use serde::Deserialize;

/// Top-level configuration, deserialized from the node's config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    pub remote: RemoteConfig,
    pub swap: SwapParameters,
}

/// Remote-ledger connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Deployed swap-protocol contract.
    pub protocol_address: Address,
    /// Per-attempt deadline for RPC submissions (e.g. "45s").
    #[serde(with = "humantime_serde", default = "default_attempt_timeout")]
    pub attempt_timeout: Duration,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Swap-level parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SwapParameters {
    /// Deadline for the whole collection round (e.g. "24h"); past it the
    /// swap expires and only revert is permitted.
    #[serde(with = "humantime_serde", default = "default_swap_deadline")]
    pub deadline: Duration,
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(45)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_swap_deadline() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

impl Default for SwapParameters {
    fn default() -> Self {
        Self {
            deadline: default_swap_deadline(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_humantime_durations() {
        let config: SwapConfig = serde_json::from_str(
            r#"{
                "remote": {
                    "rpc_url": "http://127.0.0.1:8545",
                    "chain_id": 1337,
                    "protocol_address": "0x1111111111111111111111111111111111111111",
                    "attempt_timeout": "30s",
                    "max_attempts": 3
                },
                "swap": { "deadline": "2h" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.remote.chain_id, 1337);
        assert_eq!(config.remote.attempt_timeout, Duration::from_secs(30));
        assert_eq!(config.remote.max_attempts, 3);
        assert_eq!(config.swap.deadline, Duration::from_secs(2 * 3600));
    }

    #[test]
    fn defaults_apply_when_absent() {
        let config: SwapConfig = serde_json::from_str(
            r#"{
                "remote": {
                    "rpc_url": "http://127.0.0.1:8545",
                    "chain_id": 1,
                    "protocol_address": "0x1111111111111111111111111111111111111111"
                },
                "swap": {}
            }"#,
        )
        .unwrap();

        assert_eq!(config.remote.attempt_timeout, Duration::from_secs(45));
        assert_eq!(config.remote.max_attempts, 5);
        assert_eq!(config.swap.deadline, Duration::from_secs(86_400));
    }
}
