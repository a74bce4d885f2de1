//! Client configuration and the per-invocation derivation context.

use std::time::Duration;

use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;

/// Client mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    /// Mock mode for development - all operations succeed, state is in-memory
    Mock,
    /// Live Solana mode (requires the deployed bonds program)
    Live,
}

/// Bonds client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Client mode (Mock or Live)
    pub mode: ClientMode,
    /// Solana RPC endpoint (only used in Live mode)
    pub rpc_url: String,
    /// Program ID of the staking-bond program
    pub program_id: Pubkey,
    /// Address of the protocol Config account
    pub config_address: Pubkey,
    /// Commitment level for reads and confirmation
    pub commitment: String,
    /// How long a confirmation wait may run before reporting an
    /// ambiguous timeout
    pub confirmation_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mode: ClientMode::Mock,
            rpc_url: "https://api.devnet.solana.com".to_string(),
            program_id: Pubkey::default(),
            config_address: Pubkey::default(),
            commitment: "confirmed".to_string(),
            confirmation_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Create a mock configuration for development
    pub fn mock() -> Self {
        Self {
            mode: ClientMode::Mock,
            ..Default::default()
        }
    }

    /// Create a live configuration for Solana devnet
    pub fn devnet(program_id: Pubkey, config_address: Pubkey) -> Self {
        Self {
            mode: ClientMode::Live,
            rpc_url: "https://api.devnet.solana.com".to_string(),
            program_id,
            config_address,
            ..Default::default()
        }
    }

    /// Create a live configuration for Solana mainnet
    pub fn mainnet(program_id: Pubkey, config_address: Pubkey) -> Self {
        Self {
            mode: ClientMode::Live,
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            program_id,
            config_address,
            commitment: "finalized".to_string(),
            ..Default::default()
        }
    }

    /// Get commitment config for the Solana client
    pub fn commitment_config(&self) -> CommitmentConfig {
        match self.commitment.as_str() {
            "finalized" => CommitmentConfig::finalized(),
            "confirmed" => CommitmentConfig::confirmed(),
            "processed" => CommitmentConfig::processed(),
            _ => CommitmentConfig::confirmed(),
        }
    }

    /// Derivation context for instruction builders
    pub fn context(&self) -> BondsContext {
        BondsContext {
            program_id: self.program_id,
            config_address: self.config_address,
        }
    }
}

/// Read-only derivation context passed by reference through every builder.
/// Constructed once per invocation, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondsContext {
    pub program_id: Pubkey,
    pub config_address: Pubkey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_parsing() {
        let mut config = ClientConfig::mock();
        assert_eq!(config.commitment_config(), CommitmentConfig::confirmed());
        config.commitment = "finalized".to_string();
        assert_eq!(config.commitment_config(), CommitmentConfig::finalized());
        config.commitment = "bogus".to_string();
        assert_eq!(config.commitment_config(), CommitmentConfig::confirmed());
    }

    #[test]
    fn test_context_carries_ids() {
        let program_id = Pubkey::new_unique();
        let config_address = Pubkey::new_unique();
        let config = ClientConfig::devnet(program_id, config_address);
        let ctx = config.context();
        assert_eq!(ctx.program_id, program_id);
        assert_eq!(ctx.config_address, config_address);
    }
}
