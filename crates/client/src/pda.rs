//! Protocol address derivation.
//!
//! Every protocol account and authority is a program-derived address from a
//! fixed seed scheme: a short ASCII discriminator followed by the parent
//! keys (and, for settlements, the merkle root and epoch bytes). Derivation
//! is pure; the same seed tuple always yields the same `(address, bump)`.

use solana_sdk::pubkey::Pubkey;

use crate::{BondsClientError, Result};

pub const BOND_SEED: &[u8] = b"bond";
pub const SETTLEMENT_SEED: &[u8] = b"settlement";
pub const WITHDRAW_REQUEST_SEED: &[u8] = b"withdraw_request";
pub const BONDS_AUTHORITY_SEED: &[u8] = b"bonds_authority";
pub const SETTLEMENT_AUTHORITY_SEED: &[u8] = b"settlement_authority";
pub const SETTLEMENT_CLAIMS_SEED: &[u8] = b"settlement_claims";

fn derive(program_id: &Pubkey, entity: &str, seeds: &[&[u8]]) -> Result<(Pubkey, u8)> {
    // try_find_program_address walks bumps 255..0 and returns the first
    // off-curve candidate; None is practically unreachable but fatal.
    Pubkey::try_find_program_address(seeds, program_id)
        .ok_or_else(|| BondsClientError::DerivationFailed(entity.to_string()))
}

/// Bond PDA: ["bond", config, vote_account]
pub fn bond_address(
    program_id: &Pubkey,
    config: &Pubkey,
    vote_account: &Pubkey,
) -> Result<(Pubkey, u8)> {
    derive(
        program_id,
        "bond",
        &[BOND_SEED, config.as_ref(), vote_account.as_ref()],
    )
}

/// Settlement PDA: ["settlement", bond, merkle_root, epoch LE]
pub fn settlement_address(
    program_id: &Pubkey,
    bond: &Pubkey,
    merkle_root: &[u8; 32],
    epoch: u64,
) -> Result<(Pubkey, u8)> {
    derive(
        program_id,
        "settlement",
        &[
            SETTLEMENT_SEED,
            bond.as_ref(),
            merkle_root,
            &epoch.to_le_bytes(),
        ],
    )
}

/// WithdrawRequest PDA: ["withdraw_request", bond]
pub fn withdraw_request_address(program_id: &Pubkey, bond: &Pubkey) -> Result<(Pubkey, u8)> {
    derive(
        program_id,
        "withdraw_request",
        &[WITHDRAW_REQUEST_SEED, bond.as_ref()],
    )
}

/// Withdrawer authority over all bond-owned stake: ["bonds_authority", config]
pub fn bonds_withdrawer_authority(program_id: &Pubkey, config: &Pubkey) -> Result<(Pubkey, u8)> {
    derive(
        program_id,
        "bonds_authority",
        &[BONDS_AUTHORITY_SEED, config.as_ref()],
    )
}

/// Staker authority over settlement-funded stake:
/// ["settlement_authority", settlement]
pub fn settlement_staker_authority(
    program_id: &Pubkey,
    settlement: &Pubkey,
) -> Result<(Pubkey, u8)> {
    derive(
        program_id,
        "settlement_authority",
        &[SETTLEMENT_AUTHORITY_SEED, settlement.as_ref()],
    )
}

/// Claim bitmap PDA: ["settlement_claims", settlement]
pub fn settlement_claims_address(program_id: &Pubkey, settlement: &Pubkey) -> Result<(Pubkey, u8)> {
    derive(
        program_id,
        "settlement_claims",
        &[SETTLEMENT_CLAIMS_SEED, settlement.as_ref()],
    )
}
