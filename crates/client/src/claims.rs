//! Merkle-proof claim assembly.
//!
//! Builds claim-settlement instructions and derives the per-settlement
//! claim bitmap address. The bitmap check is advisory; the program performs
//! the authoritative dedup on submission.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::instructions::{
    append_proof, clock_sysvar, discriminator, stake_history_sysvar, stake_program_id,
};
use crate::{settlement_claims_address, settlement_staker_authority, BondsContext, Result};

/// Inputs for one leaf's claim.
#[derive(Debug, Clone)]
pub struct ClaimSettlementArgs {
    pub settlement: Pubkey,
    /// Lamports the leaf entitles the claimant to
    pub claim_amount: u64,
    /// Leaf position in the committed batch
    pub leaf_index: u64,
    /// Sibling path up to the settlement's merkle root
    pub merkle_proof: Vec<[u8; 32]>,
    /// Stake authority committed in the leaf
    pub stake_authority: Pubkey,
    /// Withdraw authority committed in the leaf
    pub withdraw_authority: Pubkey,
    /// Settlement-funded stake account paying the claim
    pub source_stake_account: Pubkey,
    /// Claimant's stake account receiving it
    pub destination_stake_account: Pubkey,
}

pub struct ClaimSettlementBuilt {
    pub instruction: Instruction,
    /// The settlement's claim bitmap account recording this leaf
    pub claim_record: Pubkey,
}

/// Build the claim instruction and derive its claim-record address.
pub fn build_claim_settlement(
    ctx: &BondsContext,
    args: &ClaimSettlementArgs,
) -> Result<ClaimSettlementBuilt> {
    let (claim_record, _) = settlement_claims_address(&ctx.program_id, &args.settlement)?;
    let (staker_authority, _) = settlement_staker_authority(&ctx.program_id, &args.settlement)?;
    debug!(
        "Claim leaf {} of settlement {} for {} lamports",
        args.leaf_index, args.settlement, args.claim_amount,
    );

    let mut data = discriminator::CLAIM_SETTLEMENT.to_vec();
    data.extend_from_slice(&args.claim_amount.to_le_bytes());
    data.extend_from_slice(&args.leaf_index.to_le_bytes());
    data.extend_from_slice(args.stake_authority.as_ref());
    data.extend_from_slice(args.withdraw_authority.as_ref());
    append_proof(&mut data, &args.merkle_proof);

    let instruction = Instruction {
        program_id: ctx.program_id,
        accounts: vec![
            AccountMeta::new_readonly(ctx.config_address, false), // config
            AccountMeta::new(args.settlement, false),             // settlement (mut)
            AccountMeta::new(claim_record, false),                // claim bitmap (mut)
            AccountMeta::new_readonly(staker_authority, false),   // settlement staker authority
            AccountMeta::new(args.source_stake_account, false),   // source stake (mut)
            AccountMeta::new(args.destination_stake_account, false), // destination stake (mut)
            AccountMeta::new_readonly(stake_program_id(), false),
            AccountMeta::new_readonly(clock_sysvar(), false),
            AccountMeta::new_readonly(stake_history_sysvar(), false),
        ],
        data,
    };

    Ok(ClaimSettlementBuilt {
        instruction,
        claim_record,
    })
}

/// Filter for enumerating claim records. Under the bitmap scheme a record
/// is a (settlement, leaf index) pair; vote-account filtering joins through
/// the settlement's bond. Stake- and withdraw-authority axes are not
/// recoverable from the bitmap (no per-leaf authority survives on-chain),
/// so callers holding only an authority must re-derive the leaf index from
/// the merkle tree they claimed against.
#[derive(Debug, Clone, Default)]
pub struct ClaimFilter {
    pub settlement: Option<Pubkey>,
    pub vote_account: Option<Pubkey>,
}

/// One redeemed leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRecord {
    pub settlement: Pubkey,
    pub bond: Pubkey,
    pub vote_account: Pubkey,
    pub leaf_index: u64,
}

impl ClaimFilter {
    pub fn matches(&self, record: &ClaimRecord) -> bool {
        if let Some(settlement) = &self.settlement {
            if record.settlement != *settlement {
                return false;
            }
        }
        if let Some(vote_account) = &self.vote_account {
            if record.vote_account != *vote_account {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ClaimSettlementArgs {
        ClaimSettlementArgs {
            settlement: Pubkey::new_unique(),
            claim_amount: 777,
            leaf_index: 3,
            merkle_proof: vec![[1u8; 32], [2u8; 32]],
            stake_authority: Pubkey::new_unique(),
            withdraw_authority: Pubkey::new_unique(),
            source_stake_account: Pubkey::new_unique(),
            destination_stake_account: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_claim_data_layout() {
        let ctx = BondsContext {
            program_id: Pubkey::new_unique(),
            config_address: Pubkey::new_unique(),
        };
        let args = args();
        let built = build_claim_settlement(&ctx, &args).unwrap();

        let data = &built.instruction.data;
        assert_eq!(&data[..8], &discriminator::CLAIM_SETTLEMENT);
        assert_eq!(&data[8..16], &777u64.to_le_bytes());
        assert_eq!(&data[16..24], &3u64.to_le_bytes());
        assert_eq!(&data[24..56], args.stake_authority.as_ref());
        assert_eq!(&data[56..88], args.withdraw_authority.as_ref());
        // Vec length prefix + two nodes
        assert_eq!(&data[88..92], &2u32.to_le_bytes());
        assert_eq!(data.len(), 92 + 64);
    }

    #[test]
    fn test_claim_record_address_is_settlement_scoped() {
        let ctx = BondsContext {
            program_id: Pubkey::new_unique(),
            config_address: Pubkey::new_unique(),
        };
        let mut a = args();
        let built_a = build_claim_settlement(&ctx, &a).unwrap();
        // Same settlement, different leaf: same record account (bitmap)
        a.leaf_index = 9;
        let built_b = build_claim_settlement(&ctx, &a).unwrap();
        assert_eq!(built_a.claim_record, built_b.claim_record);

        a.settlement = Pubkey::new_unique();
        let built_c = build_claim_settlement(&ctx, &a).unwrap();
        assert_ne!(built_a.claim_record, built_c.claim_record);
    }

    #[test]
    fn test_claim_filter_combinations() {
        let record = ClaimRecord {
            settlement: Pubkey::new_unique(),
            bond: Pubkey::new_unique(),
            vote_account: Pubkey::new_unique(),
            leaf_index: 4,
        };
        assert!(ClaimFilter::default().matches(&record));
        assert!(ClaimFilter {
            settlement: Some(record.settlement),
            vote_account: Some(record.vote_account),
        }
        .matches(&record));
        assert!(!ClaimFilter {
            settlement: Some(Pubkey::new_unique()),
            vote_account: None,
        }
        .matches(&record));
        assert!(!ClaimFilter {
            settlement: None,
            vote_account: Some(Pubkey::new_unique()),
        }
        .matches(&record));
    }
}
