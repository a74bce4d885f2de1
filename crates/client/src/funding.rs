//! Settlement funding orchestration.
//!
//! Builds the fund-settlement instruction for one candidate stake account,
//! deciding split vs full-consume vs refuse from the settlement's remaining
//! target. Construction has no side effects; the caller supplies
//! already-fetched state and submits the result itself.

use std::sync::Arc;

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk_ids::system_program;
use tracing::debug;

use stakebond_core::{plan_funding, FundingPlan, SettlementState};

use crate::instructions::{
    clock_sysvar, discriminator, stake_history_sysvar, stake_program_id,
};
use crate::{bonds_withdrawer_authority, settlement_staker_authority, BondsContext, Result};

/// Optional parameters for funding; unset fields resolve against the
/// caller's own key exactly once, at build time.
#[derive(Clone, Default)]
pub struct FundSettlementOptions {
    /// Operator authority signing the funding; defaults to the caller
    pub operator_authority: Option<Pubkey>,
    /// Payer of a split account's rent; defaults to the caller
    pub rent_payer: Option<Pubkey>,
    /// Receiver of the split account's rent once it closes; defaults to
    /// the rent payer
    pub split_rent_collector: Option<Pubkey>,
    /// Pre-created split stake account, to resume a funding that was built
    /// but never landed; a fresh keypair is generated when unset and the
    /// plan splits
    pub split_stake_account: Option<Arc<Keypair>>,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedFundOptions {
    pub operator_authority: Pubkey,
    pub rent_payer: Pubkey,
    pub split_rent_collector: Pubkey,
}

impl FundSettlementOptions {
    pub fn resolve(&self, caller: &Pubkey) -> ResolvedFundOptions {
        let rent_payer = self.rent_payer.unwrap_or(*caller);
        ResolvedFundOptions {
            operator_authority: self.operator_authority.unwrap_or(*caller),
            rent_payer,
            split_rent_collector: self.split_rent_collector.unwrap_or(rent_payer),
        }
    }
}

/// A constructed funding submission.
pub struct FundSettlementBuilt {
    pub instruction: Instruction,
    /// Keypair of the split stake account, when the plan splits; either
    /// the options' pre-created account or a fresh keypair. Must co-sign
    /// the submission.
    pub split_stake_account: Option<Arc<Keypair>>,
    pub plan: FundingPlan,
}

/// Build outcome; the refusals are benign and reported, not errored.
pub enum FundSettlementOutcome {
    /// `lamports_funded` already equals `max_total_claim`
    AlreadyFunded,
    /// The stake account sits at the minimal viable floor and has nothing
    /// to contribute
    BelowMinimum,
    Built(FundSettlementBuilt),
}

/// Build the instruction funding `settlement_address` from `stake_account`.
///
/// `minimal_stake_lamports` is the minimal viable stake-account size:
/// rent-exempt minimum plus the config's minimum stake. Authority and
/// ownership mismatches are left for the program to reject at execution.
#[allow(clippy::too_many_arguments)]
pub fn build_fund_settlement(
    ctx: &BondsContext,
    settlement_address: &Pubkey,
    settlement: &SettlementState,
    stake_account: &Pubkey,
    stake_lamports: u64,
    minimal_stake_lamports: u64,
    caller: &Pubkey,
    options: &FundSettlementOptions,
) -> Result<FundSettlementOutcome> {
    let target = settlement.remaining_funding();
    let plan = plan_funding(stake_lamports, target, minimal_stake_lamports);
    debug!(
        "Funding plan for settlement {}: target={}, stake={}, plan={:?}",
        settlement_address, target, stake_lamports, plan,
    );

    match plan {
        FundingPlan::AlreadySatisfied => return Ok(FundSettlementOutcome::AlreadyFunded),
        FundingPlan::BelowMinimum => return Ok(FundSettlementOutcome::BelowMinimum),
        FundingPlan::ConsumeAll { .. } | FundingPlan::Split { .. } => {}
    }

    let resolved = options.resolve(caller);
    let bond = Pubkey::new_from_array(settlement.bond);
    let (withdrawer_authority, _) =
        bonds_withdrawer_authority(&ctx.program_id, &ctx.config_address)?;
    let (staker_authority, _) = settlement_staker_authority(&ctx.program_id, settlement_address)?;

    let split_stake_account = if plan.is_split() {
        Some(
            options
                .split_stake_account
                .clone()
                .unwrap_or_else(|| Arc::new(Keypair::new())),
        )
    } else {
        None
    };

    let mut accounts = vec![
        AccountMeta::new_readonly(ctx.config_address, false), // config
        AccountMeta::new_readonly(bond, false),               // bond
        AccountMeta::new(*settlement_address, false),         // settlement (mut)
        AccountMeta::new_readonly(withdrawer_authority, false), // bonds withdrawer authority
        AccountMeta::new_readonly(staker_authority, false),   // settlement staker authority
        AccountMeta::new_readonly(resolved.operator_authority, true), // operator (signer)
        AccountMeta::new(*stake_account, false),              // source stake (mut)
    ];
    if let Some(split) = &split_stake_account {
        accounts.push(AccountMeta::new(split.pubkey(), true)); // split stake (init, signer)
        accounts.push(AccountMeta::new(resolved.rent_payer, true)); // split rent payer (signer)
        accounts.push(AccountMeta::new_readonly(resolved.split_rent_collector, false));
    }
    accounts.push(AccountMeta::new_readonly(system_program::id(), false));
    accounts.push(AccountMeta::new_readonly(stake_program_id(), false));
    accounts.push(AccountMeta::new_readonly(clock_sysvar(), false));
    accounts.push(AccountMeta::new_readonly(stake_history_sysvar(), false));

    let instruction = Instruction {
        program_id: ctx.program_id,
        accounts,
        data: discriminator::FUND_SETTLEMENT.to_vec(),
    };

    Ok(FundSettlementOutcome::Built(FundSettlementBuilt {
        instruction,
        split_stake_account,
        plan,
    }))
}
