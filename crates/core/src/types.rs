//! Account state types for the staking-bond protocol

use serde::{Deserialize, Serialize};

/// 32-byte public key
pub type PublicKey = [u8; 32];

/// Smallest native unit of value on the ledger
pub type Lamports = u64;

/// Protocol-wide configuration account. One per deployment; mutated only
/// via an authorized configure operation, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigState {
    /// Authority allowed to change this config
    pub admin_authority: PublicKey,
    /// Authority operating settlements (init/fund/close)
    pub operator_authority: PublicKey,
    /// Epochs a settlement stays claimable after its creation epoch
    pub epochs_to_claim_settlement: u64,
    /// Epochs a withdraw request stays locked after its creation epoch
    pub withdraw_lockup_epochs: u64,
    /// Configured minimum stake kept in any protocol-managed stake account
    pub minimum_stake_lamports: u64,
    /// Authority allowed to pause/resume the protocol
    pub pause_authority: PublicKey,
    /// Emergency pause flag
    pub paused: bool,
    /// Floor for a bond's max-stake-wanted setting
    pub min_bond_max_stake_wanted: u64,
}

/// Per-(config, vote account) collateral registration.
/// Address is a pure function of that pair; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondState {
    /// Config this bond is registered under
    pub config: PublicKey,
    /// Validator vote account pledged as collateral source
    pub vote_account: PublicKey,
    /// Bond authority (configure/withdraw rights)
    pub authority: PublicKey,
    /// Cost per mille per epoch fee rate
    pub cpmpe: u64,
    /// Upper bound of stake the validator wants delegated
    pub max_stake_wanted: u64,
    /// PDA bump
    pub bump: u8,
}

/// Merkle-committed claim batch for one bond/epoch. Created by an
/// operator, closed after expiration or full settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementState {
    /// Owning bond
    pub bond: PublicKey,
    /// Staker authority PDA controlling settlement-funded stake
    pub staker_authority: PublicKey,
    /// Root committing the claim batch
    pub merkle_root: [u8; 32],
    /// Ceiling on total lamports claimable from this settlement
    pub max_total_claim: u64,
    /// Ceiling on the number of merkle leaves
    pub max_merkle_nodes: u64,
    /// Lamports funded so far; never exceeds `max_total_claim`
    pub lamports_funded: u64,
    /// Leaves redeemed so far; never exceeds `max_merkle_nodes`
    pub merkle_nodes_claimed: u64,
    /// Lamports redeemed so far
    pub lamports_claimed: u64,
    /// Epoch the settlement was created for
    pub epoch_created_for: u64,
    /// Receiver of the settlement account rent on close
    pub rent_collector: PublicKey,
    /// Receiver of a funding split account's rent, once that account closes
    pub split_rent_collector: Option<PublicKey>,
    /// Rent lamports advanced for the split account
    pub split_rent_amount: u64,
    /// PDA bump
    pub bump: u8,
}

impl SettlementState {
    /// Lamports still needed to fully fund this settlement
    pub fn remaining_funding(&self) -> u64 {
        self.max_total_claim.saturating_sub(self.lamports_funded)
    }

    pub fn is_fully_funded(&self) -> bool {
        self.lamports_funded >= self.max_total_claim
    }

    /// A settlement expires once `epochs_to_claim` whole epochs have
    /// elapsed past its creation epoch.
    pub fn is_expired(&self, current_epoch: u64, epochs_to_claim: u64) -> bool {
        current_epoch > self.epoch_created_for.saturating_add(epochs_to_claim)
    }
}

/// One-per-bond withdrawal ticket. Deleted on cancel or full claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequestState {
    /// Vote account of the owning bond
    pub vote_account: PublicKey,
    /// Owning bond
    pub bond: PublicKey,
    /// Epoch the request was created in
    pub epoch: u64,
    /// Total lamports requested
    pub requested_amount: u64,
    /// Lamports withdrawn so far
    pub withdrawn_amount: u64,
    /// PDA bump
    pub bump: u8,
}

impl WithdrawRequestState {
    /// Lamports still owed to the withdrawer
    pub fn remaining_amount(&self) -> u64 {
        self.requested_amount.saturating_sub(self.withdrawn_amount)
    }

    /// First epoch at which the ticket becomes claimable
    pub fn unlock_epoch(&self, withdraw_lockup_epochs: u64) -> u64 {
        self.epoch.saturating_add(withdraw_lockup_epochs)
    }

    /// Claim is permitted once the lockup has fully elapsed; the boundary
    /// epoch itself is claimable.
    pub fn is_unlocked(&self, current_epoch: u64, withdraw_lockup_epochs: u64) -> bool {
        current_epoch >= self.unlock_epoch(withdraw_lockup_epochs)
    }
}

/// Index-keyed bitmap recording redeemed leaves for one settlement.
/// Append-only: bits are set, never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementClaimsState {
    /// Settlement this bitmap belongs to
    pub settlement: PublicKey,
    /// Number of addressable leaves
    pub max_records: u64,
    /// One bit per leaf, LSB-first within each byte
    pub bitmap: Vec<u8>,
}

impl SettlementClaimsState {
    pub fn new_empty(settlement: PublicKey, max_records: u64) -> Self {
        let bytes = max_records.div_ceil(8) as usize;
        Self {
            settlement,
            max_records,
            bitmap: vec![0u8; bytes],
        }
    }

    pub fn is_set(&self, index: u64) -> bool {
        if index >= self.max_records {
            return false;
        }
        let byte = (index / 8) as usize;
        let bit = (index % 8) as u8;
        self.bitmap.get(byte).map(|b| b >> bit & 1 == 1).unwrap_or(false)
    }

    /// Set the bit for `index`. Returns `false` when it was already set.
    pub fn set(&mut self, index: u64) -> crate::Result<bool> {
        if index >= self.max_records {
            return Err(crate::CoreError::ClaimIndexOutOfRange {
                index,
                max: self.max_records,
            });
        }
        let byte = (index / 8) as usize;
        let bit = (index % 8) as u8;
        if self.bitmap[byte] >> bit & 1 == 1 {
            return Ok(false);
        }
        self.bitmap[byte] |= 1 << bit;
        Ok(true)
    }

    pub fn count_set(&self) -> u64 {
        self.bitmap.iter().map(|b| b.count_ones() as u64).sum()
    }
}

/// Client-side view of a native stake account. The staking subsystem owns
/// this entity's schema; only the fields the orchestration reasons about
/// are carried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeAccountView {
    pub lamports: Lamports,
    pub staker: PublicKey,
    pub withdrawer: PublicKey,
    /// Vote account the stake is delegated to, if any
    pub delegated_vote_account: Option<PublicKey>,
    pub activation_epoch: u64,
    pub deactivation_epoch: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_remaining_funding() {
        let mut settlement = SettlementState {
            bond: [1u8; 32],
            staker_authority: [2u8; 32],
            merkle_root: [0u8; 32],
            max_total_claim: 1_000,
            max_merkle_nodes: 4,
            lamports_funded: 300,
            merkle_nodes_claimed: 0,
            lamports_claimed: 0,
            epoch_created_for: 10,
            rent_collector: [3u8; 32],
            split_rent_collector: None,
            split_rent_amount: 0,
            bump: 255,
        };
        assert_eq!(settlement.remaining_funding(), 700);
        assert!(!settlement.is_fully_funded());

        settlement.lamports_funded = 1_000;
        assert_eq!(settlement.remaining_funding(), 0);
        assert!(settlement.is_fully_funded());
    }

    #[test]
    fn test_settlement_expiry_boundary() {
        let settlement = SettlementState {
            bond: [0u8; 32],
            staker_authority: [0u8; 32],
            merkle_root: [0u8; 32],
            max_total_claim: 0,
            max_merkle_nodes: 0,
            lamports_funded: 0,
            merkle_nodes_claimed: 0,
            lamports_claimed: 0,
            epoch_created_for: 10,
            rent_collector: [0u8; 32],
            split_rent_collector: None,
            split_rent_amount: 0,
            bump: 255,
        };
        // Claimable through epoch 13 inclusive with 3 epochs to claim
        assert!(!settlement.is_expired(13, 3));
        assert!(settlement.is_expired(14, 3));
    }

    #[test]
    fn test_withdraw_request_unlock_boundary() {
        let request = WithdrawRequestState {
            vote_account: [1u8; 32],
            bond: [2u8; 32],
            epoch: 100,
            requested_amount: 5_000,
            withdrawn_amount: 1_000,
            bump: 254,
        };
        assert_eq!(request.remaining_amount(), 4_000);
        assert_eq!(request.unlock_epoch(3), 103);
        assert!(!request.is_unlocked(102, 3));
        assert!(request.is_unlocked(103, 3));
        assert!(request.is_unlocked(104, 3));
    }

    #[test]
    fn test_claims_bitmap_set_and_query() {
        let mut claims = SettlementClaimsState::new_empty([7u8; 32], 20);
        assert_eq!(claims.bitmap.len(), 3);
        assert!(!claims.is_set(9));

        assert!(claims.set(9).unwrap());
        assert!(claims.is_set(9));
        // Second set is a no-op
        assert!(!claims.set(9).unwrap());
        assert_eq!(claims.count_set(), 1);

        assert!(claims.set(0).unwrap());
        assert!(claims.set(19).unwrap());
        assert_eq!(claims.count_set(), 3);
    }

    #[test]
    fn test_claims_bitmap_out_of_range() {
        let mut claims = SettlementClaimsState::new_empty([7u8; 32], 8);
        assert!(!claims.is_set(8));
        assert!(matches!(
            claims.set(8),
            Err(crate::CoreError::ClaimIndexOutOfRange { index: 8, max: 8 })
        ));
    }
}
