//! Account resolution: classify a raw on-chain account by owner and
//! discriminator, returning the typed state when it belongs to the bonds
//! program.

use solana_sdk::pubkey::Pubkey;
use stakebond_core::{
    codec, BondState, ConfigState, SettlementClaimsState, SettlementState, WithdrawRequestState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnownAccount {
    Config(ConfigState),
    Bond(BondState),
    Settlement(SettlementState),
    SettlementClaims(SettlementClaimsState),
    WithdrawRequest(WithdrawRequestState),
    VoteAccount,
    Unknown,
}

impl KnownAccount {
    pub fn kind(&self) -> &'static str {
        match self {
            KnownAccount::Config(_) => "config",
            KnownAccount::Bond(_) => "bond",
            KnownAccount::Settlement(_) => "settlement",
            KnownAccount::SettlementClaims(_) => "settlement_claims",
            KnownAccount::WithdrawRequest(_) => "withdraw_request",
            KnownAccount::VoteAccount => "vote_account",
            KnownAccount::Unknown => "unknown",
        }
    }
}

/// Classify an account by ownership and discriminator. Accounts owned by the
/// bonds program are decoded against each known layout in turn; anything that
/// fails every decode stays `Unknown` rather than erroring, so callers can
/// sweep arbitrary account lists.
pub fn resolve_account(owner: &Pubkey, program_id: &Pubkey, data: &[u8]) -> KnownAccount {
    if *owner == solana_sdk::vote::program::id() {
        return KnownAccount::VoteAccount;
    }
    if owner != program_id {
        return KnownAccount::Unknown;
    }
    if let Ok(state) = codec::decode_config(data) {
        return KnownAccount::Config(state);
    }
    if let Ok(state) = codec::decode_bond(data) {
        return KnownAccount::Bond(state);
    }
    if let Ok(state) = codec::decode_settlement(data) {
        return KnownAccount::Settlement(state);
    }
    if let Ok(state) = codec::decode_settlement_claims(data) {
        return KnownAccount::SettlementClaims(state);
    }
    if let Ok(state) = codec::decode_withdraw_request(data) {
        return KnownAccount::WithdrawRequest(state);
    }
    KnownAccount::Unknown
}
