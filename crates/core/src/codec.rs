//! Fixed-layout binary codec for protocol accounts.
//!
//! Every account starts with an 8-byte discriminator, the first 8 bytes of
//! SHA256("account:<Name>"), followed by little-endian fields at fixed
//! offsets. Layout comments below are offsets into the raw account data.

use crate::{
    BondState, ConfigState, CoreError, Result, SettlementClaimsState, SettlementState,
    WithdrawRequestState,
};

/// Account discriminators: first 8 bytes of SHA256("account:<Name>").
pub mod account_discriminator {
    pub const CONFIG: [u8; 8] = [0x9b, 0x0c, 0xaa, 0xe0, 0x1e, 0xfa, 0xcc, 0x82];
    pub const BOND: [u8; 8] = [0xe0, 0x80, 0x30, 0xfb, 0xb6, 0xf6, 0x6f, 0xc4];
    pub const SETTLEMENT: [u8; 8] = [0x37, 0x0b, 0xdb, 0x21, 0x24, 0x88, 0x28, 0xb6];
    pub const SETTLEMENT_CLAIMS: [u8; 8] = [0x20, 0x82, 0x3e, 0xaf, 0xe7, 0x36, 0xaa, 0x72];
    pub const WITHDRAW_REQUEST: [u8; 8] = [0xba, 0xef, 0xae, 0xbf, 0xbd, 0x0d, 0x2f, 0xc4];
}

pub const CONFIG_ACCOUNT_SIZE: usize = 256;
pub const BOND_ACCOUNT_SIZE: usize = 260;
pub const SETTLEMENT_ACCOUNT_SIZE: usize = 328;
pub const WITHDRAW_REQUEST_ACCOUNT_SIZE: usize = 192;
/// Fixed header of a SettlementClaims account; the bitmap follows.
pub const SETTLEMENT_CLAIMS_HEADER_SIZE: usize = 48;

fn check(data: &[u8], expected_len: usize, discriminator: &[u8; 8]) -> Result<()> {
    if data.len() < expected_len {
        return Err(CoreError::AccountDataTooShort {
            expected: expected_len,
            got: data.len(),
        });
    }
    if &data[..8] != discriminator {
        return Err(CoreError::UnexpectedDiscriminator);
    }
    Ok(())
}

fn read_pubkey(data: &[u8], offset: usize) -> [u8; 32] {
    data[offset..offset + 32].try_into().expect("32 bytes")
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(data[offset..offset + 8].try_into().expect("8 bytes"))
}

/// Config layout:
///   0..8    discriminator
///   8..40   admin_authority
///  40..72   operator_authority
///  72..80   epochs_to_claim_settlement u64
///  80..88   withdraw_lockup_epochs u64
///  88..96   minimum_stake_lamports u64
///  96..128  pause_authority
/// 128..129  paused bool
/// 129..137  min_bond_max_stake_wanted u64
/// 137..256  reserved
pub fn decode_config(data: &[u8]) -> Result<ConfigState> {
    check(data, CONFIG_ACCOUNT_SIZE, &account_discriminator::CONFIG)?;
    Ok(ConfigState {
        admin_authority: read_pubkey(data, 8),
        operator_authority: read_pubkey(data, 40),
        epochs_to_claim_settlement: read_u64(data, 72),
        withdraw_lockup_epochs: read_u64(data, 80),
        minimum_stake_lamports: read_u64(data, 88),
        pause_authority: read_pubkey(data, 96),
        paused: data[128] != 0,
        min_bond_max_stake_wanted: read_u64(data, 129),
    })
}

pub fn encode_config(state: &ConfigState) -> Vec<u8> {
    let mut data = vec![0u8; CONFIG_ACCOUNT_SIZE];
    data[..8].copy_from_slice(&account_discriminator::CONFIG);
    data[8..40].copy_from_slice(&state.admin_authority);
    data[40..72].copy_from_slice(&state.operator_authority);
    data[72..80].copy_from_slice(&state.epochs_to_claim_settlement.to_le_bytes());
    data[80..88].copy_from_slice(&state.withdraw_lockup_epochs.to_le_bytes());
    data[88..96].copy_from_slice(&state.minimum_stake_lamports.to_le_bytes());
    data[96..128].copy_from_slice(&state.pause_authority);
    data[128] = state.paused as u8;
    data[129..137].copy_from_slice(&state.min_bond_max_stake_wanted.to_le_bytes());
    data
}

/// Bond layout:
///   0..8    discriminator
///   8..40   config
///  40..72   vote_account
///  72..104  authority
/// 104..112  cpmpe u64
/// 112..120  max_stake_wanted u64
/// 120..121  bump
/// 121..260  reserved
pub fn decode_bond(data: &[u8]) -> Result<BondState> {
    check(data, BOND_ACCOUNT_SIZE, &account_discriminator::BOND)?;
    Ok(BondState {
        config: read_pubkey(data, 8),
        vote_account: read_pubkey(data, 40),
        authority: read_pubkey(data, 72),
        cpmpe: read_u64(data, 104),
        max_stake_wanted: read_u64(data, 112),
        bump: data[120],
    })
}

pub fn encode_bond(state: &BondState) -> Vec<u8> {
    let mut data = vec![0u8; BOND_ACCOUNT_SIZE];
    data[..8].copy_from_slice(&account_discriminator::BOND);
    data[8..40].copy_from_slice(&state.config);
    data[40..72].copy_from_slice(&state.vote_account);
    data[72..104].copy_from_slice(&state.authority);
    data[104..112].copy_from_slice(&state.cpmpe.to_le_bytes());
    data[112..120].copy_from_slice(&state.max_stake_wanted.to_le_bytes());
    data[120] = state.bump;
    data
}

/// Settlement layout:
///   0..8    discriminator
///   8..40   bond
///  40..72   staker_authority
///  72..104  merkle_root
/// 104..112  max_total_claim u64
/// 112..120  max_merkle_nodes u64
/// 120..128  lamports_funded u64
/// 128..136  merkle_nodes_claimed u64
/// 136..144  lamports_claimed u64
/// 144..152  epoch_created_for u64
/// 152..184  rent_collector
/// 184..217  split_rent_collector Option<pubkey> (1-byte tag + 32)
/// 217..225  split_rent_amount u64
/// 225..226  bump
/// 226..328  reserved
pub fn decode_settlement(data: &[u8]) -> Result<SettlementState> {
    check(data, SETTLEMENT_ACCOUNT_SIZE, &account_discriminator::SETTLEMENT)?;
    let split_rent_collector = match data[184] {
        0 => None,
        1 => Some(read_pubkey(data, 185)),
        tag => return Err(CoreError::InvalidOptionTag(tag)),
    };
    Ok(SettlementState {
        bond: read_pubkey(data, 8),
        staker_authority: read_pubkey(data, 40),
        merkle_root: read_pubkey(data, 72),
        max_total_claim: read_u64(data, 104),
        max_merkle_nodes: read_u64(data, 112),
        lamports_funded: read_u64(data, 120),
        merkle_nodes_claimed: read_u64(data, 128),
        lamports_claimed: read_u64(data, 136),
        epoch_created_for: read_u64(data, 144),
        rent_collector: read_pubkey(data, 152),
        split_rent_collector,
        split_rent_amount: read_u64(data, 217),
        bump: data[225],
    })
}

pub fn encode_settlement(state: &SettlementState) -> Vec<u8> {
    let mut data = vec![0u8; SETTLEMENT_ACCOUNT_SIZE];
    data[..8].copy_from_slice(&account_discriminator::SETTLEMENT);
    data[8..40].copy_from_slice(&state.bond);
    data[40..72].copy_from_slice(&state.staker_authority);
    data[72..104].copy_from_slice(&state.merkle_root);
    data[104..112].copy_from_slice(&state.max_total_claim.to_le_bytes());
    data[112..120].copy_from_slice(&state.max_merkle_nodes.to_le_bytes());
    data[120..128].copy_from_slice(&state.lamports_funded.to_le_bytes());
    data[128..136].copy_from_slice(&state.merkle_nodes_claimed.to_le_bytes());
    data[136..144].copy_from_slice(&state.lamports_claimed.to_le_bytes());
    data[144..152].copy_from_slice(&state.epoch_created_for.to_le_bytes());
    data[152..184].copy_from_slice(&state.rent_collector);
    if let Some(collector) = &state.split_rent_collector {
        data[184] = 1;
        data[185..217].copy_from_slice(collector);
    }
    data[217..225].copy_from_slice(&state.split_rent_amount.to_le_bytes());
    data[225] = state.bump;
    data
}

/// WithdrawRequest layout (192 bytes total):
///   0..8    discriminator
///   8..40   vote_account
///  40..72   bond
///  72..80   epoch u64
///  80..88   requested_amount u64
///  88..96   withdrawn_amount u64
///  96..97   bump
///  97..192  reserved
pub fn decode_withdraw_request(data: &[u8]) -> Result<WithdrawRequestState> {
    check(
        data,
        WITHDRAW_REQUEST_ACCOUNT_SIZE,
        &account_discriminator::WITHDRAW_REQUEST,
    )?;
    Ok(WithdrawRequestState {
        vote_account: read_pubkey(data, 8),
        bond: read_pubkey(data, 40),
        epoch: read_u64(data, 72),
        requested_amount: read_u64(data, 80),
        withdrawn_amount: read_u64(data, 88),
        bump: data[96],
    })
}

pub fn encode_withdraw_request(state: &WithdrawRequestState) -> Vec<u8> {
    let mut data = vec![0u8; WITHDRAW_REQUEST_ACCOUNT_SIZE];
    data[..8].copy_from_slice(&account_discriminator::WITHDRAW_REQUEST);
    data[8..40].copy_from_slice(&state.vote_account);
    data[40..72].copy_from_slice(&state.bond);
    data[72..80].copy_from_slice(&state.epoch.to_le_bytes());
    data[80..88].copy_from_slice(&state.requested_amount.to_le_bytes());
    data[88..96].copy_from_slice(&state.withdrawn_amount.to_le_bytes());
    data[96] = state.bump;
    data
}

/// SettlementClaims layout:
///   0..8    discriminator
///   8..40   settlement
///  40..48   max_records u64
///  48..     bitmap, ceil(max_records / 8) bytes
pub fn decode_settlement_claims(data: &[u8]) -> Result<SettlementClaimsState> {
    check(
        data,
        SETTLEMENT_CLAIMS_HEADER_SIZE,
        &account_discriminator::SETTLEMENT_CLAIMS,
    )?;
    let settlement = read_pubkey(data, 8);
    let max_records = read_u64(data, 40);
    let bitmap_len = max_records.div_ceil(8) as usize;
    let bitmap = &data[SETTLEMENT_CLAIMS_HEADER_SIZE..];
    if bitmap.len() < bitmap_len {
        return Err(CoreError::BitmapLengthMismatch {
            expected: bitmap_len,
            got: bitmap.len(),
        });
    }
    Ok(SettlementClaimsState {
        settlement,
        max_records,
        bitmap: bitmap[..bitmap_len].to_vec(),
    })
}

pub fn encode_settlement_claims(state: &SettlementClaimsState) -> Vec<u8> {
    let mut data = vec![0u8; SETTLEMENT_CLAIMS_HEADER_SIZE];
    data[..8].copy_from_slice(&account_discriminator::SETTLEMENT_CLAIMS);
    data[8..40].copy_from_slice(&state.settlement);
    data[40..48].copy_from_slice(&state.max_records.to_le_bytes());
    data.extend_from_slice(&state.bitmap);
    data
}
