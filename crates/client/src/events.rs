//! Event log decoding.
//!
//! Executed transactions attach `Program data: <base64>` log lines. Each
//! payload starts with an 8-byte discriminator, the first 8 bytes of
//! SHA256("event:<Name>"), followed by little-endian fields. Decoding is a
//! pure structured step, entirely separate from submission.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

const PROGRAM_DATA_PREFIX: &str = "Program data: ";

mod event_discriminator {
    pub const FUND_SETTLEMENT: [u8; 8] = [0x68, 0xa1, 0x06, 0x4d, 0x52, 0xec, 0x04, 0x72];
    pub const CLAIM_SETTLEMENT: [u8; 8] = [0x87, 0xfd, 0x91, 0xe9, 0xe3, 0x1d, 0xbc, 0x8d];
    pub const INIT_WITHDRAW_REQUEST: [u8; 8] = [0x7a, 0x28, 0x83, 0x69, 0x46, 0x23, 0x77, 0x80];
    pub const CANCEL_WITHDRAW_REQUEST: [u8; 8] = [0xdd, 0x61, 0x68, 0x23, 0x13, 0x89, 0xf8, 0xf6];
    pub const CLAIM_WITHDRAW_REQUEST: [u8; 8] = [0xc9, 0xd2, 0x90, 0x6c, 0xeb, 0xd1, 0x55, 0x3a];
    pub const CLOSE_SETTLEMENT: [u8; 8] = [0xe2, 0xad, 0x6f, 0x6f, 0x69, 0xda, 0x76, 0x67];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundSettlementEvent {
    pub settlement: Pubkey,
    pub bond: Pubkey,
    pub funding_amount: u64,
    /// Running total after this funding
    pub lamports_funded: u64,
    pub split_stake_account: Option<Pubkey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSettlementEvent {
    pub settlement: Pubkey,
    pub leaf_index: u64,
    pub claim_amount: u64,
    pub withdraw_authority: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitWithdrawRequestEvent {
    pub withdraw_request: Pubkey,
    pub bond: Pubkey,
    pub epoch: u64,
    pub requested_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelWithdrawRequestEvent {
    pub withdraw_request: Pubkey,
    pub bond: Pubkey,
    pub returned_rent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimWithdrawRequestEvent {
    pub withdraw_request: Pubkey,
    pub bond: Pubkey,
    pub withdrawn_amount: u64,
    pub remaining_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseSettlementEvent {
    pub settlement: Pubkey,
    pub bond: Pubkey,
    pub rent_collector: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondsEvent {
    FundSettlement(FundSettlementEvent),
    ClaimSettlement(ClaimSettlementEvent),
    InitWithdrawRequest(InitWithdrawRequestEvent),
    CancelWithdrawRequest(CancelWithdrawRequestEvent),
    ClaimWithdrawRequest(ClaimWithdrawRequestEvent),
    CloseSettlement(CloseSettlementEvent),
}

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn pubkey(&mut self) -> Option<Pubkey> {
        let bytes: [u8; 32] = self.data.get(self.offset..self.offset + 32)?.try_into().ok()?;
        self.offset += 32;
        Some(Pubkey::new_from_array(bytes))
    }

    fn u64(&mut self) -> Option<u64> {
        let bytes: [u8; 8] = self.data.get(self.offset..self.offset + 8)?.try_into().ok()?;
        self.offset += 8;
        Some(u64::from_le_bytes(bytes))
    }

    fn option_pubkey(&mut self) -> Option<Option<Pubkey>> {
        let tag = *self.data.get(self.offset)?;
        self.offset += 1;
        match tag {
            0 => Some(None),
            1 => Some(Some(self.pubkey()?)),
            _ => None,
        }
    }
}

/// Decode one event payload; None for unknown discriminators or truncated
/// payloads (foreign programs share the log stream).
pub fn decode_event(data: &[u8]) -> Option<BondsEvent> {
    let discriminator: [u8; 8] = data.get(..8)?.try_into().ok()?;
    let mut cursor = Cursor::new(&data[8..]);
    match discriminator {
        event_discriminator::FUND_SETTLEMENT => {
            Some(BondsEvent::FundSettlement(FundSettlementEvent {
                settlement: cursor.pubkey()?,
                bond: cursor.pubkey()?,
                funding_amount: cursor.u64()?,
                lamports_funded: cursor.u64()?,
                split_stake_account: cursor.option_pubkey()?,
            }))
        }
        event_discriminator::CLAIM_SETTLEMENT => {
            Some(BondsEvent::ClaimSettlement(ClaimSettlementEvent {
                settlement: cursor.pubkey()?,
                leaf_index: cursor.u64()?,
                claim_amount: cursor.u64()?,
                withdraw_authority: cursor.pubkey()?,
            }))
        }
        event_discriminator::INIT_WITHDRAW_REQUEST => {
            Some(BondsEvent::InitWithdrawRequest(InitWithdrawRequestEvent {
                withdraw_request: cursor.pubkey()?,
                bond: cursor.pubkey()?,
                epoch: cursor.u64()?,
                requested_amount: cursor.u64()?,
            }))
        }
        event_discriminator::CANCEL_WITHDRAW_REQUEST => {
            Some(BondsEvent::CancelWithdrawRequest(CancelWithdrawRequestEvent {
                withdraw_request: cursor.pubkey()?,
                bond: cursor.pubkey()?,
                returned_rent: cursor.u64()?,
            }))
        }
        event_discriminator::CLAIM_WITHDRAW_REQUEST => {
            Some(BondsEvent::ClaimWithdrawRequest(ClaimWithdrawRequestEvent {
                withdraw_request: cursor.pubkey()?,
                bond: cursor.pubkey()?,
                withdrawn_amount: cursor.u64()?,
                remaining_amount: cursor.u64()?,
            }))
        }
        event_discriminator::CLOSE_SETTLEMENT => {
            Some(BondsEvent::CloseSettlement(CloseSettlementEvent {
                settlement: cursor.pubkey()?,
                bond: cursor.pubkey()?,
                rent_collector: cursor.pubkey()?,
            }))
        }
        _ => None,
    }
}

/// Extract all bonds events from a transaction's log messages.
pub fn parse_event_logs(logs: &[String]) -> Vec<BondsEvent> {
    let mut events = Vec::new();
    for line in logs {
        let Some(encoded) = line.strip_prefix(PROGRAM_DATA_PREFIX) else {
            continue;
        };
        let Ok(bytes) = BASE64.decode(encoded) else {
            debug!("Skipping undecodable program data line");
            continue;
        };
        if let Some(event) = decode_event(&bytes) {
            events.push(event);
        }
    }
    events
}
