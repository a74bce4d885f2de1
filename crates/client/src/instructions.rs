//! Instruction discriminators and shared account-meta helpers.

use solana_sdk::pubkey::Pubkey;

/// Anchor instruction discriminators for the staking-bond program.
/// Each is the first 8 bytes of SHA256("global:<instruction_name>").
pub mod discriminator {
    pub const FUND_SETTLEMENT: [u8; 8] = [0xb3, 0x92, 0x71, 0x22, 0x1e, 0x5c, 0x1a, 0x13];
    pub const CLAIM_SETTLEMENT: [u8; 8] = [0x55, 0xd0, 0x49, 0xe5, 0x8f, 0x62, 0x53, 0xd4];
    pub const CLOSE_SETTLEMENT: [u8; 8] = [0x2d, 0xf7, 0x53, 0xb7, 0x18, 0x66, 0x00, 0x44];
    pub const INIT_WITHDRAW_REQUEST: [u8; 8] = [0x8e, 0x1f, 0xde, 0xd7, 0x53, 0x4f, 0x22, 0x31];
    pub const CANCEL_WITHDRAW_REQUEST: [u8; 8] = [0xa7, 0x64, 0x6e, 0x80, 0x71, 0x9a, 0xe0, 0x4d];
    pub const CLAIM_WITHDRAW_REQUEST: [u8; 8] = [0x30, 0xe8, 0x17, 0x34, 0x14, 0x86, 0x7a, 0x76];
}

pub fn stake_program_id() -> Pubkey {
    solana_sdk::stake::program::id()
}

pub fn stake_history_sysvar() -> Pubkey {
    solana_sdk::sysvar::stake_history::id()
}

pub fn clock_sysvar() -> Pubkey {
    solana_sdk::sysvar::clock::id()
}

/// Serialize a merkle proof the way the program expects its `Vec<[u8; 32]>`
/// argument: 4-byte LE length prefix followed by the nodes.
pub fn append_proof(data: &mut Vec<u8>, proof: &[[u8; 32]]) {
    data.extend_from_slice(&(proof.len() as u32).to_le_bytes());
    for node in proof {
        data.extend_from_slice(node);
    }
}
