//! Transaction batching.
//!
//! Packs an ordered instruction list into chunks that each fit a single
//! transaction, preserving instruction order within and across chunks and
//! deduplicating the extra signers each chunk needs. Chunks are
//! independently atomic; there is no atomicity across them.

use std::sync::Arc;

use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::Transaction;
use tracing::debug;

use crate::{BondsClientError, Result};

/// One instruction plus the signers it requires beyond the fee payer.
pub struct PreparedInstruction {
    pub instruction: Instruction,
    pub signers: Vec<Arc<Keypair>>,
}

impl PreparedInstruction {
    pub fn new(instruction: Instruction) -> Self {
        Self {
            instruction,
            signers: Vec::new(),
        }
    }

    pub fn with_signers(instruction: Instruction, signers: Vec<Arc<Keypair>>) -> Self {
        Self {
            instruction,
            signers,
        }
    }
}

/// Per-chunk compute budget, prepended when set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeBudgetConfig {
    pub unit_limit: Option<u32>,
    pub unit_price_micro_lamports: Option<u64>,
}

impl ComputeBudgetConfig {
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut instructions = Vec::new();
        if let Some(limit) = self.unit_limit {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(limit));
        }
        if let Some(price) = self.unit_price_micro_lamports {
            instructions.push(ComputeBudgetInstruction::set_compute_unit_price(price));
        }
        instructions
    }
}

/// One atomically-submitted unit.
pub struct TransactionChunk {
    /// Instructions in submission order, compute budget first
    pub instructions: Vec<Instruction>,
    /// Extra signers, deduplicated; the fee payer is not listed
    pub signers: Vec<Arc<Keypair>>,
}

/// Serialized size of a draft transaction carrying these instructions.
fn measured_size(instructions: &[Instruction], payer: &Pubkey) -> Result<usize> {
    let message = Message::new(instructions, Some(payer));
    let draft = Transaction::new_unsigned(message);
    let bytes = bincode::serialize(&draft)
        .map_err(|e| BondsClientError::Validation(format!("transaction serialization: {e}")))?;
    Ok(bytes.len())
}

/// Greedily pack `prepared` into chunks under the wire-packet ceiling.
pub fn chunk_instructions(
    prepared: Vec<PreparedInstruction>,
    payer: &Pubkey,
    budget: &ComputeBudgetConfig,
) -> Result<Vec<TransactionChunk>> {
    let budget_instructions = budget.instructions();
    let mut chunks: Vec<TransactionChunk> = Vec::new();
    let mut current: Vec<PreparedInstruction> = Vec::new();

    let assemble = |pending: &[PreparedInstruction]| -> Vec<Instruction> {
        budget_instructions
            .iter()
            .cloned()
            .chain(pending.iter().map(|p| p.instruction.clone()))
            .collect()
    };

    let close = |pending: &mut Vec<PreparedInstruction>, chunks: &mut Vec<TransactionChunk>| {
        if pending.is_empty() {
            return;
        }
        let instructions = assemble(pending);
        let mut signers: Vec<Arc<Keypair>> = Vec::new();
        for prepared in pending.iter() {
            for signer in &prepared.signers {
                let pubkey = signer.pubkey();
                if pubkey != *payer && !signers.iter().any(|s| s.pubkey() == pubkey) {
                    signers.push(signer.clone());
                }
            }
        }
        chunks.push(TransactionChunk {
            instructions,
            signers,
        });
        pending.clear();
    };

    for prepared in prepared {
        current.push(prepared);
        if measured_size(&assemble(&current), payer)? > PACKET_DATA_SIZE {
            let overflow = current.pop().expect("just pushed");
            if current.is_empty() {
                return Err(BondsClientError::Validation(format!(
                    "single instruction exceeds the {PACKET_DATA_SIZE}-byte transaction ceiling"
                )));
            }
            close(&mut current, &mut chunks);
            current.push(overflow);
            if measured_size(&assemble(&current), payer)? > PACKET_DATA_SIZE {
                return Err(BondsClientError::Validation(format!(
                    "single instruction exceeds the {PACKET_DATA_SIZE}-byte transaction ceiling"
                )));
            }
        }
    }
    close(&mut current, &mut chunks);

    debug!("Packed {} chunk(s)", chunks.len());
    Ok(chunks)
}
