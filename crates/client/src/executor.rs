//! Single-chunk execution.
//!
//! Three modes: print-only (serialize, no network), simulate (dry run), and
//! execute (submit, then poll for confirmation up to a timeout). A
//! confirmation timeout is ambiguous (the transaction may still land) and
//! is reported as its own outcome, never as a definite failure.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::InstructionError;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::{Transaction, TransactionError};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::{BondsClientError, Result, TransactionChunk};

const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How a chunk is carried out.
#[derive(Debug, Clone)]
pub enum ExecutionMode {
    /// Serialize and return the transaction; no network I/O
    PrintOnly,
    /// Dry-run against the program without committing
    Simulate,
    /// Submit, then wait for confirmation up to `timeout`
    Execute { timeout: Duration },
}

#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// Base64-encoded unsigned transaction
    Printed(String),
    Simulated {
        units_consumed: Option<u64>,
        logs: Vec<String>,
    },
    Confirmed(Signature),
    /// The confirmation wait ran out; the transaction may or may not have
    /// landed and the caller must re-read state before acting again
    ConfirmationTimedOut(Signature),
}

/// Serialize a chunk as an unsigned base64 transaction (print-only mode).
pub fn serialize_chunk_base64(chunk: &TransactionChunk, payer: &Pubkey) -> Result<String> {
    let message = Message::new(&chunk.instructions, Some(payer));
    let draft = Transaction::new_unsigned(message);
    let bytes = bincode::serialize(&draft)
        .map_err(|e| BondsClientError::Validation(format!("transaction serialization: {e}")))?;
    Ok(BASE64.encode(bytes))
}

/// Carry out one chunk according to `mode`.
pub async fn execute_chunk(
    rpc: &RpcClient,
    chunk: &TransactionChunk,
    payer: &Keypair,
    commitment: CommitmentConfig,
    mode: &ExecutionMode,
) -> Result<ExecutionOutcome> {
    if let ExecutionMode::PrintOnly = mode {
        let encoded = serialize_chunk_base64(chunk, &payer.pubkey())?;
        info!("Prepared transaction ({} instruction(s)):\n{}", chunk.instructions.len(), encoded);
        return Ok(ExecutionOutcome::Printed(encoded));
    }

    let blockhash = rpc
        .get_latest_blockhash()
        .await
        .map_err(|e| BondsClientError::Network(format!("get_latest_blockhash: {e}")))?;

    let mut signers: Vec<&dyn Signer> = vec![payer];
    for signer in &chunk.signers {
        signers.push(signer.as_ref());
    }
    let tx = Transaction::new_signed_with_payer(
        &chunk.instructions,
        Some(&payer.pubkey()),
        &signers,
        blockhash,
    );

    match mode {
        ExecutionMode::PrintOnly => unreachable!("handled above"),
        ExecutionMode::Simulate => {
            let response = rpc
                .simulate_transaction(&tx)
                .await
                .map_err(|e| BondsClientError::Network(format!("simulate_transaction: {e}")))?;
            let result = response.value;
            let logs = result.logs.unwrap_or_default();
            if let Some(err) = result.err {
                return Err(BondsClientError::Simulation(format!(
                    "{err}; logs: {}",
                    logs.join("\n"),
                )));
            }
            info!(
                "Simulation passed ({} compute units)",
                result
                    .units_consumed
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            );
            Ok(ExecutionOutcome::Simulated {
                units_consumed: result.units_consumed,
                logs,
            })
        }
        ExecutionMode::Execute { timeout } => {
            let signature = rpc
                .send_transaction(&tx)
                .await
                .map_err(|e| BondsClientError::TransactionFailed(e.to_string()))?;
            info!("Transaction sent: {}", signature);

            let deadline = Instant::now() + *timeout;
            loop {
                let statuses = rpc
                    .get_signature_statuses(&[signature])
                    .await
                    .map_err(|e| BondsClientError::Network(format!("get_signature_statuses: {e}")))?;
                if let Some(status) = statuses.value.first().and_then(|s| s.as_ref()) {
                    if let Some(err) = &status.err {
                        return Err(classify_transaction_error(err.clone()));
                    }
                    if status.satisfies_commitment(commitment) {
                        info!("Transaction confirmed: {}", signature);
                        return Ok(ExecutionOutcome::Confirmed(signature));
                    }
                }
                if Instant::now() >= deadline {
                    warn!(
                        "Confirmation wait timed out for {}; landing is ambiguous",
                        signature,
                    );
                    return Ok(ExecutionOutcome::ConfirmationTimedOut(signature));
                }
                sleep(CONFIRMATION_POLL_INTERVAL).await;
            }
        }
    }
}

/// Map a definite on-chain rejection into the client taxonomy.
pub fn classify_transaction_error(err: TransactionError) -> BondsClientError {
    match err {
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
            classify_program_error(code)
        }
        other => BondsClientError::TransactionFailed(other.to_string()),
    }
}

/// Fixed table mapping the bonds program's custom error codes.
pub fn classify_program_error(code: u32) -> BondsClientError {
    match code {
        6000 => BondsClientError::Authorization("invalid admin authority".to_string()),
        6001 => BondsClientError::Authorization("invalid operator authority".to_string()),
        6002 => BondsClientError::Authorization("invalid bond authority".to_string()),
        6003 => BondsClientError::Precondition("program is paused".to_string()),
        6010 => BondsClientError::Precondition("settlement already fully funded".to_string()),
        6011 => BondsClientError::Precondition("settlement expired".to_string()),
        6012 => BondsClientError::Precondition("settlement not funded for this claim".to_string()),
        6020 => BondsClientError::Precondition("claim already redeemed".to_string()),
        6021 => BondsClientError::Validation("merkle proof verification failed".to_string()),
        6022 => BondsClientError::Precondition("claim exceeds funded amount".to_string()),
        6030 => BondsClientError::Precondition("withdraw request already exists".to_string()),
        6031 => BondsClientError::Precondition("withdraw lockup not elapsed".to_string()),
        6032 => BondsClientError::NotFound("no active withdraw request".to_string()),
        other => BondsClientError::TransactionFailed(format!("program error code {other}")),
    }
}

/// Benign preconditions (target already satisfied) should not abort a
/// larger batch.
pub fn is_benign_precondition(error: &BondsClientError) -> bool {
    matches!(
        error,
        BondsClientError::Precondition(message)
            if message.contains("already fully funded") || message.contains("already redeemed")
    )
}
