//! Stakebond Client
//!
//! Solana client for the staking-bond protocol: settlement funding, claim
//! orchestration, and the withdraw-request lifecycle.
//!
//! ## Protocol Flow
//!
//! 1. **Bond**: A validator registers a bond under the protocol config,
//!    keyed by its vote account, and funds it with stake accounts.
//! 2. **Settlement**: Each epoch the operator commits a merkle root over a
//!    batch of claims and creates a Settlement account for it.
//! 3. **Fund Settlement**: Bond-owned stake accounts are applied against
//!    `max_total_claim`; a source account larger than the remaining target
//!    is split so the residue stays independently viable.
//! 4. **Claim Settlement**: Each claimant redeems its leaf with a merkle
//!    proof; redeemed leaves are recorded in a per-settlement bitmap so a
//!    second claim of the same index is rejected.
//! 5. **Withdraw Request**: A bond owner reclaims collateral through a
//!    time-locked ticket: request, wait out the lockup, then claim (or
//!    cancel at any point before the claim completes).
//!
//! All submitted state transitions are authoritative on-chain; this client
//! anticipates them (sizing arithmetic, lockup checks, claim dedup) only to
//! avoid wasted submissions. Mock mode tracks the same state in-memory so
//! the orchestration logic runs without a validator.

mod batch;
mod claims;
mod client;
mod config;
mod events;
mod executor;
mod funding;
mod pda;
mod resolver;
mod withdraw;

pub(crate) mod instructions;

pub use batch::*;
pub use claims::*;
pub use client::*;
pub use config::*;
pub use events::*;
pub use executor::*;
pub use funding::*;
pub use pda::*;
pub use resolver::*;
pub use withdraw::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BondsClientError {
    /// Malformed or unresolvable input address/amount.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stale on-chain state: already funded, already claimed, lockup not
    /// elapsed, request already exists. Often benign for batch drivers.
    #[error("Precondition not met: {0}")]
    Precondition(String),

    /// Signer mismatch, surfaced by the external program's error code.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Expected account absent.
    #[error("Account not found: {0}")]
    NotFound(String),

    /// Transport/RPC failure; retryable with backoff.
    #[error("RPC error: {0}")]
    Network(String),

    /// Dry-run rejected by the external program.
    #[error("Simulation failed: {0}")]
    Simulation(String),

    /// No off-curve bump exists for the seed tuple. Fatal, not retryable.
    #[error("Address derivation failed for {0}")]
    DerivationFailed(String),

    /// Transaction rejected at execution with a definite error.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error(transparent)]
    Codec(#[from] stakebond_core::CoreError),
}

pub type Result<T> = std::result::Result<T, BondsClientError>;
