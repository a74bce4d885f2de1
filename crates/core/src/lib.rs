//! Stakebond Core Types
//!
//! Pure domain logic for the staking-bond settlement client: account state
//! layouts and their binary codec, the stake-account sizing arithmetic, and
//! the claim merkle tree. No network I/O lives in this crate.

pub mod codec;
mod error;
mod merkle;
mod sizing;
mod types;

pub use error::*;
pub use merkle::*;
pub use sizing::*;
pub use types::*;
