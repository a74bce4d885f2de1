//! Stake-account sizing arithmetic.
//!
//! Decides whether a contributed stake account must be split, fully
//! consumed, or left alone, given the remaining funding/withdrawal target
//! and the minimal viable stake-account size (rent-exempt minimum plus the
//! config's minimum stake). The ledger program enforces the same rules
//! authoritatively; this arithmetic must anticipate them exactly so a
//! submission never strands an unusable residue.

/// Outcome of sizing one stake account against a remaining target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingPlan {
    /// Target is already met; build no instruction.
    AlreadySatisfied,
    /// Account sits at or below the minimal viable floor; it contributes
    /// nothing and is never split.
    BelowMinimum,
    /// Move the whole account. `applied` may exceed the target when
    /// splitting would leave a residue under the floor; the overshoot is
    /// benign and capped by the ledger's own accounting.
    ConsumeAll { applied: u64 },
    /// Split off `residual` into a new stake account and apply exactly
    /// `applied` toward the target.
    Split { applied: u64, residual: u64 },
}

impl FundingPlan {
    /// Lamports this plan applies toward the target.
    pub fn amount_applied(&self) -> u64 {
        match self {
            FundingPlan::AlreadySatisfied | FundingPlan::BelowMinimum => 0,
            FundingPlan::ConsumeAll { applied } => *applied,
            FundingPlan::Split { applied, .. } => *applied,
        }
    }

    pub fn is_split(&self) -> bool {
        matches!(self, FundingPlan::Split { .. })
    }
}

/// Size `account_lamports` against `target`, where `minimal_viable` is the
/// smallest stake account the ledger will keep alive.
///
/// Decision table:
/// - `target == 0`: already satisfied.
/// - `L <= M`: the account cannot be reduced; contributes 0, never split.
/// - `L <= T`: consume the entire account.
/// - `L - T >= M`: split, leaving the residual independently viable.
/// - otherwise: consume all, over-applying by `L - T` rather than leaving
///   an unusable residue.
pub fn plan_funding(account_lamports: u64, target: u64, minimal_viable: u64) -> FundingPlan {
    if target == 0 {
        return FundingPlan::AlreadySatisfied;
    }
    if account_lamports <= minimal_viable {
        return FundingPlan::BelowMinimum;
    }
    if account_lamports <= target {
        return FundingPlan::ConsumeAll {
            applied: account_lamports,
        };
    }
    let residual = account_lamports - target;
    if residual >= minimal_viable {
        FundingPlan::Split {
            applied: target,
            residual,
        }
    } else {
        FundingPlan::ConsumeAll {
            applied: account_lamports,
        }
    }
}
