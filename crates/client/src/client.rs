//! Bonds client for interacting with Solana
//!
//! Supports two modes:
//! - **Mock Mode**: For development/testing without Solana. State is tracked
//!   in-memory and the same orchestration invariants (funding conservation,
//!   claim idempotence, withdraw lockup) are enforced.
//! - **Live Mode**: Actual Solana RPC calls to the deployed bonds program.
//!
//! Every mutating operation reads current state first, builds the
//! instruction through the module builders, and submits through the chunked
//! executor. Benign preconditions (target already satisfied) come back as
//! their own outcome variants, never as errors.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    account::Account,
    pubkey::Pubkey,
    rent::Rent,
    signature::{Keypair, Signature, Signer},
    stake::state::StakeStateV2,
};

use stakebond_core::{
    claim_leaf, codec, BondState, ConfigState, FundingPlan, MerkleProof, MerkleTree,
    SettlementClaimsState, SettlementState, StakeAccountView, WithdrawRequestState,
};

use crate::instructions::{clock_sysvar, discriminator};
use crate::{
    bond_address, bonds_withdrawer_authority, build_claim_settlement,
    build_claim_withdraw_request, build_cancel_withdraw_request, build_fund_settlement,
    build_init_withdraw_request, chunk_instructions, execute_chunk, serialize_chunk_base64,
    settlement_address,
    settlement_claims_address, settlement_staker_authority, withdraw_request_address,
    BondsClientError, BondsContext, ClaimFilter, ClaimRecord, ClaimSettlementArgs,
    ClaimWithdrawOptions, ClaimWithdrawOutcome, ClientConfig, ClientMode, ComputeBudgetConfig,
    ExecutionMode, ExecutionOutcome, FundSettlementOptions, FundSettlementOutcome,
    KnownAccount, PreparedInstruction, Result, WithdrawRequestStatus,
};

/// In-memory ledger for mock mode
#[derive(Debug, Default)]
struct MockState {
    /// Protocol config, set by `add_mock_config`
    config: Option<ConfigState>,
    /// Bonds by address
    bonds: HashMap<Pubkey, BondState>,
    /// Settlements by address
    settlements: HashMap<Pubkey, SettlementState>,
    /// Claim bitmaps by settlement address
    claims: HashMap<Pubkey, SettlementClaimsState>,
    /// Withdraw tickets by address
    withdraw_requests: HashMap<Pubkey, WithdrawRequestState>,
    /// Stake accounts by address
    stake_accounts: HashMap<Pubkey, StakeAccountView>,
    /// Current epoch, advanced manually by tests
    epoch: u64,
    /// Transaction counter for generating mock signatures
    tx_counter: u64,
}

/// Outcome of one funding attempt against a settlement.
#[derive(Debug, Clone)]
pub enum FundSettlementResult {
    /// `lamports_funded` already equals `max_total_claim`; benign no-op
    AlreadyFunded,
    /// The stake account has nothing above the minimal viable floor
    BelowMinimum,
    Funded {
        outcome: ExecutionOutcome,
        /// Lamports this attempt applied toward the target
        applied: u64,
        /// Residual split account, when the source was larger than needed
        split_stake_account: Option<Pubkey>,
    },
}

/// Outcome of one leaf claim.
#[derive(Debug, Clone)]
pub enum ClaimSettlementResult {
    /// The leaf's bit was already set; benign no-op
    AlreadyClaimed,
    Claimed { outcome: ExecutionOutcome },
}

/// Outcome of one withdraw-ticket claim attempt.
#[derive(Debug, Clone)]
pub enum ClaimWithdrawResult {
    /// The ticket's remaining amount is zero
    AlreadySatisfied,
    /// The offered stake account sits at the minimal viable floor
    BelowMinimum,
    Claimed {
        outcome: ExecutionOutcome,
        /// Lamports counted against the ticket by this claim
        withdrawn: u64,
        /// Whether this claim satisfied the ticket in full (the account
        /// is deleted on-chain once satisfied)
        closed: bool,
    },
}

/// Bonds client for on-chain operations
///
/// Abstracts the RPC calls, state reads, and transaction building. In mock
/// mode all operations run against the in-memory ledger.
pub struct BondsClient {
    config: ClientConfig,
    ctx: BondsContext,
    /// Our keypair for signing transactions
    signer_keypair: Option<Arc<Keypair>>,
    /// Our public key
    signer_pubkey: Pubkey,
    /// Solana RPC client (only used in Live mode)
    rpc_client: Option<Arc<RpcClient>>,
    /// Mock state (only used in Mock mode)
    mock_state: Arc<RwLock<MockState>>,
    /// Compute budget prepended to every submitted chunk
    compute_budget: ComputeBudgetConfig,
    /// How submissions are carried out (execute, simulate, print-only)
    execution_mode: ExecutionMode,
}

impl BondsClient {
    /// Create a new client with a public key only (mock mode)
    pub fn new(config: ClientConfig, signer_pubkey: Pubkey) -> Self {
        let ctx = config.context();
        let execution_mode = ExecutionMode::Execute {
            timeout: config.confirmation_timeout,
        };
        Self {
            rpc_client: Self::rpc_for(&config),
            ctx,
            execution_mode,
            config,
            signer_keypair: None,
            signer_pubkey,
            mock_state: Arc::new(RwLock::new(MockState::default())),
            compute_budget: ComputeBudgetConfig::default(),
        }
    }

    /// Create a new client with a keypair for signing (live mode)
    pub fn with_keypair(config: ClientConfig, keypair: Keypair) -> Self {
        let signer_pubkey = keypair.pubkey();
        let mut client = Self::new(config, signer_pubkey);
        client.signer_keypair = Some(Arc::new(keypair));
        client
    }

    /// Create a new client from a 32-byte ed25519 secret key.
    pub fn with_secret_key(config: ClientConfig, secret: &[u8; 32]) -> Result<Self> {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(secret);
        let public_bytes = signing_key.verifying_key().to_bytes();

        let mut full_key = [0u8; 64];
        full_key[..32].copy_from_slice(secret);
        full_key[32..].copy_from_slice(&public_bytes);
        let keypair = Keypair::try_from(full_key.as_ref())
            .map_err(|e| BondsClientError::Validation(format!("invalid ed25519 secret: {e}")))?;

        Ok(Self::with_keypair(config, keypair))
    }

    fn rpc_for(config: &ClientConfig) -> Option<Arc<RpcClient>> {
        if config.mode == ClientMode::Live {
            Some(Arc::new(RpcClient::new_with_commitment(
                config.rpc_url.clone(),
                config.commitment_config(),
            )))
        } else {
            None
        }
    }

    /// Check if running in mock mode
    pub fn is_mock(&self) -> bool {
        self.config.mode == ClientMode::Mock
    }

    /// Get the signer's public key
    pub fn signer_pubkey(&self) -> Pubkey {
        self.signer_pubkey
    }

    /// Derivation context used by this client's builders
    pub fn context(&self) -> &BondsContext {
        &self.ctx
    }

    /// Override the compute budget prepended to submitted chunks
    pub fn set_compute_budget(&mut self, budget: ComputeBudgetConfig) {
        self.compute_budget = budget;
    }

    /// Override how submissions are carried out (simulate, print-only)
    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.execution_mode = mode;
    }

    fn rpc(&self) -> Result<&Arc<RpcClient>> {
        self.rpc_client
            .as_ref()
            .ok_or_else(|| BondsClientError::Network("RPC client not initialized".to_string()))
    }

    fn keypair(&self) -> Result<&Arc<Keypair>> {
        self.signer_keypair
            .as_ref()
            .ok_or_else(|| BondsClientError::Authorization("no signing keypair".to_string()))
    }

    /// Generate mock signature (when already holding lock)
    fn generate_mock_signature(state: &mut MockState) -> Signature {
        state.tx_counter += 1;
        let mut sig = [0u8; 64];
        sig[0..8].copy_from_slice(&state.tx_counter.to_le_bytes());
        sig[8..16].copy_from_slice(b"mocktxn!");
        Signature::from(sig)
    }

    /// Fetch an account, keeping transport failures distinct from a
    /// genuinely absent account.
    async fn fetch_account(&self, address: &Pubkey, what: &str) -> Result<Account> {
        let response = self
            .rpc()?
            .get_account_with_commitment(address, self.config.commitment_config())
            .await
            .map_err(|e| BondsClientError::Network(format!("get_account {address}: {e}")))?;
        response
            .value
            .ok_or_else(|| BondsClientError::NotFound(format!("{what} {address}")))
    }

    /// Submit already-built instructions through the chunked executor.
    async fn submit(&self, prepared: Vec<PreparedInstruction>) -> Result<ExecutionOutcome> {
        let chunks = chunk_instructions(prepared, &self.signer_pubkey, &self.compute_budget)?;

        // Print-only needs neither a signature nor the network; a
        // watch-only client can still render the transactions.
        if let ExecutionMode::PrintOnly = self.execution_mode {
            let mut last = None;
            for chunk in &chunks {
                let encoded = serialize_chunk_base64(chunk, &self.signer_pubkey)?;
                info!(
                    "Prepared transaction ({} instruction(s)):\n{}",
                    chunk.instructions.len(),
                    encoded,
                );
                last = Some(ExecutionOutcome::Printed(encoded));
            }
            return last.ok_or_else(|| {
                BondsClientError::Validation("no instructions to submit".to_string())
            });
        }

        let keypair = self.keypair()?.clone();
        let rpc = self.rpc()?;
        let mut last = None;
        for chunk in &chunks {
            let outcome = execute_chunk(
                rpc,
                chunk,
                &keypair,
                self.config.commitment_config(),
                &self.execution_mode,
            )
            .await?;
            // An ambiguous landing poisons everything after it; stop and
            // let the caller re-read state.
            if let ExecutionOutcome::ConfirmationTimedOut(_) = outcome {
                return Ok(outcome);
            }
            last = Some(outcome);
        }
        last.ok_or_else(|| BondsClientError::Validation("no instructions to submit".to_string()))
    }

    // ---- reads ----------------------------------------------------------

    /// Current epoch (mock: the manually-advanced ledger epoch)
    pub async fn get_current_epoch(&self) -> Result<u64> {
        if self.is_mock() {
            let state = self.mock_state.read().expect("bonds lock poisoned");
            return Ok(state.epoch);
        }
        let info = self
            .rpc()?
            .get_epoch_info()
            .await
            .map_err(|e| BondsClientError::Network(format!("get_epoch_info: {e}")))?;
        Ok(info.epoch)
    }

    /// Read the protocol config account
    pub async fn get_config(&self) -> Result<ConfigState> {
        if self.is_mock() {
            let state = self.mock_state.read().expect("bonds lock poisoned");
            return state
                .config
                .clone()
                .ok_or_else(|| BondsClientError::NotFound("config not initialized".to_string()));
        }
        let account = self.fetch_account(&self.ctx.config_address, "config").await?;
        Ok(codec::decode_config(&account.data)?)
    }

    /// Read the bond registered for a vote account
    pub async fn get_bond(&self, vote_account: &Pubkey) -> Result<(Pubkey, BondState)> {
        let (address, _) = bond_address(&self.ctx.program_id, &self.ctx.config_address, vote_account)?;
        if self.is_mock() {
            let state = self.mock_state.read().expect("bonds lock poisoned");
            let bond = state
                .bonds
                .get(&address)
                .cloned()
                .ok_or_else(|| BondsClientError::NotFound(format!("bond {address}")))?;
            return Ok((address, bond));
        }
        let account = self.fetch_account(&address, "bond").await?;
        Ok((address, codec::decode_bond(&account.data)?))
    }

    /// Read a settlement account
    pub async fn get_settlement(&self, address: &Pubkey) -> Result<SettlementState> {
        if self.is_mock() {
            let state = self.mock_state.read().expect("bonds lock poisoned");
            return state
                .settlements
                .get(address)
                .cloned()
                .ok_or_else(|| BondsClientError::NotFound(format!("settlement {address}")));
        }
        let account = self.fetch_account(address, "settlement").await?;
        Ok(codec::decode_settlement(&account.data)?)
    }

    /// Read a settlement's claim bitmap
    pub async fn get_settlement_claims(&self, settlement: &Pubkey) -> Result<SettlementClaimsState> {
        let (address, _) = settlement_claims_address(&self.ctx.program_id, settlement)?;
        if self.is_mock() {
            let state = self.mock_state.read().expect("bonds lock poisoned");
            return state
                .claims
                .get(settlement)
                .cloned()
                .ok_or_else(|| BondsClientError::NotFound(format!("settlement claims {address}")));
        }
        let account = self.fetch_account(&address, "settlement claims").await?;
        Ok(codec::decode_settlement_claims(&account.data)?)
    }

    /// Read the live withdraw ticket for a vote account, if one exists.
    /// Terminal tickets are deleted on-chain and read back as `None`.
    pub async fn get_withdraw_request(
        &self,
        vote_account: &Pubkey,
    ) -> Result<Option<WithdrawRequestState>> {
        let (bond, _) = bond_address(&self.ctx.program_id, &self.ctx.config_address, vote_account)?;
        let (address, _) = withdraw_request_address(&self.ctx.program_id, &bond)?;
        if self.is_mock() {
            let state = self.mock_state.read().expect("bonds lock poisoned");
            return Ok(state.withdraw_requests.get(&address).cloned());
        }
        let response = self
            .rpc()?
            .get_account_with_commitment(&address, self.config.commitment_config())
            .await
            .map_err(|e| BondsClientError::Network(format!("get_account {address}: {e}")))?;
        match response.value {
            Some(account) => Ok(Some(codec::decode_withdraw_request(&account.data)?)),
            None => Ok(None),
        }
    }

    /// Where the bond's withdraw ticket stands at the current epoch
    pub async fn get_withdraw_request_status(
        &self,
        vote_account: &Pubkey,
    ) -> Result<WithdrawRequestStatus> {
        let config = self.get_config().await?;
        let epoch = self.get_current_epoch().await?;
        let request = self.get_withdraw_request(vote_account).await?;
        Ok(crate::withdraw_request_status(
            request.as_ref(),
            epoch,
            config.withdraw_lockup_epochs,
        ))
    }

    /// Lamport balance of a stake account
    pub async fn get_stake_account_lamports(&self, address: &Pubkey) -> Result<u64> {
        if self.is_mock() {
            let state = self.mock_state.read().expect("bonds lock poisoned");
            return state
                .stake_accounts
                .get(address)
                .map(|view| view.lamports)
                .ok_or_else(|| BondsClientError::NotFound(format!("stake account {address}")));
        }
        let account = self.fetch_account(address, "stake account").await?;
        Ok(account.lamports)
    }

    /// Minimal viable stake-account size: rent-exempt minimum for the stake
    /// layout plus the config's minimum delegation.
    pub async fn minimal_stake_lamports(&self) -> Result<u64> {
        let config = self.get_config().await?;
        let rent_exempt = if self.is_mock() {
            Rent::default().minimum_balance(StakeStateV2::size_of())
        } else {
            self.rpc()?
                .get_minimum_balance_for_rent_exemption(StakeStateV2::size_of())
                .await
                .map_err(|e| BondsClientError::Network(format!("rent exemption: {e}")))?
        };
        Ok(rent_exempt + config.minimum_stake_lamports)
    }

    fn ensure_not_paused(config: &ConfigState) -> Result<()> {
        if config.paused {
            return Err(BondsClientError::Precondition(
                "program is paused".to_string(),
            ));
        }
        Ok(())
    }

    // ---- settlement funding ---------------------------------------------

    /// Fund a settlement from one bond-owned stake account. The sizing
    /// decision (consume vs split vs refuse) is taken here from freshly
    /// read state; the program re-checks it authoritatively.
    pub async fn fund_settlement(
        &self,
        settlement_address: &Pubkey,
        stake_account: &Pubkey,
        options: &FundSettlementOptions,
    ) -> Result<FundSettlementResult> {
        let config = self.get_config().await?;
        Self::ensure_not_paused(&config)?;
        let settlement = self.get_settlement(settlement_address).await?;
        let epoch = self.get_current_epoch().await?;
        if settlement.is_expired(epoch, config.epochs_to_claim_settlement) {
            return Err(BondsClientError::Precondition(format!(
                "settlement expired at epoch {}",
                settlement.epoch_created_for + config.epochs_to_claim_settlement,
            )));
        }
        let stake_lamports = self.get_stake_account_lamports(stake_account).await?;
        let minimal = self.minimal_stake_lamports().await?;

        let built = build_fund_settlement(
            &self.ctx,
            settlement_address,
            &settlement,
            stake_account,
            stake_lamports,
            minimal,
            &self.signer_pubkey,
            options,
        )?;
        let built = match built {
            FundSettlementOutcome::AlreadyFunded => {
                info!(
                    "Settlement {} already fully funded ({} lamports)",
                    settlement_address, settlement.lamports_funded,
                );
                return Ok(FundSettlementResult::AlreadyFunded);
            }
            FundSettlementOutcome::BelowMinimum => {
                info!(
                    "Stake account {} below minimal viable size ({} <= {})",
                    stake_account, stake_lamports, minimal,
                );
                return Ok(FundSettlementResult::BelowMinimum);
            }
            FundSettlementOutcome::Built(built) => built,
        };
        let applied = built.plan.amount_applied();
        let split_pubkey = built.split_stake_account.as_ref().map(|kp| kp.pubkey());

        if self.is_mock() {
            let mut state = self.mock_state.write().expect("bonds lock poisoned");
            let sig = Self::generate_mock_signature(&mut state);
            self.apply_mock_funding(
                &mut state,
                settlement_address,
                stake_account,
                split_pubkey,
                &built.plan,
                minimal,
                options,
            )?;
            info!(
                "[MOCK] Funded settlement {} with {} lamports from {} (plan: {:?})",
                settlement_address, applied, stake_account, built.plan,
            );
            return Ok(FundSettlementResult::Funded {
                outcome: ExecutionOutcome::Confirmed(sig),
                applied,
                split_stake_account: split_pubkey,
            });
        }

        let signers: Vec<Arc<Keypair>> = built.split_stake_account.into_iter().collect();
        let prepared = PreparedInstruction::with_signers(built.instruction, signers);
        let outcome = self.submit(vec![prepared]).await?;
        Ok(FundSettlementResult::Funded {
            outcome,
            applied,
            split_stake_account: split_pubkey,
        })
    }

    /// Mutate the mock ledger for a funding plan. Conservation is enforced
    /// here: `lamports_funded` never exceeds `max_total_claim`.
    #[allow(clippy::too_many_arguments)]
    fn apply_mock_funding(
        &self,
        state: &mut MockState,
        settlement_address: &Pubkey,
        stake_account: &Pubkey,
        split_address: Option<Pubkey>,
        plan: &FundingPlan,
        minimal: u64,
        options: &FundSettlementOptions,
    ) -> Result<()> {
        let (staker_authority, _) =
            settlement_staker_authority(&self.ctx.program_id, settlement_address)?;
        let (withdrawer_authority, _) =
            bonds_withdrawer_authority(&self.ctx.program_id, &self.ctx.config_address)?;
        {
            let settlement = state.settlements.get_mut(settlement_address).ok_or_else(|| {
                BondsClientError::NotFound(format!("settlement {settlement_address}"))
            })?;
            settlement.lamports_funded =
                (settlement.lamports_funded + plan.amount_applied()).min(settlement.max_total_claim);
            if plan.is_split() {
                // Split account rent comes out of the residual and is owed
                // back to the collector once the account closes.
                let resolved = options.resolve(&self.signer_pubkey);
                settlement.split_rent_collector = Some(resolved.split_rent_collector.to_bytes());
                settlement.split_rent_amount = minimal;
            }
        }

        match *plan {
            FundingPlan::Split { applied, residual } => {
                let split_view = StakeAccountView {
                    lamports: residual - minimal,
                    staker: withdrawer_authority.to_bytes(),
                    withdrawer: withdrawer_authority.to_bytes(),
                    delegated_vote_account: None,
                    activation_epoch: state.epoch,
                    deactivation_epoch: u64::MAX,
                };
                let split_address = split_address.unwrap_or_else(Pubkey::new_unique);
                state.stake_accounts.insert(split_address, split_view);
                if let Some(source) = state.stake_accounts.get_mut(stake_account) {
                    source.lamports = applied;
                    source.staker = staker_authority.to_bytes();
                }
            }
            FundingPlan::ConsumeAll { .. } => {
                if let Some(source) = state.stake_accounts.get_mut(stake_account) {
                    source.staker = staker_authority.to_bytes();
                }
            }
            FundingPlan::AlreadySatisfied | FundingPlan::BelowMinimum => {}
        }
        Ok(())
    }

    // ---- claims ---------------------------------------------------------

    /// Redeem one merkle leaf against a settlement.
    pub async fn claim_settlement(&self, args: &ClaimSettlementArgs) -> Result<ClaimSettlementResult> {
        let config = self.get_config().await?;
        Self::ensure_not_paused(&config)?;
        let settlement = self.get_settlement(&args.settlement).await?;
        let epoch = self.get_current_epoch().await?;
        if settlement.is_expired(epoch, config.epochs_to_claim_settlement) {
            return Err(BondsClientError::Precondition(format!(
                "settlement expired at epoch {}",
                settlement.epoch_created_for + config.epochs_to_claim_settlement,
            )));
        }

        // Pre-check the proof locally; wrong proofs never reach submission.
        let leaf = claim_leaf(
            &args.stake_authority.to_bytes(),
            &args.withdraw_authority.to_bytes(),
            args.claim_amount,
            args.leaf_index,
        );
        let proof = MerkleProof {
            siblings: args.merkle_proof.clone(),
            leaf_index: args.leaf_index,
        };
        if !MerkleTree::verify(&settlement.merkle_root, &leaf, &proof) {
            return Err(BondsClientError::Validation(format!(
                "merkle proof verification failed for leaf {}",
                args.leaf_index,
            )));
        }

        let built = build_claim_settlement(&self.ctx, args)?;

        if self.is_mock() {
            let mut state = self.mock_state.write().expect("bonds lock poisoned");
            let settlement_state = state
                .settlements
                .get(&args.settlement)
                .cloned()
                .ok_or_else(|| BondsClientError::NotFound(format!("settlement {}", args.settlement)))?;
            // Dedup first: a repeated claim is benign even once the
            // settlement is fully claimed out.
            let already_claimed = state
                .claims
                .get(&args.settlement)
                .map(|claims| claims.is_set(args.leaf_index))
                .unwrap_or(false);
            if already_claimed {
                info!(
                    "[MOCK] Claim {} of settlement {} already redeemed",
                    args.leaf_index, args.settlement,
                );
                return Ok(ClaimSettlementResult::AlreadyClaimed);
            }
            if settlement_state.lamports_claimed + args.claim_amount
                > settlement_state.lamports_funded
            {
                return Err(BondsClientError::Precondition(format!(
                    "claim exceeds funded amount ({} + {} > {})",
                    settlement_state.lamports_claimed,
                    args.claim_amount,
                    settlement_state.lamports_funded,
                )));
            }
            let claims = state
                .claims
                .entry(args.settlement)
                .or_insert_with(|| {
                    SettlementClaimsState::new_empty(
                        args.settlement.to_bytes(),
                        settlement_state.max_merkle_nodes,
                    )
                });
            claims.set(args.leaf_index)?;
            if let Some(settlement) = state.settlements.get_mut(&args.settlement) {
                settlement.lamports_claimed += args.claim_amount;
                settlement.merkle_nodes_claimed += 1;
            }
            if let Some(source) = state.stake_accounts.get_mut(&args.source_stake_account) {
                source.lamports = source.lamports.saturating_sub(args.claim_amount);
            }
            if let Some(dest) = state.stake_accounts.get_mut(&args.destination_stake_account) {
                dest.lamports += args.claim_amount;
            }
            let sig = Self::generate_mock_signature(&mut state);
            info!(
                "[MOCK] Claimed leaf {} of settlement {} for {} lamports",
                args.leaf_index, args.settlement, args.claim_amount,
            );
            return Ok(ClaimSettlementResult::Claimed {
                outcome: ExecutionOutcome::Confirmed(sig),
            });
        }

        // Advisory dedup read; the program enforces it authoritatively.
        if self.is_claimed(&args.settlement, args.leaf_index).await? {
            info!(
                "Claim {} of settlement {} already redeemed",
                args.leaf_index, args.settlement,
            );
            return Ok(ClaimSettlementResult::AlreadyClaimed);
        }
        let outcome = self
            .submit(vec![PreparedInstruction::new(built.instruction)])
            .await?;
        Ok(ClaimSettlementResult::Claimed { outcome })
    }

    /// Whether leaf `index` of a settlement has been redeemed. Advisory;
    /// the submission-time check is authoritative.
    pub async fn is_claimed(&self, settlement: &Pubkey, index: u64) -> Result<bool> {
        match self.get_settlement_claims(settlement).await {
            Ok(claims) => Ok(claims.is_set(index)),
            Err(BondsClientError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Enumerate redeemed claims matching a filter, joining each
    /// settlement through its bond for vote-account filtering.
    pub async fn find_claims(&self, filter: &ClaimFilter) -> Result<Vec<ClaimRecord>> {
        let (settlements, bonds, claims) = if self.is_mock() {
            let state = self.mock_state.read().expect("bonds lock poisoned");
            (
                state.settlements.clone(),
                state.bonds.clone(),
                state.claims.clone(),
            )
        } else {
            self.scan_program_accounts().await?
        };

        let mut records = Vec::new();
        for (settlement_address, claim_state) in &claims {
            let Some(settlement) = settlements.get(settlement_address) else {
                continue;
            };
            let bond_address = Pubkey::new_from_array(settlement.bond);
            let Some(bond) = bonds.get(&bond_address) else {
                continue;
            };
            for index in 0..claim_state.max_records {
                if !claim_state.is_set(index) {
                    continue;
                }
                let record = ClaimRecord {
                    settlement: *settlement_address,
                    bond: bond_address,
                    vote_account: Pubkey::new_from_array(bond.vote_account),
                    leaf_index: index,
                };
                if filter.matches(&record) {
                    records.push(record);
                }
            }
        }
        records.sort_by_key(|r| (r.settlement, r.leaf_index));
        debug!("find_claims matched {} record(s)", records.len());
        Ok(records)
    }

    /// One pass over the program's accounts, classified by discriminator.
    #[allow(clippy::type_complexity)]
    async fn scan_program_accounts(
        &self,
    ) -> Result<(
        HashMap<Pubkey, SettlementState>,
        HashMap<Pubkey, BondState>,
        HashMap<Pubkey, SettlementClaimsState>,
    )> {
        let accounts = self
            .rpc()?
            .get_program_accounts(&self.ctx.program_id)
            .await
            .map_err(|e| BondsClientError::Network(format!("get_program_accounts: {e}")))?;

        let mut settlements = HashMap::new();
        let mut bonds = HashMap::new();
        let mut claims = HashMap::new();
        for (address, account) in accounts {
            match crate::resolve_account(&account.owner, &self.ctx.program_id, &account.data) {
                KnownAccount::Settlement(state) => {
                    settlements.insert(address, state);
                }
                KnownAccount::Bond(state) => {
                    bonds.insert(address, state);
                }
                KnownAccount::SettlementClaims(state) => {
                    // Claims are keyed by their settlement, not their own
                    // address, so the join below stays uniform.
                    claims.insert(Pubkey::new_from_array(state.settlement), state);
                }
                _ => {}
            }
        }
        Ok((settlements, bonds, claims))
    }

    // ---- withdraw lifecycle ---------------------------------------------

    /// Open a withdraw ticket for a bond. Rejected while another ticket is
    /// live for the same bond.
    pub async fn init_withdraw_request(
        &self,
        vote_account: &Pubkey,
        amount: u64,
    ) -> Result<ExecutionOutcome> {
        let config = self.get_config().await?;
        Self::ensure_not_paused(&config)?;
        let built = build_init_withdraw_request(
            &self.ctx,
            vote_account,
            amount,
            &self.signer_pubkey,
            None,
            None,
        )?;

        if self.is_mock() {
            let (bond, _) =
                bond_address(&self.ctx.program_id, &self.ctx.config_address, vote_account)?;
            let (_, bump) = withdraw_request_address(&self.ctx.program_id, &bond)?;
            let mut state = self.mock_state.write().expect("bonds lock poisoned");
            if !state.bonds.contains_key(&bond) {
                return Err(BondsClientError::NotFound(format!("bond {bond}")));
            }
            if state.withdraw_requests.contains_key(&built.withdraw_request) {
                return Err(BondsClientError::Precondition(
                    "withdraw request already exists".to_string(),
                ));
            }
            let request = WithdrawRequestState {
                vote_account: vote_account.to_bytes(),
                bond: bond.to_bytes(),
                epoch: state.epoch,
                requested_amount: amount,
                withdrawn_amount: 0,
                bump,
            };
            state.withdraw_requests.insert(built.withdraw_request, request);
            let sig = Self::generate_mock_signature(&mut state);
            info!(
                "[MOCK] Withdraw request {} opened for {} lamports (vote {})",
                built.withdraw_request, amount, vote_account,
            );
            return Ok(ExecutionOutcome::Confirmed(sig));
        }

        self.submit(vec![PreparedInstruction::new(built.instruction)])
            .await
    }

    /// Cancel a live withdraw ticket. Permitted in any non-claimed state.
    pub async fn cancel_withdraw_request(&self, vote_account: &Pubkey) -> Result<ExecutionOutcome> {
        let built = build_cancel_withdraw_request(
            &self.ctx,
            vote_account,
            &self.signer_pubkey,
            None,
            None,
        )?;

        if self.is_mock() {
            let mut state = self.mock_state.write().expect("bonds lock poisoned");
            if state.withdraw_requests.remove(&built.withdraw_request).is_none() {
                return Err(BondsClientError::NotFound(
                    "no active withdraw request".to_string(),
                ));
            }
            let sig = Self::generate_mock_signature(&mut state);
            info!("[MOCK] Withdraw request {} cancelled", built.withdraw_request);
            return Ok(ExecutionOutcome::Confirmed(sig));
        }

        self.submit(vec![PreparedInstruction::new(built.instruction)])
            .await
    }

    /// Claim a withdraw ticket into `stake_account` once the lockup has
    /// elapsed. A fully satisfied ticket is deleted.
    pub async fn claim_withdraw_request(
        &self,
        vote_account: &Pubkey,
        stake_account: &Pubkey,
        options: &ClaimWithdrawOptions,
    ) -> Result<ClaimWithdrawResult> {
        let config = self.get_config().await?;
        Self::ensure_not_paused(&config)?;
        let request = self
            .get_withdraw_request(vote_account)
            .await?
            .ok_or_else(|| {
                BondsClientError::NotFound("no active withdraw request".to_string())
            })?;
        let epoch = self.get_current_epoch().await?;
        let stake_lamports = self.get_stake_account_lamports(stake_account).await?;
        let minimal = self.minimal_stake_lamports().await?;

        let built = build_claim_withdraw_request(
            &self.ctx,
            &request,
            epoch,
            config.withdraw_lockup_epochs,
            stake_account,
            stake_lamports,
            minimal,
            &self.signer_pubkey,
            options,
        )?;
        let built = match built {
            ClaimWithdrawOutcome::AlreadySatisfied => {
                info!(
                    "Withdraw request for vote {} already satisfied ({} lamports)",
                    vote_account, request.withdrawn_amount,
                );
                return Ok(ClaimWithdrawResult::AlreadySatisfied);
            }
            ClaimWithdrawOutcome::BelowMinimum => {
                info!(
                    "Stake account {} below minimal viable size ({} <= {})",
                    stake_account, stake_lamports, minimal,
                );
                return Ok(ClaimWithdrawResult::BelowMinimum);
            }
            ClaimWithdrawOutcome::Built(built) => built,
        };

        // ConsumeAll may transfer more than the ticket target; only the
        // target counts against the ticket.
        let remaining = request.remaining_amount();
        let withdrawn = built.plan.amount_applied().min(remaining);
        let closed = withdrawn == remaining;

        if self.is_mock() {
            let (bond, _) =
                bond_address(&self.ctx.program_id, &self.ctx.config_address, vote_account)?;
            let (request_address, _) = withdraw_request_address(&self.ctx.program_id, &bond)?;
            let (withdrawer_authority, _) =
                bonds_withdrawer_authority(&self.ctx.program_id, &self.ctx.config_address)?;
            let withdrawer = options.withdrawer.unwrap_or(self.signer_pubkey);

            let mut state = self.mock_state.write().expect("bonds lock poisoned");
            if closed {
                state.withdraw_requests.remove(&request_address);
            } else if let Some(entry) = state.withdraw_requests.get_mut(&request_address) {
                entry.withdrawn_amount += withdrawn;
            }
            if let FundingPlan::Split { applied, residual } = built.plan {
                // Residual stays bond-owned under the protocol authority.
                let split_view = StakeAccountView {
                    lamports: residual,
                    staker: withdrawer_authority.to_bytes(),
                    withdrawer: withdrawer_authority.to_bytes(),
                    delegated_vote_account: Some(vote_account.to_bytes()),
                    activation_epoch: state.epoch,
                    deactivation_epoch: u64::MAX,
                };
                state.stake_accounts.insert(Pubkey::new_unique(), split_view);
                if let Some(source) = state.stake_accounts.get_mut(stake_account) {
                    source.lamports = applied;
                }
            }
            if let Some(source) = state.stake_accounts.get_mut(stake_account) {
                source.staker = withdrawer.to_bytes();
                source.withdrawer = withdrawer.to_bytes();
            }
            let sig = Self::generate_mock_signature(&mut state);
            info!(
                "[MOCK] Withdraw request {} claimed {} lamports into {} (closed: {})",
                request_address, withdrawn, stake_account, closed,
            );
            return Ok(ClaimWithdrawResult::Claimed {
                outcome: ExecutionOutcome::Confirmed(sig),
                withdrawn,
                closed,
            });
        }

        let signers: Vec<Arc<Keypair>> = built
            .split_stake_account
            .into_iter()
            .map(Arc::new)
            .collect();
        let prepared = PreparedInstruction::with_signers(built.instruction, signers);
        let outcome = self.submit(vec![prepared]).await?;
        Ok(ClaimWithdrawResult::Claimed {
            outcome,
            withdrawn,
            closed,
        })
    }

    // ---- settlement close -----------------------------------------------

    /// Close an expired settlement, returning its rent and any split-rent
    /// owed. Rejected while the claim window is still open.
    pub async fn close_settlement(&self, settlement_address: &Pubkey) -> Result<ExecutionOutcome> {
        let config = self.get_config().await?;
        let settlement = self.get_settlement(settlement_address).await?;
        let epoch = self.get_current_epoch().await?;
        if !settlement.is_expired(epoch, config.epochs_to_claim_settlement) {
            return Err(BondsClientError::Precondition(format!(
                "settlement claim window open until epoch {}",
                settlement.epoch_created_for + config.epochs_to_claim_settlement,
            )));
        }

        if self.is_mock() {
            let mut state = self.mock_state.write().expect("bonds lock poisoned");
            state.settlements.remove(settlement_address);
            state.claims.remove(settlement_address);
            let sig = Self::generate_mock_signature(&mut state);
            info!("[MOCK] Settlement {} closed", settlement_address);
            return Ok(ExecutionOutcome::Confirmed(sig));
        }

        let instruction = self.build_close_settlement(settlement_address, &settlement)?;
        self.submit(vec![PreparedInstruction::new(instruction)]).await
    }

    fn build_close_settlement(
        &self,
        settlement_address: &Pubkey,
        settlement: &SettlementState,
    ) -> Result<solana_sdk::instruction::Instruction> {
        use solana_sdk::instruction::{AccountMeta, Instruction};

        let bond = Pubkey::new_from_array(settlement.bond);
        let rent_collector = Pubkey::new_from_array(settlement.rent_collector);
        let split_rent_collector = settlement
            .split_rent_collector
            .map(Pubkey::new_from_array)
            .unwrap_or(rent_collector);
        let (claims_address, _) =
            settlement_claims_address(&self.ctx.program_id, settlement_address)?;

        Ok(Instruction {
            program_id: self.ctx.program_id,
            accounts: vec![
                AccountMeta::new_readonly(self.ctx.config_address, false), // config
                AccountMeta::new_readonly(bond, false),                    // bond
                AccountMeta::new(*settlement_address, false),              // settlement (close)
                AccountMeta::new(claims_address, false),                   // claim bitmap (close)
                AccountMeta::new(rent_collector, false),                   // rent destination
                AccountMeta::new(split_rent_collector, false),             // split rent destination
                AccountMeta::new_readonly(clock_sysvar(), false),
            ],
            data: discriminator::CLOSE_SETTLEMENT.to_vec(),
        })
    }

    // ---- mock helpers ---------------------------------------------------

    /// Install the protocol config in the mock ledger
    pub fn add_mock_config(&self, config: ConfigState) {
        let mut state = self.mock_state.write().expect("bonds lock poisoned");
        state.config = Some(config);
        info!("[MOCK] Config installed");
    }

    /// Register a bond for a vote account in the mock ledger; returns the
    /// bond address
    pub fn add_mock_bond(&self, vote_account: &Pubkey, authority: &Pubkey) -> Result<Pubkey> {
        let (address, bump) =
            bond_address(&self.ctx.program_id, &self.ctx.config_address, vote_account)?;
        let mut state = self.mock_state.write().expect("bonds lock poisoned");
        state.bonds.insert(
            address,
            BondState {
                config: self.ctx.config_address.to_bytes(),
                vote_account: vote_account.to_bytes(),
                authority: authority.to_bytes(),
                cpmpe: 0,
                max_stake_wanted: 0,
                bump,
            },
        );
        info!("[MOCK] Added bond {} for vote {}", address, vote_account);
        Ok(address)
    }

    /// Create a settlement under a bond in the mock ledger; returns the
    /// settlement address
    pub fn add_mock_settlement(
        &self,
        vote_account: &Pubkey,
        merkle_root: [u8; 32],
        max_total_claim: u64,
        max_merkle_nodes: u64,
        epoch: u64,
    ) -> Result<Pubkey> {
        let (bond, _) =
            bond_address(&self.ctx.program_id, &self.ctx.config_address, vote_account)?;
        let (address, bump) =
            settlement_address(&self.ctx.program_id, &bond, &merkle_root, epoch)?;
        let (staker_authority, _) = settlement_staker_authority(&self.ctx.program_id, &address)?;
        let mut state = self.mock_state.write().expect("bonds lock poisoned");
        state.settlements.insert(
            address,
            SettlementState {
                bond: bond.to_bytes(),
                staker_authority: staker_authority.to_bytes(),
                merkle_root,
                max_total_claim,
                max_merkle_nodes,
                lamports_funded: 0,
                merkle_nodes_claimed: 0,
                lamports_claimed: 0,
                epoch_created_for: epoch,
                rent_collector: self.signer_pubkey.to_bytes(),
                split_rent_collector: None,
                split_rent_amount: 0,
                bump,
            },
        );
        info!(
            "[MOCK] Added settlement {} (max claim {}, {} nodes, epoch {})",
            address, max_total_claim, max_merkle_nodes, epoch,
        );
        Ok(address)
    }

    /// Add a bond-owned stake account to the mock ledger; returns its
    /// address
    pub fn add_mock_stake_account(&self, lamports: u64) -> Result<Pubkey> {
        let (withdrawer_authority, _) =
            bonds_withdrawer_authority(&self.ctx.program_id, &self.ctx.config_address)?;
        let address = Pubkey::new_unique();
        let mut state = self.mock_state.write().expect("bonds lock poisoned");
        let activation_epoch = state.epoch;
        state.stake_accounts.insert(
            address,
            StakeAccountView {
                lamports,
                staker: withdrawer_authority.to_bytes(),
                withdrawer: withdrawer_authority.to_bytes(),
                delegated_vote_account: None,
                activation_epoch,
                deactivation_epoch: u64::MAX,
            },
        );
        Ok(address)
    }

    /// Set the mock ledger's current epoch
    pub fn set_mock_epoch(&self, epoch: u64) {
        let mut state = self.mock_state.write().expect("bonds lock poisoned");
        state.epoch = epoch;
    }

    /// Advance the mock ledger's current epoch
    pub fn advance_mock_epoch(&self, by: u64) {
        let mut state = self.mock_state.write().expect("bonds lock poisoned");
        state.epoch += by;
        debug!("[MOCK] Epoch advanced to {}", state.epoch);
    }
}
