//! Stakebond CLI
//!
//! Command-line interface for the staking-bond protocol client: inspect
//! protocol accounts, fund settlements, redeem claims, and drive the
//! withdraw-ticket lifecycle.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::read_keypair_file;

use stakebond_client::{
    BondsClient, ClaimFilter, ClaimSettlementArgs, ClaimSettlementResult, ClaimWithdrawOptions,
    ClaimWithdrawResult, ClientConfig, ClientMode, ComputeBudgetConfig, ExecutionMode,
    ExecutionOutcome, FundSettlementOptions, FundSettlementResult,
};

/// Stakebond - staking-bond protocol client
#[derive(Parser)]
#[command(name = "stakebond")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Solana RPC endpoint
    #[arg(long, default_value = "https://api.devnet.solana.com")]
    rpc_url: String,

    /// Bonds program ID
    #[arg(long)]
    program_id: Pubkey,

    /// Protocol config account address
    #[arg(long)]
    config_address: Pubkey,

    /// Path to the signing keypair file
    #[arg(short, long)]
    keypair: Option<PathBuf>,

    /// Commitment level (processed | confirmed | finalized)
    #[arg(long, default_value = "confirmed")]
    commitment: String,

    /// Compute unit limit prepended to each transaction
    #[arg(long)]
    compute_unit_limit: Option<u32>,

    /// Compute unit price in micro-lamports
    #[arg(long)]
    compute_unit_price: Option<u64>,

    /// Dry-run transactions instead of submitting them
    #[arg(long)]
    simulate: bool,

    /// Print base64 transactions instead of submitting them
    #[arg(long, conflicts_with = "simulate")]
    print_only: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the protocol config account
    ShowConfig,

    /// Show the bond registered for a vote account
    ShowBond {
        /// Validator vote account
        vote_account: Pubkey,
    },

    /// Show a settlement and its claim progress
    ShowSettlement {
        /// Settlement account address
        address: Pubkey,
    },

    /// Fund a settlement from a bond-owned stake account
    FundSettlement {
        /// Settlement account address
        settlement: Pubkey,

        /// Source stake account
        stake_account: Pubkey,

        /// Rent payer for a split account (defaults to the signer)
        #[arg(long)]
        rent_payer: Option<Pubkey>,
    },

    /// Redeem one merkle leaf against a settlement
    ClaimSettlement {
        /// Settlement account address
        settlement: Pubkey,

        /// Path to a JSON claim file (amount, leaf index, proof,
        /// authorities, stake accounts)
        claim_file: PathBuf,
    },

    /// List redeemed claims, optionally filtered
    FindClaims {
        /// Restrict to one settlement
        #[arg(long)]
        settlement: Option<Pubkey>,

        /// Restrict to one validator vote account
        #[arg(long)]
        vote_account: Option<Pubkey>,
    },

    /// Open a withdraw ticket for a bond
    InitWithdrawRequest {
        /// Validator vote account
        vote_account: Pubkey,

        /// Lamports to withdraw
        amount: u64,
    },

    /// Cancel a live withdraw ticket
    CancelWithdrawRequest {
        /// Validator vote account
        vote_account: Pubkey,
    },

    /// Claim a withdraw ticket once its lockup has elapsed
    ClaimWithdrawRequest {
        /// Validator vote account
        vote_account: Pubkey,

        /// Bond-owned stake account to hand over
        stake_account: Pubkey,

        /// New withdraw authority (defaults to the signer)
        #[arg(long)]
        withdrawer: Option<Pubkey>,
    },
}

/// On-disk claim description consumed by `claim-settlement`.
#[derive(Deserialize)]
struct ClaimFile {
    claim_amount: u64,
    leaf_index: u64,
    /// Base58-encoded 32-byte proof nodes, leaf to root
    merkle_proof: Vec<String>,
    stake_authority: String,
    withdraw_authority: String,
    source_stake_account: String,
    destination_stake_account: String,
}

fn parse_pubkey(value: &str, what: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).map_err(|e| anyhow!("invalid {what} '{value}': {e}"))
}

fn parse_proof_node(value: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(value)
        .into_vec()
        .map_err(|e| anyhow!("invalid proof node '{value}': {e}"))?;
    bytes
        .try_into()
        .map_err(|_| anyhow!("proof node '{value}' is not 32 bytes"))
}

impl ClaimFile {
    fn into_args(self, settlement: Pubkey) -> Result<ClaimSettlementArgs> {
        Ok(ClaimSettlementArgs {
            settlement,
            claim_amount: self.claim_amount,
            leaf_index: self.leaf_index,
            merkle_proof: self
                .merkle_proof
                .iter()
                .map(|node| parse_proof_node(node))
                .collect::<Result<Vec<_>>>()?,
            stake_authority: parse_pubkey(&self.stake_authority, "stake authority")?,
            withdraw_authority: parse_pubkey(&self.withdraw_authority, "withdraw authority")?,
            source_stake_account: parse_pubkey(&self.source_stake_account, "source stake account")?,
            destination_stake_account: parse_pubkey(
                &self.destination_stake_account,
                "destination stake account",
            )?,
        })
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_client(cli: &Cli) -> Result<BondsClient> {
    let config = ClientConfig {
        mode: ClientMode::Live,
        rpc_url: cli.rpc_url.clone(),
        program_id: cli.program_id,
        config_address: cli.config_address,
        commitment: cli.commitment.clone(),
        ..Default::default()
    };

    let mut client = match &cli.keypair {
        Some(path) => {
            let keypair = read_keypair_file(path)
                .map_err(|e| anyhow!("reading keypair {}: {e}", path.display()))?;
            BondsClient::with_keypair(config, keypair)
        }
        None => BondsClient::new(config, Pubkey::default()),
    };

    if cli.compute_unit_limit.is_some() || cli.compute_unit_price.is_some() {
        client.set_compute_budget(ComputeBudgetConfig {
            unit_limit: cli.compute_unit_limit,
            unit_price_micro_lamports: cli.compute_unit_price,
        });
    }
    if cli.print_only {
        client.set_execution_mode(ExecutionMode::PrintOnly);
    } else if cli.simulate {
        client.set_execution_mode(ExecutionMode::Simulate);
    }
    Ok(client)
}

fn report_outcome(outcome: &ExecutionOutcome) {
    match outcome {
        ExecutionOutcome::Printed(encoded) => println!("{encoded}"),
        ExecutionOutcome::Simulated { units_consumed, .. } => {
            println!(
                "simulation passed ({} compute units)",
                units_consumed
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            );
        }
        ExecutionOutcome::Confirmed(signature) => println!("confirmed: {signature}"),
        ExecutionOutcome::ConfirmationTimedOut(signature) => {
            println!("confirmation timed out (landing ambiguous): {signature}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let client = build_client(&cli)?;

    match cli.command {
        Commands::ShowConfig => {
            let config = client.get_config().await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::ShowBond { vote_account } => {
            let (address, bond) = client.get_bond(&vote_account).await?;
            info!("Bond address: {}", address);
            println!("{}", serde_json::to_string_pretty(&bond)?);
        }
        Commands::ShowSettlement { address } => {
            let settlement = client.get_settlement(&address).await?;
            println!("{}", serde_json::to_string_pretty(&settlement)?);
            if let Ok(claims) = client.get_settlement_claims(&address).await {
                println!(
                    "claims redeemed: {}/{}",
                    claims.count_set(),
                    claims.max_records,
                );
            }
        }
        Commands::FundSettlement {
            settlement,
            stake_account,
            rent_payer,
        } => {
            let options = FundSettlementOptions {
                rent_payer,
                ..Default::default()
            };
            let result = client
                .fund_settlement(&settlement, &stake_account, &options)
                .await?;
            match result {
                FundSettlementResult::AlreadyFunded => println!("already fully funded"),
                FundSettlementResult::BelowMinimum => {
                    println!("stake account below minimal viable size; nothing funded");
                }
                FundSettlementResult::Funded {
                    outcome,
                    applied,
                    split_stake_account,
                } => {
                    println!("applied {applied} lamports");
                    if let Some(split) = split_stake_account {
                        println!("residual split account: {split}");
                    }
                    report_outcome(&outcome);
                }
            }
        }
        Commands::ClaimSettlement {
            settlement,
            claim_file,
        } => {
            let raw = std::fs::read_to_string(&claim_file)
                .with_context(|| format!("reading {}", claim_file.display()))?;
            let parsed: ClaimFile = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", claim_file.display()))?;
            let args = parsed.into_args(settlement)?;
            match client.claim_settlement(&args).await? {
                ClaimSettlementResult::AlreadyClaimed => println!("already redeemed"),
                ClaimSettlementResult::Claimed { outcome } => report_outcome(&outcome),
            }
        }
        Commands::FindClaims {
            settlement,
            vote_account,
        } => {
            let records = client
                .find_claims(&ClaimFilter {
                    settlement,
                    vote_account,
                })
                .await?;
            for record in &records {
                println!(
                    "settlement {} leaf {} (vote {})",
                    record.settlement, record.leaf_index, record.vote_account,
                );
            }
            println!("{} claim(s)", records.len());
        }
        Commands::InitWithdrawRequest {
            vote_account,
            amount,
        } => {
            let outcome = client.init_withdraw_request(&vote_account, amount).await?;
            report_outcome(&outcome);
        }
        Commands::CancelWithdrawRequest { vote_account } => {
            let outcome = client.cancel_withdraw_request(&vote_account).await?;
            report_outcome(&outcome);
        }
        Commands::ClaimWithdrawRequest {
            vote_account,
            stake_account,
            withdrawer,
        } => {
            let options = ClaimWithdrawOptions {
                withdrawer,
                ..Default::default()
            };
            let result = client
                .claim_withdraw_request(&vote_account, &stake_account, &options)
                .await?;
            match result {
                ClaimWithdrawResult::AlreadySatisfied => println!("request already satisfied"),
                ClaimWithdrawResult::BelowMinimum => {
                    println!("stake account below minimal viable size; nothing withdrawn");
                }
                ClaimWithdrawResult::Claimed {
                    outcome,
                    withdrawn,
                    closed,
                } => {
                    println!("withdrew {withdrawn} lamports (ticket closed: {closed})");
                    report_outcome(&outcome);
                }
            }
        }
    }

    Ok(())
}
