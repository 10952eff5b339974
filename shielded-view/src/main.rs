//! shielded-view
//!
//! Command-line front end over a JSON wallet snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shielded_view::auction::DutchAuction;
use shielded_view::build::AuthorizationFuture;
use shielded_view::query::{AuctionQuerier, OfflineQuerier, StaticQuerier};
use shielded_view::store::WalletSnapshot;
use shielded_view::{
    AddressIndex, AuctionId, AuctionsRequest, AuthorizeRequest, Collaborators, Custody,
    Ed25519SpendAuthority, EngineConfig, FullViewingKey, MemoryStore, OptimisticBuilder,
    TransactionPlan, ViewService,
};

#[derive(Parser)]
#[command(
    name = "shielded-view",
    about = "Query and build against a local shielded wallet snapshot"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the auctions held by the wallet, one JSON record per line.
    Auctions(AuctionsArgs),
    /// Run the authorization guard on a plan.
    AssertPlan(AssertPlanArgs),
    /// Authorize a plan with a software signer and stream build status.
    Build(BuildArgs),
}

#[derive(Args)]
struct WalletArgs {
    /// Wallet snapshot (JSON).
    #[arg(long)]
    snapshot: PathBuf,
    /// Full viewing key, hex-encoded.
    #[arg(long)]
    fvk: FullViewingKey,
}

#[derive(Args)]
struct AuctionsArgs {
    #[command(flatten)]
    wallet: WalletArgs,
    /// Only consider balances of this account.
    #[arg(long)]
    account: Option<u32>,
    /// Include closed and withdrawn auctions.
    #[arg(long)]
    include_inactive: bool,
    /// Ask the querier for current auction state.
    #[arg(long)]
    query_latest_state: bool,
    /// Live auction states to answer queries from (JSON list of {id, auction}).
    #[arg(long)]
    live_states: Option<PathBuf>,
}

#[derive(Args)]
struct AssertPlanArgs {
    /// Full viewing key, hex-encoded.
    #[arg(long)]
    fvk: FullViewingKey,
    /// Transaction plan (JSON).
    #[arg(long)]
    plan: PathBuf,
}

#[derive(Args)]
struct BuildArgs {
    #[command(flatten)]
    wallet: WalletArgs,
    /// Transaction plan (JSON).
    #[arg(long)]
    plan: PathBuf,
    /// Ed25519 signing key, hex-encoded. A fresh key is generated if omitted.
    #[arg(long)]
    signing_key: Option<String>,
}

#[derive(Deserialize)]
struct LiveState {
    id: AuctionId,
    auction: DutchAuction,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shielded_view=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = EngineConfig::from_env().context("invalid engine configuration")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Auctions(args) => auctions(&config, args).await,
        Commands::AssertPlan(args) => assert_plan(args).await,
        Commands::Build(args) => build(&config, args).await,
    }
}

async fn auctions(config: &EngineConfig, args: AuctionsArgs) -> Result<()> {
    let querier: Arc<dyn AuctionQuerier> = match &args.live_states {
        Some(path) => {
            let states: Vec<LiveState> = read_json(path).await?;
            let querier = StaticQuerier::new();
            for state in states {
                querier.insert(state.id, state.auction).await;
            }
            Arc::new(querier)
        }
        None => Arc::new(OfflineQuerier),
    };
    let service = open_wallet(config, &args.wallet, querier).await?;

    let mut responses = service.auctions(AuctionsRequest {
        account_filter: args.account.map(AddressIndex::account),
        include_inactive: args.include_inactive,
        query_latest_state: args.query_latest_state,
    });
    while let Some(response) = responses.next().await {
        println!("{}", serde_json::to_string(&response?)?);
    }
    Ok(())
}

async fn assert_plan(args: AssertPlanArgs) -> Result<()> {
    let plan: TransactionPlan = read_json(&args.plan).await?;
    shielded_view::assert_valid_authorize_request(Some(&plan), &args.fvk)?;
    println!("plan is valid for authorization");
    Ok(())
}

async fn build(config: &EngineConfig, args: BuildArgs) -> Result<()> {
    let plan: TransactionPlan = read_json(&args.plan).await?;
    let authority = match &args.signing_key {
        Some(encoded) => {
            let mut secret = [0u8; 32];
            hex::decode_to_slice(encoded, &mut secret)
                .context("signing key must be 32 hex-encoded bytes")?;
            Ed25519SpendAuthority::from_bytes(&secret)
        }
        None => Ed25519SpendAuthority::generate(),
    };

    let service = open_wallet(config, &args.wallet, Arc::new(OfflineQuerier)).await?;
    let custody = Custody::new(args.wallet.fvk, authority);
    let request = AuthorizeRequest {
        plan: Some(plan.clone()),
    };
    let authorization: AuthorizationFuture =
        Box::pin(async move { custody.authorize(request).await });

    let mut statuses = service.witness_and_build(Some(plan), Some(authorization));
    while let Some(status) = statuses.next().await {
        println!("{}", serde_json::to_string(&status?)?);
    }
    Ok(())
}

async fn open_wallet(
    config: &EngineConfig,
    wallet: &WalletArgs,
    querier: Arc<dyn AuctionQuerier>,
) -> Result<ViewService> {
    let mut snapshot: WalletSnapshot = read_json(&wallet.snapshot).await?;
    snapshot.tree_depth.get_or_insert(config.tree_depth);
    let store = Arc::new(
        MemoryStore::from_snapshot(snapshot)
            .await
            .context("failed to load wallet snapshot")?,
    );
    Ok(ViewService::new(
        config,
        wallet.fvk,
        Collaborators {
            store: store.clone(),
            balances: store,
            querier,
            builder: Arc::new(OptimisticBuilder::new()),
        },
    ))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
