//! shade - inclusion proofs and pool state for the Shade privacy pool

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use shade_client::{
    AnyCoordinator, FallbackConfig, MerkleProofResolver, NoCoordinator, PoolChain, ProofSource,
    ResolvedProof, RootConsistency, StarknetRpc, StarknetRpcConfig,
};
use shade_config::ShadeConfig;
use shade_privacy::{Felt, proof_to_contract_format};
use tracing::debug;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "shade")]
#[command(about = "Merkle proofs and pool state for the Shade privacy pool", long_about = None)]
struct Cli {
    /// Config file (default: ./config.toml, then ~/.shade/config.toml)
    #[arg(long, global = true, env = "SHADE_CONFIG")]
    config: Option<PathBuf>,

    /// Network section to use instead of `default_network`
    #[arg(long, global = true)]
    network: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inclusion proof for a deposit commitment
    Proof {
        /// Commitment as 0x-hex or decimal
        commitment: String,

        /// Skip the coordinator and rebuild the tree from chain history
        #[arg(long)]
        local_only: bool,

        /// Print the contract wire format as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the deposit tree and compare its root with the chain
    Root,

    /// Pool counters from `get_pp_stats`
    Stats,

    /// Block until the pool counts at least `count` deposits
    WaitDeposits { count: u64 },

    /// Print a sample config file
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shade_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = cli.command;
    if let Command::Config = command {
        print!("{}", ShadeConfig::generate_sample());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref(), cli.network)?;
    debug!(network = %config.default_network, "Config loaded");
    let chain = StarknetRpc::new(StarknetRpcConfig::from_config(&config)?)?;
    let fallback = FallbackConfig::from_config(&config)?;

    match command {
        Command::Proof {
            commitment,
            local_only,
            json,
        } => {
            let commitment = Felt::parse(&commitment).context("Invalid commitment")?;
            let coordinator = if local_only {
                AnyCoordinator::Disabled(NoCoordinator)
            } else {
                AnyCoordinator::from_config(&config)?
            };

            let resolver = MerkleProofResolver::new(chain, coordinator, fallback);
            let resolved = resolver.resolve(&commitment).await?;
            print_proof(&resolved, json)?;
        }
        Command::Root => {
            let resolver = MerkleProofResolver::new(chain, NoCoordinator, fallback);
            let (root, consistency) = resolver.local_root().await?;
            println!("Local root:  {root}");
            print_consistency(&consistency);
        }
        Command::Stats => {
            let stats = chain.pool_stats().await?;
            println!("Network:            {}", chain.network());
            println!("Deposits:           {}", stats.total_deposits);
            println!("Withdrawals:        {}", stats.total_withdrawals);
            println!("Volume deposited:   {}", stats.total_volume_deposited);
            println!("Volume withdrawn:   {}", stats.total_volume_withdrawn);
        }
        Command::WaitDeposits { count } => {
            let resolver = MerkleProofResolver::new(chain, NoCoordinator, fallback);
            let seen = resolver.wait_for_deposit_count(count).await?;
            println!("✅ Pool counts {seen} deposits");
        }
        // printed before any config was loaded
        Command::Config => {}
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>, network: Option<String>) -> Result<ShadeConfig> {
    let mut config = match path {
        Some(path) => ShadeConfig::load_from(path)?,
        None => ShadeConfig::load()?,
    };
    if let Some(network) = network {
        config.default_network = network;
    }
    config
        .active_network()
        .with_context(|| "Add a [networks.<name>] section or pass --network")?;
    Ok(config)
}

fn print_proof(resolved: &ResolvedProof, as_json: bool) -> Result<()> {
    let proof = &resolved.proof;

    if as_json {
        let out = json!({
            "leafIndex": proof.leaf_index,
            "proof": proof_to_contract_format(proof),
            "source": resolved.source,
            "consistency": resolved.consistency,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let source = match resolved.source {
        ProofSource::Coordinator => "coordinator".to_string(),
        ProofSource::LocalReconstruction { cache_hit } => {
            format!("local reconstruction (cache hit: {cache_hit})")
        }
    };
    println!("Leaf:        {}", proof.leaf);
    println!("Leaf index:  {}", proof.leaf_index);
    println!("Root:        {}", proof.root);
    println!("Source:      {source}");
    for (level, (sibling, bit)) in proof
        .path_elements
        .iter()
        .zip(&proof.path_indices)
        .enumerate()
    {
        println!("  [{level:2}] {bit} {sibling}");
    }
    print_consistency(&resolved.consistency);
    Ok(())
}

fn print_consistency(consistency: &RootConsistency) {
    match consistency {
        RootConsistency::Matches => println!("✅ Root matches chain"),
        RootConsistency::Stale { on_chain, .. } => {
            println!("⚠️  On-chain root is {on_chain}; the proof may be stale")
        }
        RootConsistency::Unavailable => println!("⚠️  On-chain root unavailable"),
    }
}
