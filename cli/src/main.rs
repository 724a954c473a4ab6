//! Process entry point (§6: CLI surface, out of core scope but carried as
//! ambient plumbing). Parses arguments, loads the JSON config object,
//! installs logging, builds (or would otherwise load) genesis, and hands
//! everything to `obscura-node`'s composition root. This crate owns
//! process lifetime; it does not implement any consensus logic itself.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info};

use obscura_node::{Node, NodeConfig};

#[derive(Parser)]
#[command(name = "obscura")]
#[command(about = "Obscura blockchain node", version = "0.6.6-beta")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full node: peer discovery, header sync, mempool, block
    /// acceptance.
    Node {
        /// Path to the JSON config object (§6).
        #[arg(long, default_value = "config.json")]
        config: String,
    },
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Node { config } => run_node(&config),
    }
}

fn run_node(config_path: &str) {
    let raw = std::fs::read_to_string(config_path).unwrap_or_else(|e| {
        error!("could not read config file {config_path}: {e}");
        process::exit(1);
    });
    let config = NodeConfig::from_json_str(&raw).unwrap_or_else(|e| {
        error!("could not parse config file {config_path}: {e}");
        process::exit(1);
    });

    // A real deployment loads its genesis from the (out-of-scope) persisted
    // block store once one exists; absent that, this is the first-ever
    // bootstrap of the network described by `config`.
    let genesis = config.genesis_block(obscura_core::now_ms());

    let node = Node::start(&config, genesis).unwrap_or_else(|status| {
        // §7: local corruption / inability to construct a trustworthy chain
        // state is fatal — the node must not serve a possibly-wrong chain.
        error!("failed to start node: {status:?}");
        process::exit(1);
    });
    info!("obscura node listening on {} (network: {})", config.bind_address(), config.network);

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("failed to install Ctrl-C handler");

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    info!("shutting down, height={}", node.height());
    node.shutdown();
}
