//! CLI commands for the blockchain
//!
//! Implements the command handlers for the CLI interface.

use crate::core::{
    Block, Chain, ChainConfig, ChainValidator, Ledger, MiningStats, Transaction,
    TransactionFactory,
};
use crate::crypto::Secp256k1Provider;
use crate::wallet::Wallet;
use log::{info, warn};
use std::sync::atomic::AtomicBool;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Settings for a demo run
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub config: ChainConfig,
    /// Value of the single genesis output
    pub genesis_value: u64,
    /// Mining threads per block, 1 mines on the calling thread
    pub workers: usize,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            config: ChainConfig::default(),
            genesis_value: 100,
            workers: 1,
        }
    }
}

/// Everything a finished demo run produced
pub struct DemoRun {
    pub chain: Chain,
    pub ledger: Ledger,
    pub coinbase: Wallet,
    pub wallet_a: Wallet,
    pub wallet_b: Wallet,
}

/// Build the demo chain
///
/// Genesis pays `genesis_value` to wallet A. A then sends 40 to B, fails to
/// send 1000, and B sends 20 back. Each step is mined into its own block.
pub fn run_demo(options: &DemoOptions) -> CliResult<DemoRun> {
    let signer = Secp256k1Provider;
    let config = options.config;
    let min_value = config.minimum_transaction_value;
    let factory = TransactionFactory::new();

    let coinbase = Wallet::with_label("coinbase");
    let wallet_a = Wallet::with_label("A");
    let wallet_b = Wallet::with_label("B");
    let mut ledger = Ledger::new();
    let mut chain = Chain::new();

    let mut genesis_tx =
        Transaction::genesis(&coinbase.public_key(), &wallet_a.public_key(), options.genesis_value);
    coinbase.sign_transaction(&mut genesis_tx, &signer)?;
    ledger.seed_genesis(&genesis_tx);

    println!("🌱 Creating and mining genesis block...");
    let mut genesis = Block::genesis();
    genesis.add_transaction(genesis_tx, &mut ledger, &signer, min_value)?;
    mine_and_append(&mut chain, genesis, options)?;

    println!("\n💸 Wallet A is attempting to send 40 to wallet B...");
    let mut block1 = Block::new(chain.latest_hash());
    let tx = wallet_a.send_funds(&wallet_b.public_key(), 40, &ledger, &factory, &signer)?;
    block1.add_transaction(tx, &mut ledger, &signer, min_value)?;
    mine_and_append(&mut chain, block1, options)?;
    print_balances(&wallet_a, &wallet_b, &ledger);

    println!("\n💸 Wallet A is attempting to send more funds (1000) than it has...");
    let block2 = Block::new(chain.latest_hash());
    match wallet_a.send_funds(&wallet_b.public_key(), 1000, &ledger, &factory, &signer) {
        Ok(tx) => warn!("Unexpectedly built transaction {}", tx.calculate_hash()),
        Err(e) => println!("   ❌ Rejected: {}", e),
    }
    mine_and_append(&mut chain, block2, options)?;
    print_balances(&wallet_a, &wallet_b, &ledger);

    println!("\n💸 Wallet B is attempting to send 20 to wallet A...");
    let mut block3 = Block::new(chain.latest_hash());
    let tx = wallet_b.send_funds(&wallet_a.public_key(), 20, &ledger, &factory, &signer)?;
    block3.add_transaction(tx, &mut ledger, &signer, min_value)?;
    mine_and_append(&mut chain, block3, options)?;
    print_balances(&wallet_a, &wallet_b, &ledger);

    Ok(DemoRun {
        chain,
        ledger,
        coinbase,
        wallet_a,
        wallet_b,
    })
}

/// Run the demo, validate the result and optionally dump the chain as JSON
pub fn cmd_demo(options: &DemoOptions, json: bool) -> CliResult<()> {
    let run = run_demo(options)?;

    println!();
    report_validation(&run.chain, &options.config)?;

    if json {
        println!("\n📦 The block chain:");
        println!("{}", serde_json::to_string_pretty(run.chain.blocks())?);
    }

    Ok(())
}

/// Build the demo chain and validate it, optionally after corrupting it
pub fn cmd_validate(options: &DemoOptions, tamper: bool) -> CliResult<()> {
    let mut run = run_demo(options)?;

    if tamper {
        println!("\n🔧 Tampering with the first payment in block 1...");
        let mut blocks = run.chain.into_blocks();
        if let Some(tx) = blocks
            .get_mut(1)
            .and_then(|block| block.transactions.first_mut())
        {
            tx.value = tx.value.saturating_add(1000);
        }
        run.chain = Chain::from_blocks(blocks);
    }

    println!();
    report_validation(&run.chain, &options.config)
}

fn mine_and_append(chain: &mut Chain, mut block: Block, options: &DemoOptions) -> CliResult<()> {
    let difficulty = options.config.difficulty;
    let stats = if options.workers > 1 {
        let cancel = AtomicBool::new(false);
        block.mine_parallel(difficulty, options.workers, &cancel)?
    } else {
        block.mine(difficulty)?
    };
    print_mined(chain.len(), &block, &stats);
    chain.push(block)?;
    Ok(())
}

fn report_validation(chain: &Chain, config: &ChainConfig) -> CliResult<()> {
    println!("🔍 Validating blockchain...");
    let signer = Secp256k1Provider;
    let validator = ChainValidator::from_config(&signer, config);

    match validator.validate(chain.blocks()) {
        Ok(()) => {
            info!("Blockchain is valid");
            println!("✅ Blockchain is valid!");
            println!("   {} blocks verified", chain.len());
            Ok(())
        }
        Err(e) => {
            println!("❌ Blockchain validation FAILED!");
            println!("   {}", e);
            Err(e.into())
        }
    }
}

fn print_mined(height: usize, block: &Block, stats: &MiningStats) {
    println!("   Block {} mined!", height);
    println!("   ├─ Hash: {}", short(&block.hash));
    println!("   ├─ Transactions: {}", block.tx_count());
    println!("   ├─ Time: {}ms", stats.time_ms);
    println!("   ├─ Attempts: {}", stats.hash_attempts);
    println!("   └─ Hash rate: {:.2} H/s", stats.hash_rate);
}

fn print_balances(wallet_a: &Wallet, wallet_b: &Wallet, ledger: &Ledger) {
    println!("💰 Wallet A's balance is: {}", wallet_a.balance(ledger));
    println!("💰 Wallet B's balance is: {}", wallet_b.balance(ledger));
}

fn short(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}
