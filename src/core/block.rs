//! Block implementation for the blockchain
//!
//! A block holds an ordered list of transactions, fingerprints them with a
//! merkle root and is sealed by a proof-of-work search over its nonce.
//!
//! Lifecycle: `Unmined -> Mining -> Mined`. Transactions can only be added
//! while unmined; the merkle root is fixed when mining starts.

use crate::core::ledger::Ledger;
use crate::core::transaction::{Transaction, TransactionError};
use crate::crypto::{
    calculate_merkle_root, hash_parts, meets_difficulty, SignatureProvider, HASH_HEX_LEN,
};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Previous hash carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

// =============================================================================
// Block Errors
// =============================================================================

/// Block construction and mining errors
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Block is no longer accepting transactions ({0:?})")]
    AlreadyMined(BlockState),
    #[error("Difficulty {0} exceeds the hash length")]
    DifficultyOutOfRange(usize),
    #[error("Mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },
    #[error("Mining worker panicked")]
    WorkerPanicked,
    #[error("Transaction failed to process, discarded: {0}")]
    TransactionRejected(#[from] TransactionError),
}

/// Where a block is in its mining lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockState {
    #[default]
    Unmined,
    Mining,
    Mined,
}

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn new(hash_attempts: u64, elapsed: Duration) -> Self {
        let time_ms = elapsed.as_millis();
        let secs = elapsed.as_secs_f64();
        let hash_rate = if secs > 0.0 {
            hash_attempts as f64 / secs
        } else {
            hash_attempts as f64
        };
        Self {
            hash_attempts,
            time_ms,
            hash_rate,
        }
    }
}

/// A block in the blockchain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Block hash, always equal to [`Block::calculate_hash`] once mined
    pub hash: String,
    /// Hash of the previous block, `"0"` for genesis
    pub previous_hash: String,
    /// Merkle root of the transaction ids, fixed at mining time
    pub merkle_root: String,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Nonce used for proof of work
    pub nonce: u64,
    /// Transactions in the block
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    state: BlockState,
}

impl Block {
    /// Create a new unmined block on top of `previous_hash`
    pub fn new(previous_hash: &str) -> Self {
        Self::with_timestamp(previous_hash, Utc::now().timestamp_millis())
    }

    /// Create a new unmined block with an explicit timestamp
    pub fn with_timestamp(previous_hash: &str, timestamp: i64) -> Self {
        let mut block = Self {
            hash: String::new(),
            previous_hash: previous_hash.to_string(),
            merkle_root: String::new(),
            timestamp,
            nonce: 0,
            transactions: Vec::new(),
            state: BlockState::Unmined,
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Create an empty genesis block
    pub fn genesis() -> Self {
        Self::new(GENESIS_PREVIOUS_HASH)
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    /// Hash over previous_hash ‖ timestamp ‖ nonce ‖ merkle_root
    pub fn calculate_hash(&self) -> String {
        header_hash(&self.previous_hash, self.timestamp, self.nonce, &self.merkle_root)
    }

    /// Merkle root over the ids of the transactions currently in the block
    pub fn calculate_merkle_root(&self) -> String {
        let ids: Vec<&str> = self.transactions.iter().map(|tx| tx.id.as_str()).collect();
        calculate_merkle_root(&ids)
    }

    /// Add a transaction to this block
    ///
    /// Outside the genesis block the transaction is processed against
    /// `ledger` first; if that fails it is discarded and the error returned.
    pub fn add_transaction(
        &mut self,
        mut transaction: Transaction,
        ledger: &mut Ledger,
        verifier: &dyn SignatureProvider,
        minimum_transaction_value: u64,
    ) -> Result<(), BlockError> {
        if self.state != BlockState::Unmined {
            return Err(BlockError::AlreadyMined(self.state));
        }

        if !self.is_genesis() {
            if let Err(e) = transaction.process(ledger, verifier, minimum_transaction_value) {
                warn!("Transaction failed to process. Discarded: {}", e);
                return Err(e.into());
            }
        }

        debug!("Transaction {} added to block", transaction.id);
        self.transactions.push(transaction);
        Ok(())
    }

    /// Mine the block (find a valid nonce), running until a solution is found
    pub fn mine(&mut self, difficulty: usize) -> Result<MiningStats, BlockError> {
        let never = AtomicBool::new(false);
        self.mine_cancellable(difficulty, &never)
    }

    /// Mine the block, giving up when `cancel` is raised
    ///
    /// A cancelled block returns to `Unmined` and may be mined again.
    pub fn mine_cancellable(
        &mut self,
        difficulty: usize,
        cancel: &AtomicBool,
    ) -> Result<MiningStats, BlockError> {
        self.begin_mining(difficulty)?;
        let start = Instant::now();
        let mut attempts = 1u64;

        while !meets_difficulty(&self.hash, difficulty) {
            if cancel.load(Ordering::Relaxed) {
                self.state = BlockState::Unmined;
                return Err(BlockError::MiningCancelled { attempts });
            }
            self.nonce += 1;
            self.hash = self.calculate_hash();
            attempts += 1;
        }

        Ok(self.finish_mining(attempts, start.elapsed()))
    }

    /// Mine the block across `workers` threads
    ///
    /// Worker `i` tries nonces `i, i + workers, i + 2 * workers, ...`. The
    /// first solution stops every other worker, as does raising `cancel`.
    /// `workers` is clamped to the machine's available parallelism.
    pub fn mine_parallel(
        &mut self,
        difficulty: usize,
        workers: usize,
        cancel: &AtomicBool,
    ) -> Result<MiningStats, BlockError> {
        self.begin_mining(difficulty)?;
        let workers = clamp_workers(workers) as u64;
        let start = Instant::now();
        let found = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);

        let previous_hash = self.previous_hash.as_str();
        let merkle_root = self.merkle_root.as_str();
        let timestamp = self.timestamp;

        let outcome = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|offset| {
                    let search = NonceSearch {
                        previous_hash,
                        timestamp,
                        merkle_root,
                        difficulty,
                        offset,
                        stride: workers,
                    };
                    let (found, attempts) = (&found, &attempts);
                    scope.spawn(move || search.run(found, cancel, attempts))
                })
                .collect();

            let mut solution: Option<(u64, String)> = None;
            for handle in handles {
                match handle.join() {
                    Ok(Some(candidate)) => {
                        if solution.as_ref().map_or(true, |(nonce, _)| candidate.0 < *nonce) {
                            solution = Some(candidate);
                        }
                    }
                    Ok(None) => {}
                    Err(_) => {
                        found.store(true, Ordering::Relaxed);
                        return Err(BlockError::WorkerPanicked);
                    }
                }
            }
            Ok(solution)
        });

        let attempts = attempts.load(Ordering::Relaxed);
        match outcome {
            Ok(Some((nonce, hash))) => {
                self.nonce = nonce;
                self.hash = hash;
                Ok(self.finish_mining(attempts, start.elapsed()))
            }
            Ok(None) => {
                self.state = BlockState::Unmined;
                Err(BlockError::MiningCancelled { attempts })
            }
            Err(e) => {
                self.state = BlockState::Unmined;
                Err(e)
            }
        }
    }

    /// Check if the stored hash meets the difficulty target
    pub fn is_valid_pow(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    /// Verify the stored hash against the block's fields
    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Verify the stored merkle root against the stored transaction ids
    pub fn verify_merkle_root(&self) -> bool {
        self.merkle_root == self.calculate_merkle_root()
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    fn begin_mining(&mut self, difficulty: usize) -> Result<(), BlockError> {
        if difficulty > HASH_HEX_LEN {
            return Err(BlockError::DifficultyOutOfRange(difficulty));
        }
        if self.state != BlockState::Unmined {
            return Err(BlockError::AlreadyMined(self.state));
        }

        self.state = BlockState::Mining;
        self.merkle_root = self.calculate_merkle_root();
        self.nonce = 0;
        self.hash = self.calculate_hash();
        Ok(())
    }

    fn finish_mining(&mut self, attempts: u64, elapsed: Duration) -> MiningStats {
        self.state = BlockState::Mined;
        let stats = MiningStats::new(attempts, elapsed);
        info!(
            "Block mined! -> {} in {}ms ({} attempts, {:.2} H/s)",
            self.hash, stats.time_ms, stats.hash_attempts, stats.hash_rate
        );
        stats
    }
}

fn header_hash(previous_hash: &str, timestamp: i64, nonce: u64, merkle_root: &str) -> String {
    hash_parts(&[
        previous_hash,
        timestamp.to_string().as_str(),
        nonce.to_string().as_str(),
        merkle_root,
    ])
}

/// Clamp a requested worker count to `1..=available_parallelism`
fn clamp_workers(requested: usize) -> usize {
    let limit = thread::available_parallelism().map_or(1, |n| n.get());
    if requested > limit {
        debug!("Capping mining workers at {} (requested {})", limit, requested);
    }
    requested.clamp(1, limit)
}

/// One worker's slice of the nonce space
struct NonceSearch<'a> {
    previous_hash: &'a str,
    timestamp: i64,
    merkle_root: &'a str,
    difficulty: usize,
    offset: u64,
    stride: u64,
}

impl NonceSearch<'_> {
    fn run(
        &self,
        found: &AtomicBool,
        cancel: &AtomicBool,
        attempts: &AtomicU64,
    ) -> Option<(u64, String)> {
        let mut local_attempts = 0u64;
        let mut nonce = self.offset;
        let result = loop {
            if found.load(Ordering::Relaxed) || cancel.load(Ordering::Relaxed) {
                break None;
            }
            let hash = header_hash(self.previous_hash, self.timestamp, nonce, self.merkle_root);
            local_attempts += 1;
            if meets_difficulty(&hash, self.difficulty) {
                found.store(true, Ordering::Relaxed);
                break Some((nonce, hash));
            }
            nonce = match nonce.checked_add(self.stride) {
                Some(next) => next,
                None => break None,
            };
        };
        attempts.fetch_add(local_attempts, Ordering::Relaxed);
        result
    }
}
