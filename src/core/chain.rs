//! Chain of blocks
//!
//! An ordered, append-only sequence of mined blocks. Index 0 is genesis.

use crate::core::block::{Block, BlockState, GENESIS_PREVIOUS_HASH};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default mining difficulty (number of leading zero hex characters)
pub const DEFAULT_DIFFICULTY: usize = 3;

/// Default minimum value a transaction's inputs must add up to
pub const DEFAULT_MINIMUM_TRANSACTION_VALUE: u64 = 1;

/// Chain append errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Block must be mined before it is appended (state: {0:?})")]
    Unmined(BlockState),
    #[error("First block must be a genesis block")]
    MissingGenesis,
    #[error("Block previous hash {actual} does not match chain tip {expected}")]
    BrokenLink { expected: String, actual: String },
}

/// Parameters shared by block construction and validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading zero hex characters required in a block hash
    pub difficulty: usize,
    /// Minimum value a transaction's inputs must add up to
    pub minimum_transaction_value: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            minimum_transaction_value: DEFAULT_MINIMUM_TRANSACTION_VALUE,
        }
    }
}

/// The chain of blocks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap blocks as-is, without link checks
    ///
    /// Run the result through [`crate::core::ChainValidator`] before trusting it.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Append a mined block that links to the current tip
    pub fn push(&mut self, block: Block) -> Result<(), ChainError> {
        if block.state() != BlockState::Mined {
            return Err(ChainError::Unmined(block.state()));
        }

        let expected = match self.blocks.last() {
            Some(tip) => tip.hash.as_str(),
            None if block.is_genesis() => GENESIS_PREVIOUS_HASH,
            None => return Err(ChainError::MissingGenesis),
        };
        if block.previous_hash != expected {
            return Err(ChainError::BrokenLink {
                expected: expected.to_string(),
                actual: block.previous_hash.clone(),
            });
        }

        info!("Block {} appended at height {}", block.hash, self.blocks.len());
        self.blocks.push(block);
        Ok(())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn latest(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Hash a new block should build on: the tip, or `"0"` for an empty chain
    pub fn latest_hash(&self) -> &str {
        self.latest()
            .map_or(GENESIS_PREVIOUS_HASH, |block| block.hash.as_str())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mined(previous_hash: &str) -> Block {
        let mut block = Block::new(previous_hash);
        block.mine(1).unwrap();
        block
    }

    #[test]
    fn test_links_three_blocks() {
        let mut chain = Chain::new();
        assert_eq!(chain.latest_hash(), GENESIS_PREVIOUS_HASH);

        chain.push(mined(chain.latest_hash())).unwrap();
        chain.push(mined(chain.latest_hash())).unwrap();
        chain.push(mined(chain.latest_hash())).unwrap();

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.blocks()[0].previous_hash, "0");
        for i in 1..chain.len() {
            assert_eq!(chain.blocks()[i - 1].hash, chain.blocks()[i].previous_hash);
        }
    }

    #[test]
    fn test_rejects_unmined_block() {
        let mut chain = Chain::new();
        let err = chain.push(Block::genesis()).unwrap_err();
        assert!(matches!(err, ChainError::Unmined(BlockState::Unmined)));
        assert!(chain.is_empty());
    }

    #[test]
    fn test_rejects_non_genesis_first_block() {
        let mut chain = Chain::new();
        assert!(matches!(
            chain.push(mined("abc")),
            Err(ChainError::MissingGenesis)
        ));
    }

    #[test]
    fn test_rejects_broken_link() {
        let mut chain = Chain::new();
        chain.push(mined("0")).unwrap();

        let err = chain.push(mined("wrong_hash")).unwrap_err();
        assert!(matches!(err, ChainError::BrokenLink { .. }));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_config_defaults() {
        let config = ChainConfig::default();
        assert_eq!(config.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(config.minimum_transaction_value, DEFAULT_MINIMUM_TRANSACTION_VALUE);

        let partial: ChainConfig = serde_json::from_str(r#"{"difficulty": 5}"#).unwrap();
        assert_eq!(partial.difficulty, 5);
        assert_eq!(partial.minimum_transaction_value, DEFAULT_MINIMUM_TRANSACTION_VALUE);
    }
}
