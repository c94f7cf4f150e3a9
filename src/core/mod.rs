//! Core blockchain components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (UTXO model, signatures, payment/change split)
//! - The UTXO ledger
//! - Blocks (merkle root, cancellable and parallel proof of work)
//! - The append-only chain and its configuration
//! - Whole-chain validation by ledger replay

pub mod block;
pub mod chain;
pub mod ledger;
pub mod transaction;
pub mod validator;

pub use block::{Block, BlockError, BlockState, MiningStats, GENESIS_PREVIOUS_HASH};
pub use chain::{
    Chain, ChainConfig, ChainError, DEFAULT_DIFFICULTY, DEFAULT_MINIMUM_TRANSACTION_VALUE,
};
pub use ledger::Ledger;
pub use transaction::{
    Transaction, TransactionError, TransactionFactory, TransactionInput, TransactionOutput,
    GENESIS_TX_ID, PROCESSED_OUTPUT_COUNT,
};
pub use validator::{ChainValidator, ValidationError};
