//! UTXO-Chain: a single-process proof-of-work blockchain in Rust
//!
//! This crate provides:
//! - ECDSA digital signatures (secp256k1) behind a pluggable provider
//! - UTXO transactions with a payment/change output split
//! - An explicitly owned ledger of unspent outputs
//! - Blocks with merkle roots and cancellable, multi-threaded mining
//! - Whole-chain validation by replaying a shadow ledger
//!
//! # Example
//!
//! ```rust
//! use utxo_chain::core::{Block, Chain, ChainValidator, Ledger, Transaction, TransactionFactory};
//! use utxo_chain::crypto::Secp256k1Provider;
//! use utxo_chain::wallet::Wallet;
//!
//! let signer = Secp256k1Provider;
//! let alice = Wallet::new();
//! let bob = Wallet::new();
//! let mut ledger = Ledger::new();
//! let mut chain = Chain::new();
//!
//! // Genesis pays 100 to alice
//! let genesis_tx = Transaction::genesis("coinbase", &alice.public_key(), 100);
//! ledger.seed_genesis(&genesis_tx);
//! let mut genesis = Block::genesis();
//! genesis.add_transaction(genesis_tx, &mut ledger, &signer, 1).unwrap();
//! genesis.mine(1).unwrap();
//! chain.push(genesis).unwrap();
//!
//! // Alice pays bob 40
//! let factory = TransactionFactory::new();
//! let tx = alice.send_funds(&bob.public_key(), 40, &ledger, &factory, &signer).unwrap();
//! let mut block = Block::new(chain.latest_hash());
//! block.add_transaction(tx, &mut ledger, &signer, 1).unwrap();
//! block.mine(1).unwrap();
//! chain.push(block).unwrap();
//!
//! assert_eq!(alice.balance(&ledger), 60);
//! assert_eq!(bob.balance(&ledger), 40);
//! assert!(ChainValidator::new(&signer, 1, 1).validate(chain.blocks()).is_ok());
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod wallet;

pub use crate::core::{Block, Chain, ChainConfig, ChainValidator, Ledger, Transaction};
pub use crate::crypto::{KeyPair, Secp256k1Provider, SignatureProvider};
pub use crate::wallet::Wallet;
