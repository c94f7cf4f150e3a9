//! Wallet implementation for the blockchain
//!
//! Holds a key pair, reads its balance from a ledger and builds signed
//! transactions that spend enough of its outputs to cover a payment.

use crate::core::{Ledger, Transaction, TransactionError, TransactionFactory, TransactionInput};
use crate::crypto::{KeyPair, SignatureProvider};
use log::warn;
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] crate::crypto::KeyError),
}

/// A wallet for managing keys and creating transactions
pub struct Wallet {
    /// The key pair for signing transactions
    key_pair: KeyPair,
    /// Optional label for the wallet
    pub label: Option<String>,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
            label: None,
        }
    }

    /// Create a wallet with a label
    pub fn with_label(label: &str) -> Self {
        Self {
            key_pair: KeyPair::generate(),
            label: Some(label.to_string()),
        }
    }

    /// Import a wallet from a private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
        Ok(Self {
            key_pair,
            label: None,
        })
    }

    /// Get the wallet's public key (hex)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Get the wallet's private key (hex)
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    /// Raw secret bytes, as handed to a [`SignatureProvider`]
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.key_pair.private_key_bytes()
    }

    /// Sign `tx` with this wallet's key
    pub fn sign_transaction(
        &self,
        tx: &mut Transaction,
        signer: &dyn SignatureProvider,
    ) -> Result<(), WalletError> {
        tx.generate_signature(signer, &self.private_key_bytes())?;
        Ok(())
    }

    /// Get the balance from the ledger
    pub fn balance(&self, ledger: &Ledger) -> u64 {
        ledger.balance_of(&self.public_key())
    }

    /// Ids of the outputs this wallet owns
    pub fn unspent(&self, ledger: &Ledger) -> Vec<String> {
        ledger
            .outputs_owned_by(&self.public_key())
            .into_iter()
            .map(|o| o.id().to_string())
            .collect()
    }

    /// Create a signed transaction sending `value` to `recipient`
    ///
    /// Owned outputs are selected until they cover `value`. The ledger is
    /// only read here: spending happens when the transaction is processed.
    pub fn send_funds(
        &self,
        recipient: &str,
        value: u64,
        ledger: &Ledger,
        factory: &TransactionFactory,
        signer: &dyn SignatureProvider,
    ) -> Result<Transaction, WalletError> {
        let public_key = self.public_key();
        let balance = self.balance(ledger);

        if balance < value {
            warn!("Not enough funds to send transaction. Transaction discarded.");
            return Err(WalletError::InsufficientFunds {
                have: balance,
                need: value,
            });
        }

        // Select outputs to cover the amount
        let mut inputs = Vec::new();
        let mut selected = 0u64;
        for output in ledger.outputs_owned_by(&public_key) {
            inputs.push(TransactionInput::new(output.id()));
            selected = selected.saturating_add(output.value());

            if selected >= value {
                break;
            }
        }

        let mut tx = factory.create(&public_key, recipient, value, inputs);
        self.sign_transaction(&mut tx, signer)?;
        Ok(tx)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("public_key", &self.public_key())
            .field("label", &self.label)
            .finish()
    }
}
