//! Transaction handling for the blockchain
//!
//! Implements the UTXO transaction model:
//! - Content-addressed outputs owned by a public key
//! - Inputs that reference outputs by id and resolve them against a [`Ledger`]
//! - A signature over the canonical `(sender, recipient, value)` payload
//! - Processing that splits the inputs into a payment and a change output

use crate::core::ledger::Ledger;
use crate::crypto::{hash_parts, KeyError, SignatureProvider};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Id stamped on the genesis transaction
pub const GENESIS_TX_ID: &str = "0";

/// Number of outputs a processed (non-genesis) transaction carries
pub const PROCESSED_OUTPUT_COUNT: usize = 2;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction signature failed to verify")]
    InvalidSignature,
    #[error("Transaction inputs too small: {inputs} (minimum: {minimum})")]
    BelowMinimumValue { inputs: u64, minimum: u64 },
    #[error("Insufficient funds: inputs {have}, value {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Transaction already processed: {0}")]
    AlreadyProcessed(String),
    #[error("Output {0} is referenced by more than one input")]
    DuplicateInput(String),
    #[error("Payment and change outputs share id {0}")]
    OutputIdCollision(String),
    #[error("Transaction input values overflow")]
    ValueOverflow,
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

// =============================================================================
// Transaction Output
// =============================================================================

/// An unspent (or spent) unit of value owned by a public key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionOutput {
    /// Content address: hash(recipient ‖ value ‖ parent_transaction_id)
    id: String,
    /// New owner of the coins (hex public key)
    recipient: String,
    /// Amount of coins
    value: u64,
    /// Id of the transaction this output was created in
    parent_transaction_id: String,
}

impl TransactionOutput {
    pub fn new(recipient: &str, value: u64, parent_transaction_id: &str) -> Self {
        let mut output = Self {
            id: String::new(),
            recipient: recipient.to_string(),
            value,
            parent_transaction_id: parent_transaction_id.to_string(),
        };
        output.id = output.calculate_id();
        output
    }

    /// Id derived from the output's content
    pub fn calculate_id(&self) -> String {
        hash_parts(&[
            self.recipient.as_str(),
            self.value.to_string().as_str(),
            self.parent_transaction_id.as_str(),
        ])
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn parent_transaction_id(&self) -> &str {
        &self.parent_transaction_id
    }

    /// Check if this output belongs to the given public key
    pub fn is_mine(&self, public_key: &str) -> bool {
        self.recipient == public_key
    }
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input (reference to a previous output)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionInput {
    /// Id of the referenced [`TransactionOutput`]
    pub output_ref: String,
    /// The referenced output, filled in from the ledger during processing
    #[serde(default)]
    pub resolved_output: Option<TransactionOutput>,
}

impl TransactionInput {
    pub fn new(output_ref: &str) -> Self {
        Self {
            output_ref: output_ref.to_string(),
            resolved_output: None,
        }
    }

    /// Value of the resolved output, 0 when unresolved
    pub fn value(&self) -> u64 {
        self.resolved_output.as_ref().map_or(0, |o| o.value())
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A transfer of `value` from `sender` to `recipient`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id, empty until processed
    pub id: String,
    /// Sender's public key (hex)
    pub sender: String,
    /// Recipient's public key (hex)
    pub recipient: String,
    /// Amount sent to the recipient
    pub value: u64,
    /// Signature over the signing payload (hex)
    pub signature: String,
    /// Monotonic sequence number, part of the id
    pub sequence: u64,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
}

impl Transaction {
    /// Create a new unsigned, unprocessed transaction
    ///
    /// Prefer [`TransactionFactory::create`], which hands out sequence numbers.
    pub fn new(
        sender: &str,
        recipient: &str,
        value: u64,
        inputs: Vec<TransactionInput>,
        sequence: u64,
    ) -> Self {
        Self {
            id: String::new(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            value,
            signature: String::new(),
            sequence,
            inputs,
            outputs: Vec::new(),
        }
    }

    /// Create the genesis transaction
    ///
    /// It has no inputs, is stamped with [`GENESIS_TX_ID`] and already holds
    /// its single output. Seed a ledger with it via [`Ledger::seed_genesis`].
    pub fn genesis(sender: &str, recipient: &str, value: u64) -> Self {
        let mut tx = Self::new(sender, recipient, value, Vec::new(), 0);
        tx.id = GENESIS_TX_ID.to_string();
        tx.outputs
            .push(TransactionOutput::new(recipient, value, GENESIS_TX_ID));
        tx
    }

    pub fn is_genesis(&self) -> bool {
        self.id == GENESIS_TX_ID && self.inputs.is_empty()
    }

    pub fn is_processed(&self) -> bool {
        !self.id.is_empty()
    }

    /// Canonical payload covered by the signature: sender ‖ recipient ‖ value
    pub fn signing_data(&self) -> Vec<u8> {
        format!("{}{}{}", self.sender, self.recipient, self.value).into_bytes()
    }

    /// Sign the payload we don't want tampered with
    pub fn generate_signature(
        &mut self,
        signer: &dyn SignatureProvider,
        private_key: &[u8],
    ) -> Result<(), TransactionError> {
        let signature = signer.sign(&self.signing_data(), private_key)?;
        self.signature = hex::encode(signature);
        Ok(())
    }

    /// Verify the signature against the sender's public key
    pub fn verify_signature(&self, verifier: &dyn SignatureProvider) -> bool {
        let Ok(signature) = hex::decode(&self.signature) else {
            return false;
        };
        verifier.verify(&self.signing_data(), &self.sender, &signature)
    }

    /// Id derived from sender ‖ recipient ‖ value ‖ sequence
    pub fn calculate_hash(&self) -> String {
        hash_parts(&[
            self.sender.as_str(),
            self.recipient.as_str(),
            self.value.to_string().as_str(),
            self.sequence.to_string().as_str(),
        ])
    }

    /// Process the transaction against `ledger`
    ///
    /// On success the id is assigned, the outputs are `[value → recipient,
    /// change → sender]`, and the ledger gains both outputs and loses every
    /// resolved input in one mutation. On failure the ledger is untouched.
    pub fn process(
        &mut self,
        ledger: &mut Ledger,
        verifier: &dyn SignatureProvider,
        minimum_transaction_value: u64,
    ) -> Result<(), TransactionError> {
        if self.is_processed() {
            return Err(TransactionError::AlreadyProcessed(self.id.clone()));
        }

        if !self.verify_signature(verifier) {
            warn!("Transaction signature failed to verify");
            return Err(TransactionError::InvalidSignature);
        }

        if let Some(output_ref) = self.duplicate_input() {
            warn!("Output {} is spent twice by one transaction", output_ref);
            return Err(TransactionError::DuplicateInput(output_ref.to_string()));
        }

        // Gather transaction inputs, unresolved ones are already spent or unknown
        for input in &mut self.inputs {
            input.resolved_output = ledger.get(&input.output_ref).cloned();
        }

        let Some(inputs_value) = self.checked_inputs_value() else {
            self.clear_resolved();
            return Err(TransactionError::ValueOverflow);
        };
        if inputs_value < minimum_transaction_value {
            warn!("Transaction inputs too small: {}", inputs_value);
            self.clear_resolved();
            return Err(TransactionError::BelowMinimumValue {
                inputs: inputs_value,
                minimum: minimum_transaction_value,
            });
        }

        if inputs_value < self.value {
            warn!(
                "Transaction inputs {} do not cover value {}",
                inputs_value, self.value
            );
            self.clear_resolved();
            return Err(TransactionError::InsufficientFunds {
                have: inputs_value,
                need: self.value,
            });
        }

        let left_over = inputs_value - self.value;
        let id = self.calculate_hash();
        let payment = TransactionOutput::new(&self.recipient, self.value, &id);
        let change = TransactionOutput::new(&self.sender, left_over, &id);
        if payment.id() == change.id() {
            warn!("Payment and change outputs collide on {}", payment.id());
            self.clear_resolved();
            return Err(TransactionError::OutputIdCollision(payment.id().to_string()));
        }

        self.id = id;
        self.outputs = vec![payment, change];

        let spent: Vec<String> = self
            .inputs
            .iter()
            .filter_map(|i| i.resolved_output.as_ref().map(|o| o.id().to_string()))
            .collect();
        ledger.apply(&self.outputs, &spent);

        debug!(
            "Processed transaction {} ({} inputs, change {})",
            self.id,
            spent.len(),
            left_over
        );
        Ok(())
    }

    /// Sum of resolved input values, saturating at `u64::MAX`
    pub fn inputs_value(&self) -> u64 {
        self.inputs
            .iter()
            .fold(0u64, |acc, input| acc.saturating_add(input.value()))
    }

    /// Sum of resolved input values, `None` on overflow
    pub fn checked_inputs_value(&self) -> Option<u64> {
        self.inputs
            .iter()
            .try_fold(0u64, |acc, input| acc.checked_add(input.value()))
    }

    /// Sum of output values, saturating at `u64::MAX`
    pub fn outputs_value(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, output| acc.saturating_add(output.value()))
    }

    /// First output id referenced by more than one input
    pub fn duplicate_input(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.inputs
            .iter()
            .map(|input| input.output_ref.as_str())
            .find(|output_ref| !seen.insert(*output_ref))
    }

    fn clear_resolved(&mut self) {
        for input in &mut self.inputs {
            input.resolved_output = None;
        }
    }
}

// =============================================================================
// Transaction Factory
// =============================================================================

/// Creates transactions stamped with a monotonic sequence number
#[derive(Debug, Default)]
pub struct TransactionFactory {
    sequence: AtomicU64,
}

impl TransactionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering after `last_sequence`
    pub fn starting_after(last_sequence: u64) -> Self {
        Self {
            sequence: AtomicU64::new(last_sequence),
        }
    }

    /// Reserve the next sequence number
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last sequence number handed out (0 if none)
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Create an unsigned transaction with the next sequence number
    pub fn create(
        &self,
        sender: &str,
        recipient: &str,
        value: u64,
        inputs: Vec<TransactionInput>,
    ) -> Transaction {
        Transaction::new(sender, recipient, value, inputs, self.next_sequence())
    }
}

// =============================================================================
// Tests
// =============================================================================
