//! UTXO ledger
//!
//! Maps output id to the unspent [`TransactionOutput`]. The ledger is an
//! explicitly owned value: transaction processing takes it by `&mut`, and
//! the chain validator replays against its own clone.

use crate::core::transaction::{Transaction, TransactionOutput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The set of unspent transaction outputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    outputs: HashMap<String, TransactionOutput>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the outputs of the genesis transaction directly
    ///
    /// The genesis transaction bypasses processing, so this is the only way
    /// value enters the ledger without spending anything.
    pub fn seed_genesis(&mut self, genesis: &Transaction) {
        for output in &genesis.outputs {
            self.insert(output.clone());
        }
    }

    pub fn get(&self, output_id: &str) -> Option<&TransactionOutput> {
        self.outputs.get(output_id)
    }

    pub fn contains(&self, output_id: &str) -> bool {
        self.outputs.contains_key(output_id)
    }

    pub fn insert(&mut self, output: TransactionOutput) {
        self.outputs.insert(output.id().to_string(), output);
    }

    /// Add `created` and then drop every id in `spent`, as one mutation
    pub fn apply(&mut self, created: &[TransactionOutput], spent: &[String]) {
        for output in created {
            self.insert(output.clone());
        }
        for id in spent {
            self.outputs.remove(id);
        }
    }

    /// Remove and return an output
    pub fn take(&mut self, output_id: &str) -> Option<TransactionOutput> {
        self.outputs.remove(output_id)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionOutput> {
        self.outputs.values()
    }

    /// Outputs owned by the given public key
    pub fn outputs_owned_by(&self, public_key: &str) -> Vec<&TransactionOutput> {
        self.outputs
            .values()
            .filter(|o| o.is_mine(public_key))
            .collect()
    }

    /// Balance for a public key, saturating at `u64::MAX`
    pub fn balance_of(&self, public_key: &str) -> u64 {
        self.outputs_owned_by(public_key)
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.value()))
    }

    /// Total value held across all unspent outputs, saturating at `u64::MAX`
    pub fn total_value(&self) -> u64 {
        self.outputs
            .values()
            .fold(0u64, |acc, o| acc.saturating_add(o.value()))
    }
}
