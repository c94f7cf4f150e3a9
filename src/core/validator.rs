//! Whole-chain validation
//!
//! Walks the chain from genesis, re-deriving every block hash and merkle
//! root, re-verifying every signature and replaying every transaction
//! against a private shadow [`Ledger`]. The live ledger is never touched.
//!
//! The genesis block is exempt from checks; its outputs seed the shadow
//! ledger. The first failure is returned.

use crate::core::block::Block;
use crate::core::chain::ChainConfig;
use crate::core::ledger::Ledger;
use crate::core::transaction::{Transaction, PROCESSED_OUTPUT_COUNT};
use crate::crypto::SignatureProvider;
use log::{debug, warn};
use thiserror::Error;

/// Reasons a chain fails validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Chain has no blocks")]
    EmptyChain,
    #[error("Block {block}: stored hash does not match its fields")]
    HashMismatch { block: usize },
    #[error("Block {block}: previous hash does not match the preceding block")]
    BrokenLink { block: usize },
    #[error("Block {block}: hash does not meet difficulty {difficulty}")]
    NotMined { block: usize, difficulty: usize },
    #[error("Block {block}: merkle root does not match its transactions")]
    MerkleRootMismatch { block: usize },
    #[error("Block {block}: signature of transaction {tx} is invalid")]
    InvalidSignature { block: usize, tx: String },
    #[error("Block {block}: transaction id {tx} does not match its fields")]
    TransactionIdMismatch { block: usize, tx: String },
    #[error("Block {block}: transaction {tx} output {output_id} does not match its content")]
    OutputIdMismatch {
        block: usize,
        tx: String,
        output_id: String,
    },
    #[error("Block {block}: transaction {tx} creates output {output_id} that already exists")]
    DuplicateOutput {
        block: usize,
        tx: String,
        output_id: String,
    },
    #[error("Block {block}: transaction {tx} inputs {inputs} below minimum {minimum}")]
    BelowMinimumValue {
        block: usize,
        tx: String,
        inputs: u64,
        minimum: u64,
    },
    #[error("Block {block}: transaction {tx} inputs {inputs} != outputs {outputs}")]
    UnbalancedTransaction {
        block: usize,
        tx: String,
        inputs: u64,
        outputs: u64,
    },
    #[error("Block {block}: transaction {tx} references missing output {output_ref}")]
    MissingInput {
        block: usize,
        tx: String,
        output_ref: String,
    },
    #[error("Block {block}: transaction {tx} input {output_ref} recorded {recorded}, ledger has {actual}")]
    ValueMismatch {
        block: usize,
        tx: String,
        output_ref: String,
        recorded: u64,
        actual: u64,
    },
    #[error("Block {block}: transaction {tx} has {count} outputs, expected 2")]
    MissingOutputs { block: usize, tx: String, count: usize },
    #[error("Block {block}: transaction {tx} outputs are not [recipient, sender]")]
    OutputOrderingViolation { block: usize, tx: String },
}

/// Replays a chain end to end to confirm its integrity
pub struct ChainValidator<'a> {
    verifier: &'a dyn SignatureProvider,
    difficulty: usize,
    minimum_transaction_value: u64,
}

impl<'a> ChainValidator<'a> {
    pub fn new(
        verifier: &'a dyn SignatureProvider,
        difficulty: usize,
        minimum_transaction_value: u64,
    ) -> Self {
        Self {
            verifier,
            difficulty,
            minimum_transaction_value,
        }
    }

    pub fn from_config(verifier: &'a dyn SignatureProvider, config: &ChainConfig) -> Self {
        Self::new(verifier, config.difficulty, config.minimum_transaction_value)
    }

    /// Validate the chain, reporting the first failure
    pub fn validate(&self, blocks: &[Block]) -> Result<(), ValidationError> {
        self.replay_ledger(blocks).map(|_| ())
    }

    /// Validate the chain and return the ledger its transactions produce
    pub fn replay_ledger(&self, blocks: &[Block]) -> Result<Ledger, ValidationError> {
        let genesis = blocks.first().ok_or(ValidationError::EmptyChain)?;

        let mut shadow = Ledger::new();
        for tx in &genesis.transactions {
            shadow.seed_genesis(tx);
        }

        for (index, pair) in blocks.windows(2).enumerate() {
            let height = index + 1;
            if let Err(e) = self.validate_block(height, &pair[0], &pair[1], &mut shadow) {
                warn!("Chain validation failed: {}", e);
                return Err(e);
            }
        }

        debug!("Validated {} blocks", blocks.len());
        Ok(shadow)
    }

    fn validate_block(
        &self,
        height: usize,
        previous: &Block,
        current: &Block,
        shadow: &mut Ledger,
    ) -> Result<(), ValidationError> {
        // Compare registered hash and calculated hash
        if !current.verify_hash() {
            return Err(ValidationError::HashMismatch { block: height });
        }

        if current.previous_hash != previous.hash {
            return Err(ValidationError::BrokenLink { block: height });
        }

        if !current.is_valid_pow(self.difficulty) {
            return Err(ValidationError::NotMined {
                block: height,
                difficulty: self.difficulty,
            });
        }

        if !current.verify_merkle_root() {
            return Err(ValidationError::MerkleRootMismatch { block: height });
        }

        for tx in &current.transactions {
            self.replay_transaction(height, tx, shadow)?;
        }

        Ok(())
    }

    fn replay_transaction(
        &self,
        height: usize,
        tx: &Transaction,
        shadow: &mut Ledger,
    ) -> Result<(), ValidationError> {
        if !tx.verify_signature(self.verifier) {
            return Err(ValidationError::InvalidSignature {
                block: height,
                tx: tx.id.clone(),
            });
        }

        if tx.id != tx.calculate_hash() {
            return Err(ValidationError::TransactionIdMismatch {
                block: height,
                tx: tx.id.clone(),
            });
        }

        if let Some(output) = tx
            .outputs
            .iter()
            .find(|o| o.id() != o.calculate_id() || o.parent_transaction_id() != tx.id)
        {
            return Err(ValidationError::OutputIdMismatch {
                block: height,
                tx: tx.id.clone(),
                output_id: output.id().to_string(),
            });
        }

        let inputs = tx.inputs_value();
        if inputs < self.minimum_transaction_value {
            return Err(ValidationError::BelowMinimumValue {
                block: height,
                tx: tx.id.clone(),
                inputs,
                minimum: self.minimum_transaction_value,
            });
        }

        let outputs = tx.outputs_value();
        if inputs != outputs {
            return Err(ValidationError::UnbalancedTransaction {
                block: height,
                tx: tx.id.clone(),
                inputs,
                outputs,
            });
        }

        for input in &tx.inputs {
            let Some(spent) = shadow.take(&input.output_ref) else {
                return Err(ValidationError::MissingInput {
                    block: height,
                    tx: tx.id.clone(),
                    output_ref: input.output_ref.clone(),
                });
            };

            if input.value() != spent.value() {
                return Err(ValidationError::ValueMismatch {
                    block: height,
                    tx: tx.id.clone(),
                    output_ref: input.output_ref.clone(),
                    recorded: input.value(),
                    actual: spent.value(),
                });
            }
        }

        for output in &tx.outputs {
            if shadow.contains(output.id()) {
                return Err(ValidationError::DuplicateOutput {
                    block: height,
                    tx: tx.id.clone(),
                    output_id: output.id().to_string(),
                });
            }
            shadow.insert(output.clone());
        }

        if tx.outputs.len() != PROCESSED_OUTPUT_COUNT {
            return Err(ValidationError::MissingOutputs {
                block: height,
                tx: tx.id.clone(),
                count: tx.outputs.len(),
            });
        }

        if tx.outputs[0].recipient() != tx.recipient || tx.outputs[1].recipient() != tx.sender {
            return Err(ValidationError::OutputOrderingViolation {
                block: height,
                tx: tx.id.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{TransactionFactory, TransactionInput, TransactionOutput};
    use crate::crypto::{KeyPair, Secp256k1Provider, HASH_HEX_LEN};

    const DIFFICULTY: usize = 2;

    struct Fixture {
        alice: KeyPair,
        bob: KeyPair,
        factory: TransactionFactory,
        ledger: Ledger,
        blocks: Vec<Block>,
    }

    impl Fixture {
        /// Genesis pays alice 100, block 1 sends `value` from alice to bob
        fn new(value: u64) -> Self {
            let alice = KeyPair::generate();
            let bob = KeyPair::generate();
            let factory = TransactionFactory::new();
            let mut ledger = Ledger::new();

            let genesis_tx = Transaction::genesis("coinbase", &alice.public_key_hex(), 100);
            ledger.seed_genesis(&genesis_tx);
            let genesis_output = genesis_tx.outputs[0].id().to_string();

            let mut genesis = Block::genesis();
            genesis
                .add_transaction(genesis_tx, &mut ledger, &Secp256k1Provider, 1)
                .unwrap();
            genesis.mine(DIFFICULTY).unwrap();

            let mut fixture = Self {
                alice,
                bob,
                factory,
                ledger,
                blocks: vec![genesis],
            };
            let tx = fixture.transfer(value, &[genesis_output]);
            fixture.push_block(vec![tx]);
            fixture
        }

        fn transfer(&self, value: u64, output_refs: &[String]) -> Transaction {
            let inputs = output_refs.iter().map(|r| TransactionInput::new(r)).collect();
            let mut tx = self.factory.create(
                &self.alice.public_key_hex(),
                &self.bob.public_key_hex(),
                value,
                inputs,
            );
            tx.generate_signature(&Secp256k1Provider, &self.alice.private_key_bytes())
                .unwrap();
            tx
        }

        fn push_block(&mut self, transactions: Vec<Transaction>) {
            let previous = self.blocks.last().map(|b| b.hash.clone()).unwrap();
            let mut block = Block::new(&previous);
            for tx in transactions {
                block
                    .add_transaction(tx, &mut self.ledger, &Secp256k1Provider, 1)
                    .unwrap();
            }
            block.mine(DIFFICULTY).unwrap();
            self.blocks.push(block);
        }

        /// Re-seal block `index` after tampering with its transactions
        fn reseal(&mut self, index: usize) {
            let block = &mut self.blocks[index];
            block.merkle_root = block.calculate_merkle_root();
            loop {
                block.hash = block.calculate_hash();
                if block.is_valid_pow(DIFFICULTY) {
                    break;
                }
                block.nonce += 1;
            }
        }

        fn validator(&self) -> ChainValidator<'static> {
            ChainValidator::new(&Secp256k1Provider, DIFFICULTY, 1)
        }
    }

    #[test]
    fn test_valid_chain() {
        let fixture = Fixture::new(40);
        let shadow = fixture.validator().replay_ledger(&fixture.blocks).unwrap();

        assert_eq!(shadow.balance_of(&fixture.alice.public_key_hex()), 60);
        assert_eq!(shadow.balance_of(&fixture.bob.public_key_hex()), 40);
        assert_eq!(shadow.len(), fixture.ledger.len());
    }

    #[test]
    fn test_empty_and_genesis_only() {
        let validator = ChainValidator::new(&Secp256k1Provider, DIFFICULTY, 1);
        assert_eq!(validator.validate(&[]), Err(ValidationError::EmptyChain));

        let fixture = Fixture::new(40);
        assert!(validator.validate(&fixture.blocks[..1]).is_ok());
    }

    #[test]
    fn test_validation_does_not_touch_live_ledger() {
        let fixture = Fixture::new(40);
        let before = fixture.ledger.len();
        fixture.validator().validate(&fixture.blocks).unwrap();
        assert_eq!(fixture.ledger.len(), before);
        assert_eq!(fixture.ledger.balance_of(&fixture.bob.public_key_hex()), 40);
    }

    #[test]
    fn test_hash_mismatch() {
        let mut fixture = Fixture::new(40);
        fixture.blocks[1].nonce += 1;
        assert_eq!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::HashMismatch { block: 1 })
        );
    }

    #[test]
    fn test_broken_link() {
        let mut fixture = Fixture::new(40);
        let mut stray = Block::new("wrong_hash");
        stray.mine(DIFFICULTY).unwrap();
        fixture.blocks.push(stray);

        assert_eq!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::BrokenLink { block: 2 })
        );
    }

    #[test]
    fn test_not_mined() {
        let fixture = Fixture::new(40);
        let strict = ChainValidator::new(&Secp256k1Provider, HASH_HEX_LEN, 1);
        assert_eq!(
            strict.validate(&fixture.blocks),
            Err(ValidationError::NotMined {
                block: 1,
                difficulty: HASH_HEX_LEN
            })
        );
    }

    #[test]
    fn test_merkle_root_mismatch() {
        let mut fixture = Fixture::new(40);
        fixture.blocks[1].transactions[0].id = "tampered_id".to_string();
        assert_eq!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::MerkleRootMismatch { block: 1 })
        );
    }

    #[test]
    fn test_invalid_signature() {
        let mut fixture = Fixture::new(40);
        fixture.blocks[1].transactions[0].value = 90;
        fixture.reseal(1);

        assert!(matches!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::InvalidSignature { block: 1, .. })
        ));
    }

    #[test]
    fn test_below_minimum_value() {
        let fixture = Fixture::new(40);
        let strict = ChainValidator::new(&Secp256k1Provider, DIFFICULTY, 1000);
        assert!(matches!(
            strict.validate(&fixture.blocks),
            Err(ValidationError::BelowMinimumValue {
                block: 1,
                inputs: 100,
                minimum: 1000,
                ..
            })
        ));
    }

    #[test]
    fn test_unbalanced_transaction() {
        let mut fixture = Fixture::new(40);
        let tx = &mut fixture.blocks[1].transactions[0];
        tx.outputs[1] = TransactionOutput::new(&tx.sender, 999, &tx.id);
        fixture.reseal(1);

        assert!(matches!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::UnbalancedTransaction {
                block: 1,
                inputs: 100,
                outputs: 1039,
                ..
            })
        ));
    }

    #[test]
    fn test_value_mismatch() {
        let mut fixture = Fixture::new(40);
        let tx = &mut fixture.blocks[1].transactions[0];
        tx.inputs[0].resolved_output = Some(TransactionOutput::new(&tx.sender, 50, "0"));
        tx.outputs = vec![
            TransactionOutput::new(&tx.recipient, 40, &tx.id),
            TransactionOutput::new(&tx.sender, 10, &tx.id),
        ];
        fixture.reseal(1);

        assert!(matches!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::ValueMismatch {
                block: 1,
                recorded: 50,
                actual: 100,
                ..
            })
        ));
    }

    #[test]
    fn test_double_spend_is_missing_input() {
        let mut fixture = Fixture::new(40);

        // Replay the already-spent transaction in a new block, bypassing processing
        let replayed = fixture.blocks[1].transactions[0].clone();
        let mut block = Block::new(&fixture.blocks[1].hash);
        block.transactions.push(replayed);
        block.mine(DIFFICULTY).unwrap();
        fixture.blocks.push(block);

        assert!(matches!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::MissingInput { block: 2, .. })
        ));
    }

    #[test]
    fn test_missing_outputs() {
        // Spend everything so the change output is zero and dropping it keeps balance
        let mut fixture = Fixture::new(100);
        fixture.blocks[1].transactions[0].outputs.truncate(1);
        fixture.reseal(1);

        assert!(matches!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::MissingOutputs { block: 1, count: 1, .. })
        ));
    }

    #[test]
    fn test_output_ordering_violation() {
        let mut fixture = Fixture::new(40);
        fixture.blocks[1].transactions[0].outputs.swap(0, 1);
        fixture.reseal(1);

        assert!(matches!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::OutputOrderingViolation { block: 1, .. })
        ));
    }

    #[test]
    fn test_transaction_id_mismatch() {
        let mut fixture = Fixture::new(40);
        fixture.blocks[1].transactions[0].id = "forged_id".to_string();
        fixture.reseal(1);

        assert_eq!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::TransactionIdMismatch {
                block: 1,
                tx: "forged_id".to_string()
            })
        );
    }

    #[test]
    fn test_edited_output_id() {
        let mut fixture = Fixture::new(40);
        let tx = &mut fixture.blocks[1].transactions[0];
        let mut raw = serde_json::to_value(&tx.outputs[1]).unwrap();
        raw["id"] = serde_json::json!("forged_output");
        tx.outputs[1] = serde_json::from_value(raw).unwrap();
        fixture.reseal(1);

        assert!(matches!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::OutputIdMismatch { block: 1, ref output_id, .. })
                if output_id == "forged_output"
        ));
    }

    #[test]
    fn test_output_with_foreign_parent() {
        let mut fixture = Fixture::new(40);
        let tx = &mut fixture.blocks[1].transactions[0];
        tx.outputs[1] = TransactionOutput::new(&tx.sender, 60, "another_tx");
        fixture.reseal(1);

        assert!(matches!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::OutputIdMismatch { block: 1, .. })
        ));
    }

    #[test]
    fn test_colliding_outputs_are_rejected() {
        let mut fixture = Fixture::new(40);
        let change = fixture.blocks[1].transactions[0].outputs[1].clone();
        let alice = fixture.alice.public_key_hex();

        // Alice pays herself half of her 60 change, bypassing processing
        let mut input = TransactionInput::new(change.id());
        input.resolved_output = Some(change);
        let mut tx = fixture.factory.create(&alice, &alice, 30, vec![input]);
        tx.generate_signature(&Secp256k1Provider, &fixture.alice.private_key_bytes())
            .unwrap();
        tx.id = tx.calculate_hash();
        tx.outputs = vec![
            TransactionOutput::new(&alice, 30, &tx.id),
            TransactionOutput::new(&alice, 30, &tx.id),
        ];

        let mut block = Block::new(&fixture.blocks[1].hash);
        block.transactions.push(tx);
        block.mine(DIFFICULTY).unwrap();
        fixture.blocks.push(block);

        assert!(matches!(
            fixture.validator().validate(&fixture.blocks),
            Err(ValidationError::DuplicateOutput { block: 2, .. })
        ));
    }

    #[test]
    fn test_multi_block_replay_carries_forward() {
        let mut fixture = Fixture::new(40);
        let change = fixture.blocks[1].transactions[0].outputs[1].id().to_string();
        let tx = fixture.transfer(25, &[change]);
        fixture.push_block(vec![tx]);

        let shadow = fixture.validator().replay_ledger(&fixture.blocks).unwrap();
        assert_eq!(shadow.balance_of(&fixture.alice.public_key_hex()), 35);
        assert_eq!(shadow.balance_of(&fixture.bob.public_key_hex()), 65);
        assert_eq!(shadow.total_value(), 100);
    }

    #[test]
    fn test_reference_scenario() {
        use crate::core::block::BlockError;
        use crate::core::transaction::TransactionError;

        let difficulty = 3;
        let signer = Secp256k1Provider;
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let factory = TransactionFactory::new();
        let mut ledger = Ledger::new();

        let genesis_tx = Transaction::genesis("coinbase", &alice.public_key_hex(), 100);
        ledger.seed_genesis(&genesis_tx);
        let genesis_output = genesis_tx.outputs[0].id().to_string();
        let mut genesis = Block::genesis();
        genesis.add_transaction(genesis_tx, &mut ledger, &signer, 1).unwrap();
        genesis.mine(difficulty).unwrap();
        assert_eq!(genesis.previous_hash, "0");
        assert!(genesis.hash.starts_with("000"));

        let mut tx = factory.create(
            &alice.public_key_hex(),
            &bob.public_key_hex(),
            40,
            vec![TransactionInput::new(&genesis_output)],
        );
        tx.generate_signature(&signer, &alice.private_key_bytes()).unwrap();
        let mut second = Block::new(&genesis.hash);
        second.add_transaction(tx, &mut ledger, &signer, 1).unwrap();
        second.mine(difficulty).unwrap();
        let change = second.transactions[0].outputs[1].id().to_string();

        // 1000 out of a 60 output is refused and leaves the block empty
        let mut overspend = factory.create(
            &alice.public_key_hex(),
            &bob.public_key_hex(),
            1000,
            vec![TransactionInput::new(&change)],
        );
        overspend
            .generate_signature(&signer, &alice.private_key_bytes())
            .unwrap();
        let mut third = Block::new(&second.hash);
        let err = third
            .add_transaction(overspend, &mut ledger, &signer, 1)
            .unwrap_err();
        assert!(matches!(
            err,
            BlockError::TransactionRejected(TransactionError::InsufficientFunds {
                have: 60,
                need: 1000
            })
        ));
        assert_eq!(third.tx_count(), 0);
        third.mine(difficulty).unwrap();

        let blocks = vec![genesis, second, third];
        let shadow = ChainValidator::new(&signer, difficulty, 1)
            .replay_ledger(&blocks)
            .unwrap();
        assert_eq!(shadow.balance_of(&alice.public_key_hex()), 60);
        assert_eq!(shadow.balance_of(&bob.public_key_hex()), 40);
        assert_eq!(ledger.balance_of(&alice.public_key_hex()), 60);
        assert_eq!(ledger.balance_of(&bob.public_key_hex()), 40);
    }
}
