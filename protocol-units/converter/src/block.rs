use crate::registry::KeyRegistry;
use crate::resign::{resign_block_header, resign_transaction};
use crate::rewrite::{rewrite_operation, SecondAuthorityKeySet};
use crate::tapos::{DestinationHead, HardforkTracker, TaposTracker};
use crate::ConvertError;
use chainport_signing::MasterSecret;
use chainport_types::block::{BlockId, SignedBlock};
use chainport_types::transaction::Transaction;
use chainport_types::{BlockRef, ChainId, Hash256};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::info;

/// Per-block conversion: rewrites every transaction's authorities,
/// maintains the TaPoS reference and hardfork bookkeeping, recomputes
/// the merkle commitment, and re-signs transactions and the header
/// under the new chain identity.
///
/// Blocks must be fed strictly in order; TaPoS and hardfork state are
/// threaded sequentially between blocks. Parallelism exists only within
/// a block's signing step.
pub struct BlockConverter {
	old_chain_id: ChainId,
	new_chain_id: ChainId,
	registry: Arc<Mutex<KeyRegistry>>,
	second_authority: SecondAuthorityKeySet,
	tapos: TaposTracker,
	hardforks: HardforkTracker,
	jobs: usize,
	prev_dest_id: Option<BlockId>,
	injection_boundary_logged: bool,
}

impl BlockConverter {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		old_chain_id: ChainId,
		new_chain_id: ChainId,
		secret: MasterSecret,
		second_authority: SecondAuthorityKeySet,
		jobs: usize,
		tapos_refresh_interval: u64,
		hardfork_activations: Vec<u64>,
	) -> Self {
		Self {
			old_chain_id,
			new_chain_id,
			registry: Arc::new(Mutex::new(KeyRegistry::new(secret))),
			second_authority,
			tapos: TaposTracker::new(tapos_refresh_interval),
			hardforks: HardforkTracker::new(hardfork_activations),
			jobs: jobs.max(1),
			prev_dest_id: None,
			injection_boundary_logged: false,
		}
	}

	pub fn registry(&self) -> Arc<Mutex<KeyRegistry>> {
		Arc::clone(&self.registry)
	}

	pub fn old_chain_id(&self) -> &ChainId {
		&self.old_chain_id
	}

	pub fn new_chain_id(&self) -> &ChainId {
		&self.new_chain_id
	}

	pub fn second_authority(&self) -> &SecondAuthorityKeySet {
		&self.second_authority
	}

	/// Seeds the destination chain linkage when resuming into a
	/// non-empty destination.
	pub fn set_destination_head(&mut self, head: Option<BlockRef>) {
		self.prev_dest_id = head.map(|h| h.id);
	}

	/// Whether the controller should query the destination head before
	/// converting the block at this source height.
	pub fn wants_tapos_refresh(&self, source_height: u64) -> bool {
		self.tapos.needs_refresh(source_height)
	}

	/// Records a known source-to-destination block correspondence, as a
	/// side effect of resume validation.
	pub fn touch(&mut self, source_height: u64, dest_id: &BlockId) {
		self.hardforks.touch(source_height, dest_id.num());
	}

	pub fn hardforks(&self) -> &HardforkTracker {
		&self.hardforks
	}

	pub async fn convert_block(
		&mut self,
		mut block: SignedBlock,
		dest_head: Option<DestinationHead>,
	) -> Result<SignedBlock, ConvertError> {
		let source_height = block.block_num();
		// the original header digest must be captured before the header
		// is rewritten for the destination
		let original_header_digest = block.header.signing_digest(&self.old_chain_id)?;

		if let Some(head) = dest_head {
			if self.tapos.needs_refresh(source_height) {
				self.tapos.refresh(source_height, head);
				self.hardforks.on_tapos_change(&head);
			}
		}
		// while the destination has not reported a head, the previously
		// converted block serves as the reference; the very first block
		// into an empty destination has nothing to point at and keeps
		// its source fields
		let reference = self.tapos.reference().map(|h| h.block.id).or(self.prev_dest_id);
		let expiration = self.tapos.expiration();

		let inject = self.second_authority.active_at(source_height);
		if !inject && !self.second_authority.is_empty() && !self.injection_boundary_logged {
			info!(
				height = source_height,
				cutoff = self.second_authority.cutoff_height(),
				"second-authority injection phase ended"
			);
			self.injection_boundary_logged = true;
		}

		let prepared = self.rewrite_transactions(&mut block, inject, reference, expiration)?;
		block.transactions = self.resign_all(prepared).await?;

		block.header.transaction_merkle_root = block.compute_merkle_root()?;
		if let Some(prev) = self.prev_dest_id {
			block.header.previous = prev;
		}
		resign_block_header(
			&mut block,
			&original_header_digest,
			&self.new_chain_id,
			&self.registry,
		)?;

		let dest_id = block.id()?;
		self.hardforks.touch(source_height, dest_id.num());
		self.prev_dest_id = Some(dest_id);
		Ok(block)
	}

	/// Rewrites authorities and TaPoS fields sequentially; first-time
	/// key derivation is order-sensitive, so this never fans out.
	fn rewrite_transactions(
		&mut self,
		block: &mut SignedBlock,
		inject: bool,
		reference: Option<BlockId>,
		expiration: Option<u64>,
	) -> Result<Vec<(Transaction, Hash256)>, ConvertError> {
		let second = inject.then_some(&self.second_authority);
		let registry = Arc::clone(&self.registry);
		let mut registry = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

		let transactions = std::mem::take(&mut block.transactions);
		let mut prepared = Vec::with_capacity(transactions.len());
		for mut tx in transactions {
			let original_digest = tx.signing_digest(&self.old_chain_id)?;
			let mut operations = Vec::with_capacity(tx.operations.len());
			for op in &tx.operations {
				operations.push(rewrite_operation(op, &mut registry, second)?);
			}
			tx.operations = operations;
			if let Some(reference) = &reference {
				tx.set_reference_block(reference);
			}
			if let Some(expiration) = expiration {
				tx.expiration = expiration;
			}
			prepared.push((tx, original_digest));
		}
		Ok(prepared)
	}

	/// Fork-join re-signing of one block's transactions across at most
	/// `jobs` workers. All workers complete before the block proceeds.
	async fn resign_all(
		&self,
		prepared: Vec<(Transaction, Hash256)>,
	) -> Result<Vec<Transaction>, ConvertError> {
		if prepared.is_empty() {
			return Ok(Vec::new());
		}
		if self.jobs == 1 || prepared.len() == 1 {
			let mut transactions = Vec::with_capacity(prepared.len());
			for (mut tx, original_digest) in prepared {
				resign_transaction(&mut tx, &original_digest, &self.new_chain_id, &self.registry)?;
				transactions.push(tx);
			}
			return Ok(transactions);
		}

		let chunk_size = prepared.len().div_ceil(self.jobs);
		let mut chunks: Vec<Vec<(usize, Transaction, Hash256)>> = Vec::new();
		for (index, (tx, digest)) in prepared.into_iter().enumerate() {
			if index % chunk_size == 0 {
				chunks.push(Vec::with_capacity(chunk_size));
			}
			if let Some(chunk) = chunks.last_mut() {
				chunk.push((index, tx, digest));
			}
		}

		let mut tasks = JoinSet::new();
		for chunk in chunks {
			let registry = Arc::clone(&self.registry);
			let new_chain_id = self.new_chain_id;
			tasks.spawn_blocking(move || {
				let mut signed = Vec::with_capacity(chunk.len());
				for (index, mut tx, original_digest) in chunk {
					resign_transaction(&mut tx, &original_digest, &new_chain_id, &registry)?;
					signed.push((index, tx));
				}
				Ok::<_, ConvertError>(signed)
			});
		}

		let mut signed = Vec::new();
		while let Some(joined) = tasks.join_next().await {
			let batch = joined.map_err(|e| ConvertError::Worker(e.to_string()))??;
			signed.extend(batch);
		}
		// transactions are emitted in their original order
		signed.sort_by_key(|(index, _)| *index);
		Ok(signed.into_iter().map(|(_, tx)| tx).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chainport_signing::{classify, recover_public, CanonicalForm, PrivateKey};
	use chainport_types::authority::Authority;
	use chainport_types::block::BlockHeader;
	use chainport_types::operation::{AccountCreateOperation, Operation, TransferOperation};

	const SECRET: &str = "6f2f883e2c21f4d19013617dc4e1b2c6a26b914e1b1e2d7b5a7f5a1d2f3e4c5b";
	const WITNESS_SECRET: &str =
		"1111111111111111111111111111111111111111111111111111111111111111";

	fn old_chain() -> ChainId {
		ChainId([1u8; 32])
	}

	fn new_chain() -> ChainId {
		ChainId([2u8; 32])
	}

	fn converter(jobs: usize) -> BlockConverter {
		BlockConverter::new(
			old_chain(),
			new_chain(),
			MasterSecret::from_hex(SECRET).expect("valid secret"),
			SecondAuthorityKeySet::default(),
			jobs,
			10,
			vec![],
		)
	}

	fn signed_transfer(signer: &PrivateKey, amount: u64) -> Transaction {
		let mut tx = Transaction {
			ref_block_num: 1,
			ref_block_prefix: 1,
			expiration: 500,
			operations: vec![Operation::Transfer(TransferOperation {
				from: "alice".into(),
				to: "bob".into(),
				amount,
				memo: String::new(),
			})],
			signatures: vec![],
		};
		let digest = tx.signing_digest(&old_chain()).expect("digest");
		tx.signatures.push(
			signer.sign_canonical(&digest, CanonicalForm::Legacy).expect("sign"),
		);
		tx
	}

	fn source_block(witness: &PrivateKey, transactions: Vec<Transaction>) -> SignedBlock {
		let mut block = SignedBlock {
			header: BlockHeader {
				previous: BlockId::new(1, Hash256([8u8; 32])),
				timestamp: 60,
				witness: "init".into(),
				transaction_merkle_root: Hash256::default(),
			},
			witness_signature: chainport_types::crypto::Signature::default(),
			transactions,
		};
		block.header.transaction_merkle_root =
			block.compute_merkle_root().expect("merkle");
		let digest = block.header.signing_digest(&old_chain()).expect("digest");
		block.witness_signature =
			witness.sign_canonical(&digest, CanonicalForm::Legacy).expect("sign");
		block
	}

	fn dest_head(num: u64, time: Option<u64>) -> DestinationHead {
		DestinationHead { block: BlockId::new(num, Hash256([5u8; 32])).block_ref(), time }
	}

	#[tokio::test]
	async fn converted_block_recovers_to_derived_keys() -> Result<(), anyhow::Error> {
		let witness = PrivateKey::from_hex(WITNESS_SECRET)?;
		let alice = MasterSecret::from_hex(SECRET)?.derive(500);
		let block = source_block(&witness, vec![signed_transfer(&alice, 3)]);

		let mut converter = converter(1);
		let head = dest_head(9, Some(1_000));
		let converted = converter.convert_block(block, Some(head)).await?;

		// TaPoS points at the destination head, expiration re-stamped
		let tx = &converted.transactions[0];
		assert!(tx.references_block(&head.block.id));
		assert!(tx.expiration > 1_000);

		// signature recovers to the registered substitute for alice
		let expected = {
			let registry = converter.registry();
			let mut registry = registry.lock().unwrap();
			registry.get_public(&alice.public())
		};
		let digest = tx.signing_digest(&new_chain())?;
		assert_eq!(recover_public(&digest, &tx.signatures[0])?, expected);
		assert_eq!(classify(&tx.signatures[0]), CanonicalForm::Legacy);

		// merkle root covers the rewritten transaction set
		assert_eq!(converted.header.transaction_merkle_root, converted.compute_merkle_root()?);

		// header signature recovers to the witness substitute
		let header_digest = converted.header.signing_digest(&new_chain())?;
		let witness_substitute = {
			let registry = converter.registry();
			let mut registry = registry.lock().unwrap();
			registry.get_public(&witness.public())
		};
		assert_eq!(
			recover_public(&header_digest, &converted.witness_signature)?,
			witness_substitute
		);
		Ok(())
	}

	#[tokio::test]
	async fn empty_block_still_advances_bookkeeping() -> Result<(), anyhow::Error> {
		let witness = PrivateKey::from_hex(WITNESS_SECRET)?;
		let block = source_block(&witness, vec![]);
		let mut converter = converter(1);

		let converted = converter.convert_block(block, Some(dest_head(1, None))).await?;
		assert!(converted.transactions.is_empty());
		assert_eq!(converted.header.transaction_merkle_root, Hash256::default());
		// the destination correspondence was recorded
		assert_eq!(converter.hardforks().touched_head(), converted.block_num());
		Ok(())
	}

	#[tokio::test]
	async fn parallel_signing_preserves_transaction_order() -> Result<(), anyhow::Error> {
		let witness = PrivateKey::from_hex(WITNESS_SECRET)?;
		let secret = MasterSecret::from_hex(SECRET)?;
		let signers: Vec<PrivateKey> = (0..8).map(|i| secret.derive(600 + i)).collect();
		let transactions: Vec<Transaction> =
			signers.iter().enumerate().map(|(i, s)| signed_transfer(s, i as u64)).collect();
		let block = source_block(&witness, transactions);

		let mut converter = converter(4);
		let converted = converter.convert_block(block, Some(dest_head(2, None))).await?;
		for (i, tx) in converted.transactions.iter().enumerate() {
			let Operation::Transfer(op) = &tx.operations[0] else {
				panic!("transfer expected");
			};
			assert_eq!(op.amount, i as u64);
		}
		Ok(())
	}

	#[tokio::test]
	async fn bootstrap_blocks_reference_the_previous_converted_block() -> Result<(), anyhow::Error> {
		let witness = PrivateKey::from_hex(WITNESS_SECRET)?;
		let alice = MasterSecret::from_hex(SECRET)?.derive(700);
		let mut converter = converter(1);

		// nothing exists to reference yet; source fields survive
		let first_source = source_block(&witness, vec![signed_transfer(&alice, 1)]);
		let first = converter.convert_block(first_source, None).await?;
		assert_eq!(first.transactions[0].ref_block_num, 1);

		// the second block can already point at the first converted one
		let mut second_source = source_block(&witness, vec![signed_transfer(&alice, 2)]);
		second_source.header.previous = BlockId::new(2, Hash256([8u8; 32]));
		let second = converter.convert_block(second_source, None).await?;
		assert!(second.transactions[0].references_block(&first.id()?));
		Ok(())
	}

	#[tokio::test]
	async fn destination_linkage_follows_converted_ids() -> Result<(), anyhow::Error> {
		let witness = PrivateKey::from_hex(WITNESS_SECRET)?;
		let mut converter = converter(1);
		converter.set_destination_head(Some(BlockId::new(41, Hash256([6u8; 32])).block_ref()));

		let first = source_block(&witness, vec![]);
		let converted = converter.convert_block(first, None).await?;
		assert_eq!(converted.block_num(), 42);

		let mut second = source_block(&witness, vec![]);
		second.header.previous = BlockId::new(2, Hash256([8u8; 32]));
		let converted_second = converter.convert_block(second, None).await?;
		assert_eq!(converted_second.header.previous, converted.id()?);
		Ok(())
	}

	#[tokio::test]
	async fn injection_applies_only_before_the_cutoff() -> Result<(), anyhow::Error> {
		let witness = PrivateKey::from_hex(WITNESS_SECRET)?;
		let secret = MasterSecret::from_hex(SECRET)?;
		let admin = secret.derive(900);
		let alice = secret.derive(901);

		let account_create = |signer: &PrivateKey| {
			let mut owner = Authority::new(1);
			owner.add_key(signer.public(), 1);
			let mut tx = Transaction {
				ref_block_num: 0,
				ref_block_prefix: 0,
				expiration: 100,
				operations: vec![Operation::AccountCreate(AccountCreateOperation {
					creator: "alice".into(),
					new_account_name: "bob".into(),
					owner: owner.clone(),
					active: owner.clone(),
					posting: owner,
					memo_key: signer.public(),
				})],
				signatures: vec![],
			};
			let digest = tx.signing_digest(&old_chain()).expect("digest");
			tx.signatures
				.push(signer.sign_canonical(&digest, CanonicalForm::LowS).expect("sign"));
			tx
		};

		// cutoff at source height 3: block 2 injects, block 3 does not
		let mut converter = BlockConverter::new(
			old_chain(),
			new_chain(),
			MasterSecret::from_hex(SECRET)?,
			SecondAuthorityKeySet::new(Some(admin.clone()), None, None, 3),
			1,
			10,
			vec![],
		);

		let early = converter
			.convert_block(source_block(&witness, vec![account_create(&alice)]), None)
			.await?;
		let Operation::AccountCreate(op) = &early.transactions[0].operations[0] else {
			panic!("account create expected");
		};
		assert!(op.owner.key_weight(&admin.public()).is_some());

		let mut late_source = source_block(&witness, vec![account_create(&alice)]);
		late_source.header.previous = BlockId::new(2, Hash256([8u8; 32]));
		let late = converter.convert_block(late_source, None).await?;
		let Operation::AccountCreate(op) = &late.transactions[0].operations[0] else {
			panic!("account create expected");
		};
		assert!(op.owner.key_weight(&admin.public()).is_none());
		Ok(())
	}
}
