use crate::crypto::Signature;
use crate::transaction::Transaction;
use crate::{fixed_bytes, BlockRef, ChainId, CodecError, Hash256};
use serde::{Deserialize, Serialize};

fixed_bytes!(
	/// A block id. The first four bytes carry the big-endian block
	/// height; the remainder comes from the header hash, so the id both
	/// names and orders the block.
	pub struct BlockId([u8; 32])
);

impl BlockId {
	pub fn new(num: u64, hash: Hash256) -> Self {
		let mut inner = *hash.as_bytes();
		inner[..4].copy_from_slice(&(num as u32).to_be_bytes());
		Self(inner)
	}

	/// The block height embedded in the id.
	pub fn num(&self) -> u64 {
		u64::from(u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]))
	}

	/// The four-byte TaPoS prefix drawn from the id.
	pub fn prefix(&self) -> u32 {
		u32::from_le_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
	}

	pub fn block_ref(&self) -> BlockRef {
		BlockRef { num: self.num(), id: *self }
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockHeader {
	pub previous: BlockId,
	/// Seconds since the epoch.
	pub timestamp: u64,
	pub witness: String,
	pub transaction_merkle_root: Hash256,
}

impl BlockHeader {
	pub fn block_num(&self) -> u64 {
		self.previous.num() + 1
	}

	/// The digest the witness signature commits to, under the given
	/// chain identity.
	pub fn signing_digest(&self, chain_id: &ChainId) -> Result<Hash256, CodecError> {
		let bytes = bcs::to_bytes(self).map_err(CodecError::Serialize)?;
		Ok(Hash256::digest(&[chain_id.as_bytes(), &bytes]))
	}

	pub fn id(&self) -> Result<BlockId, CodecError> {
		let bytes = bcs::to_bytes(self).map_err(CodecError::Serialize)?;
		Ok(BlockId::new(self.block_num(), Hash256::digest(&[&bytes])))
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SignedBlock {
	pub header: BlockHeader,
	pub witness_signature: Signature,
	pub transactions: Vec<Transaction>,
}

impl SignedBlock {
	pub fn block_num(&self) -> u64 {
		self.header.block_num()
	}

	pub fn id(&self) -> Result<BlockId, CodecError> {
		self.header.id()
	}

	/// Recomputes the merkle commitment over the current transaction
	/// set. Must be called after any transaction is rewritten, before
	/// the header is re-signed.
	pub fn compute_merkle_root(&self) -> Result<Hash256, CodecError> {
		transaction_merkle_root(&self.transactions)
	}
}

/// A sha256 pair-hash tree over the transaction ids; an odd leaf is
/// paired with itself. Zero transactions commit to the all-zero root.
pub fn transaction_merkle_root(transactions: &[Transaction]) -> Result<Hash256, CodecError> {
	if transactions.is_empty() {
		return Ok(Hash256::default());
	}
	let mut layer = transactions.iter().map(|tx| tx.id()).collect::<Result<Vec<_>, _>>()?;
	while layer.len() > 1 {
		let mut next = Vec::with_capacity(layer.len().div_ceil(2));
		for pair in layer.chunks(2) {
			let right = pair.get(1).unwrap_or(&pair[0]);
			next.push(Hash256::digest(&[pair[0].as_bytes(), right.as_bytes()]));
		}
		layer = next;
	}
	Ok(layer[0])
}
