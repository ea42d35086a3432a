use crate::block::BlockId;
use crate::crypto::Signature;
use crate::operation::Operation;
use crate::{ChainId, CodecError, Hash256};
use serde::{Deserialize, Serialize};

/// Transaction id: digest of the transaction body, independent of the
/// chain id and of the attached signatures.
pub type TransactionId = Hash256;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
	/// Low 16 bits of the referenced block's height (TaPoS).
	pub ref_block_num: u16,
	/// Four bytes of the referenced block's id (TaPoS).
	pub ref_block_prefix: u32,
	/// Seconds since the epoch after which the transaction is stale.
	pub expiration: u64,
	pub operations: Vec<Operation>,
	pub signatures: Vec<Signature>,
}

impl Transaction {
	fn body_bytes(&self) -> Result<Vec<u8>, CodecError> {
		let body =
			(self.ref_block_num, self.ref_block_prefix, self.expiration, &self.operations);
		bcs::to_bytes(&body).map_err(CodecError::Serialize)
	}

	/// The digest signatures commit to: sha256 over the chain id and the
	/// canonical body bytes. Signatures are excluded so that re-signing
	/// does not shift the digest.
	pub fn signing_digest(&self, chain_id: &ChainId) -> Result<Hash256, CodecError> {
		let body = self.body_bytes()?;
		Ok(Hash256::digest(&[chain_id.as_bytes(), &body]))
	}

	pub fn id(&self) -> Result<TransactionId, CodecError> {
		let body = self.body_bytes()?;
		Ok(Hash256::digest(&[&body]))
	}

	/// Points the TaPoS fields at the given block.
	pub fn set_reference_block(&mut self, id: &BlockId) {
		self.ref_block_num = (id.num() & 0xffff) as u16;
		self.ref_block_prefix = id.prefix();
	}

	/// Whether the TaPoS fields reference the given block.
	pub fn references_block(&self, id: &BlockId) -> bool {
		self.ref_block_num == (id.num() & 0xffff) as u16 && self.ref_block_prefix == id.prefix()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::operation::{Operation, TransferOperation};

	fn transfer() -> Transaction {
		Transaction {
			ref_block_num: 7,
			ref_block_prefix: 0xdead_beef,
			expiration: 1000,
			operations: vec![Operation::Transfer(TransferOperation {
				from: "alice".into(),
				to: "bob".into(),
				amount: 10,
				memo: String::new(),
			})],
			signatures: vec![],
		}
	}

	#[test]
	fn digest_depends_on_chain_id() -> Result<(), anyhow::Error> {
		let tx = transfer();
		let a = tx.signing_digest(&ChainId([1u8; 32]))?;
		let b = tx.signing_digest(&ChainId([2u8; 32]))?;
		assert_ne!(a, b);
		Ok(())
	}

	#[test]
	fn digest_ignores_signatures() -> Result<(), anyhow::Error> {
		let chain_id = ChainId([1u8; 32]);
		let mut tx = transfer();
		let before = tx.signing_digest(&chain_id)?;
		tx.signatures.push(Signature([3u8; 65]));
		assert_eq!(tx.signing_digest(&chain_id)?, before);
		assert_eq!(tx.id()?, transfer().id()?);
		Ok(())
	}

	#[test]
	fn reference_block_round_trip() {
		let id = BlockId::new(0x1_0007, Hash256([9u8; 32]));
		let mut tx = transfer();
		tx.set_reference_block(&id);
		assert_eq!(tx.ref_block_num, 0x0007);
		assert!(tx.references_block(&id));
	}
}
