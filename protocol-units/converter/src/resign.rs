use crate::registry::KeyRegistry;
use crate::ConvertError;
use chainport_signing::{classify, recover_public, PrivateKey};
use chainport_types::block::SignedBlock;
use chainport_types::crypto::Signature;
use chainport_types::transaction::Transaction;
use chainport_types::{ChainId, Hash256};
use std::sync::Mutex;

fn locked_derive(
	registry: &Mutex<KeyRegistry>,
	original_digest: &Hash256,
	signature: &Signature,
) -> Result<PrivateKey, ConvertError> {
	let original_key = recover_public(original_digest, signature)
		.map_err(ConvertError::UnrecoverableSignature)?;
	// first-time creation mutates order-sensitive state, so the lock
	// covers the whole lookup
	let mut registry = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
	Ok(registry.get_private(&original_key).clone())
}

/// Replaces one original signature: classify its canonical form,
/// recover the original signer against the *original* digest, derive
/// the substitute key, and sign the *new* digest in the same form.
fn resign_one(
	signature: &Signature,
	original_digest: &Hash256,
	new_digest: &Hash256,
	registry: &Mutex<KeyRegistry>,
) -> Result<Signature, ConvertError> {
	let form = classify(signature);
	let derived = locked_derive(registry, original_digest, signature)?;
	Ok(derived.sign_canonical(new_digest, form)?)
}

/// Re-signs every signature of a rewritten transaction under the new
/// chain identity. `original_digest` must be the signing digest of the
/// transaction as it appeared on the source chain, captured before any
/// rewriting.
pub fn resign_transaction(
	transaction: &mut Transaction,
	original_digest: &Hash256,
	new_chain_id: &ChainId,
	registry: &Mutex<KeyRegistry>,
) -> Result<(), ConvertError> {
	let new_digest = transaction.signing_digest(new_chain_id)?;
	let mut signatures = Vec::with_capacity(transaction.signatures.len());
	for signature in &transaction.signatures {
		signatures.push(resign_one(signature, original_digest, &new_digest, registry)?);
	}
	transaction.signatures = signatures;
	Ok(())
}

/// Re-signs the block header's witness signature under the new chain
/// identity. The header's merkle root and previous link must already
/// hold their destination values.
pub fn resign_block_header(
	block: &mut SignedBlock,
	original_digest: &Hash256,
	new_chain_id: &ChainId,
	registry: &Mutex<KeyRegistry>,
) -> Result<(), ConvertError> {
	let new_digest = block.header.signing_digest(new_chain_id)?;
	block.witness_signature =
		resign_one(&block.witness_signature, original_digest, &new_digest, registry)?;
	Ok(())
}
