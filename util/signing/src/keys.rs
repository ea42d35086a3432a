use crate::canonical::{classify, CanonicalForm};
use crate::SignerError;
use chainport_types::crypto::{PublicKey, Signature};
use chainport_types::Hash256;
use ecdsa::hazmat::SignPrimitive;
use k256::ecdsa::{RecoveryId, SigningKey, VerifyingKey};
use sha2::{Digest as _, Sha256};

/// Bound on the nonce search for a signature of a required canonical
/// form. Each attempt hits the form with probability near 1/4, so the
/// bound is unreachable in practice.
const MAX_CANONICAL_ATTEMPTS: u32 = 256;

/// A secp256k1 private key able to produce recoverable signatures of a
/// required canonical form.
#[derive(Clone)]
pub struct PrivateKey {
	signing_key: SigningKey,
}

impl std::fmt::Debug for PrivateKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		// never print key material
		write!(f, "PrivateKey({})", self.public())
	}
}

impl PrivateKey {
	pub fn from_signing_key(signing_key: SigningKey) -> Self {
		Self { signing_key }
	}

	pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
		let bytes: &[u8; 32] =
			bytes.try_into().map_err(|_| SignerError::Decode("invalid key length".into()))?;
		let signing_key =
			SigningKey::from_bytes(bytes.into()).map_err(|e| SignerError::Decode(e.into()))?;
		Ok(Self::from_signing_key(signing_key))
	}

	pub fn from_hex(hex_str: &str) -> Result<Self, SignerError> {
		let bytes = hex::decode(hex_str).map_err(|e| {
			SignerError::Decode(format!("failed to decode hex string: {}", e).into())
		})?;
		Self::from_bytes(&bytes)
	}

	/// The compressed SEC1 public half.
	pub fn public(&self) -> PublicKey {
		let point = self.signing_key.verifying_key().to_encoded_point(true);
		// a compressed point is always 33 bytes
		let mut inner = [0u8; PublicKey::BYTES_LEN];
		inner.copy_from_slice(point.as_bytes());
		PublicKey(inner)
	}

	/// Signs a prehashed digest, searching RFC6979 nonces (via the
	/// additional-entropy input) until the signature classifies to the
	/// requested canonical form.
	pub fn sign_canonical(
		&self,
		digest: &Hash256,
		form: CanonicalForm,
	) -> Result<Signature, SignerError> {
		let z = k256::FieldBytes::from(*digest.as_bytes());
		for nonce in 0..MAX_CANONICAL_ATTEMPTS {
			let ad = nonce.to_le_bytes();
			let (sig, recid) = self
				.signing_key
				.as_nonzero_scalar()
				.as_ref()
				.try_sign_prehashed_rfc6979::<Sha256>(&z, &ad)
				.map_err(|e| SignerError::Sign(e.into()))?;
			let recid = match recid {
				Some(recid) => recid,
				None => RecoveryId::trial_recovery_from_prehash(
					self.signing_key.verifying_key(),
					digest.as_bytes(),
					&sig,
				)
				.map_err(|e| SignerError::Sign(e.into()))?,
			};
			// signing always normalizes to low-s, so a high-s candidate
			// must be built as the complement of the normalized scalar
			let candidate = match form {
				CanonicalForm::NonCanonical => high_s_complement(&sig, recid)?,
				_ => {
					let mut compact = [0u8; 64];
					compact.copy_from_slice(&sig.to_bytes());
					Signature::from_parts(recid.to_byte(), &compact)
				}
			};
			if classify(&candidate) == form {
				return Ok(candidate);
			}
		}
		Err(SignerError::Canonicalization(form, MAX_CANONICAL_ATTEMPTS))
	}
}

/// The operator-supplied master secret. Its encoded string form, not
/// the raw scalar, seeds every derived key, so the same encoding always
/// regenerates the same substitute keys.
pub struct MasterSecret {
	encoded: String,
}

impl std::fmt::Debug for MasterSecret {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "MasterSecret(..)")
	}
}

impl MasterSecret {
	/// Parses a hex-encoded secp256k1 secret scalar, retaining the
	/// encoded form for derivation.
	pub fn from_hex(encoded: &str) -> Result<Self, SignerError> {
		// validate that the encoding names a usable key
		PrivateKey::from_hex(encoded)?;
		Ok(Self { encoded: encoded.to_owned() })
	}

	pub fn encoded(&self) -> &str {
		&self.encoded
	}

	/// Derives the private key for the given registry index:
	/// `sha256(encoded || " " || index)`, re-hashed in the negligible
	/// case the digest is not a valid scalar.
	pub fn derive(&self, index: usize) -> PrivateKey {
		let seed = format!("{} {}", self.encoded, index);
		let mut digest: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
		loop {
			match PrivateKey::from_bytes(&digest) {
				Ok(key) => return key,
				Err(_) => digest = Sha256::digest(digest).into(),
			}
		}
	}
}

/// Replaces a low-s signature's scalar with its additive complement
/// `n - s` and flips the recovery parity, yielding the high-s signature
/// over the same digest by the same key.
fn high_s_complement(
	sig: &k256::ecdsa::Signature,
	recid: RecoveryId,
) -> Result<Signature, SignerError> {
	let neg_s = -*sig.s();
	let mut compact = [0u8; 64];
	compact[..32].copy_from_slice(&sig.to_bytes()[..32]);
	compact[32..].copy_from_slice(&neg_s.to_bytes());
	let flipped = RecoveryId::from_byte(recid.to_byte() ^ 1)
		.ok_or_else(|| SignerError::Sign("recovery id parity flip out of range".into()))?;
	Ok(Signature::from_parts(flipped.to_byte(), &compact))
}

/// Recovers the public key a signature commits to, for the given
/// signing digest.
pub fn recover_public(digest: &Hash256, signature: &Signature) -> Result<PublicKey, SignerError> {
	let recid = RecoveryId::from_byte(signature.recovery_byte())
		.ok_or_else(|| SignerError::Recover("invalid recovery byte".into()))?;
	let sig = k256::ecdsa::Signature::from_slice(&signature.as_bytes()[1..])
		.map_err(|e| SignerError::Recover(e.into()))?;
	let verifying_key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &sig, recid)
		.map_err(|e| SignerError::Recover(e.into()))?;
	let point = verifying_key.to_encoded_point(true);
	PublicKey::try_from(point.as_bytes()).map_err(|e| SignerError::Recover(e.into()))
}

/// Whether the signature over the digest recovers to the given key.
pub fn verify_digest(digest: &Hash256, signature: &Signature, public_key: &PublicKey) -> bool {
	matches!(recover_public(digest, signature), Ok(recovered) if recovered == *public_key)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn digest(tag: &[u8]) -> Hash256 {
		Hash256::digest(&[tag])
	}

	fn random_key() -> PrivateKey {
		PrivateKey::from_signing_key(SigningKey::random(&mut rand::thread_rng()))
	}

	#[test]
	fn sign_recover_round_trip() -> Result<(), anyhow::Error> {
		let key = random_key();
		let digest = digest(b"round trip");
		for form in [CanonicalForm::Legacy, CanonicalForm::LowS, CanonicalForm::NonCanonical] {
			let signature = key.sign_canonical(&digest, form)?;
			assert_eq!(classify(&signature), form);
			assert_eq!(recover_public(&digest, &signature)?, key.public());
			assert!(verify_digest(&digest, &signature, &key.public()));
		}
		Ok(())
	}

	#[test]
	fn non_canonical_requests_produce_high_s() -> Result<(), anyhow::Error> {
		let key = random_key();
		for tag in 0u8..4 {
			let digest = digest(&[tag]);
			let signature = key.sign_canonical(&digest, CanonicalForm::NonCanonical)?;
			assert_eq!(classify(&signature), CanonicalForm::NonCanonical);
			assert_eq!(recover_public(&digest, &signature)?, key.public());
		}
		Ok(())
	}

	#[test]
	fn recovery_is_digest_sensitive() -> Result<(), anyhow::Error> {
		let key = random_key();
		let signature = key.sign_canonical(&digest(b"a"), CanonicalForm::LowS)?;
		assert!(!verify_digest(&digest(b"b"), &signature, &key.public()));
		Ok(())
	}

	#[test]
	fn derivation_is_deterministic_and_index_sensitive() -> Result<(), anyhow::Error> {
		let secret = MasterSecret::from_hex(
			"9e7b853e2c21f4d19013617dc4e1b2c6a26b914e1b1e2d7b5a7f5a1d2f3e4c5b",
		)?;
		let again = MasterSecret::from_hex(secret.encoded())?;
		assert_eq!(secret.derive(0).public(), again.derive(0).public());
		assert_ne!(secret.derive(0).public(), secret.derive(1).public());
		Ok(())
	}

	#[test]
	fn master_secret_rejects_garbage() {
		assert!(MasterSecret::from_hex("not hex").is_err());
		assert!(MasterSecret::from_hex("abcd").is_err());
	}
}
