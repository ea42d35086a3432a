pub mod canonical;
pub mod keys;

pub use canonical::{classify, CanonicalForm};
pub use keys::{recover_public, verify_digest, MasterSecret, PrivateKey};

use std::error;

/// Errors thrown by signing, recovery, and key decoding.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
	#[error("failed to decode key material")]
	Decode(#[source] Box<dyn error::Error + Send + Sync>),
	#[error("signing failed")]
	Sign(#[source] Box<dyn error::Error + Send + Sync>),
	#[error("failed to recover public key from signature")]
	Recover(#[source] Box<dyn error::Error + Send + Sync>),
	#[error("could not produce a {0:?} signature after {1} attempts")]
	Canonicalization(CanonicalForm, u32),
}
