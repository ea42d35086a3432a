//! The key-substitution replay engine: converts a finalized chain
//! history into a new chain identity with a deterministically remapped
//! key set, leaving every account's authority structure intact.

pub mod block;
pub mod controller;
pub mod local;
pub mod registry;
pub mod remote;
pub mod resign;
pub mod rewrite;
pub mod source;
pub mod tapos;

use chainport_node_client::RpcError;
use chainport_signing::SignerError;
use chainport_types::CodecError;
use std::error;

/// Conversion failures. Variants map onto the engine's taxonomy:
/// everything here is fatal except [ConvertError::Rpc] carrying a
/// transient transport error, which callers retry in place.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
	#[error("destination history was not produced from this source and master secret")]
	ChainIdentityMismatch,
	#[error("source signature cannot be classified or recovered")]
	UnrecoverableSignature(#[source] SignerError),
	#[error("source is empty but a non-empty source is required")]
	EmptySource,
	#[error("malformed embedded key material in operation")]
	MalformedOperation(#[source] bcs::Error),
	#[error("signing failed")]
	Signing(#[from] SignerError),
	#[error("canonical encoding failed")]
	Codec(#[from] CodecError),
	#[error("block store failure")]
	Store(#[source] Box<dyn error::Error + Send + Sync>),
	#[error("node rpc failure")]
	Rpc(#[from] RpcError),
	#[error("signing worker failed: {0}")]
	Worker(String),
}
